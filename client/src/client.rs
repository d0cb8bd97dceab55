use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use crate::cache::Cache;
use crate::commands::{CommandError, CommandPipeline, CommandRegistry, CommandsBuilder};
use crate::config::ClientConfig;
use crate::events::{Event, Listeners, WaitError};
use crate::gateway::ws::http_to_ws_scheme;
use crate::gateway::{Connection, ConnectionState, Dispatcher, GatewayConfig, GatewayError};
use crate::http::{HttpClient, HttpError, Transport};
use crate::model::{Channel, Server, User};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("no token configured")]
    MissingToken,
    #[error("could not reach the API: {0}")]
    Http(#[from] HttpError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("failed to set up commands: {0}")]
    Commands(#[from] CommandError),
    #[error("client is already running")]
    AlreadyRunning,
}

/// Assembles a [`Client`]: configuration, event handlers and, optionally,
/// prefix commands.
pub struct ClientBuilder {
    config: ClientConfig,
    listeners: Listeners,
    commands: Option<CommandsBuilder>,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            listeners: Listeners::new(),
            commands: None,
            transport: None,
        }
    }

    /// Bind a handler to an event name, e.g. `"message"` or `"command_error"`.
    pub fn on<F, Fut>(self, event: &str, handler: F) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.listeners.on(event, handler);
        self
    }

    /// Enable prefix commands and configure them. The builder handed to `f`
    /// starts from the `[commands]` section of the config.
    pub fn commands<F>(mut self, f: F) -> Self
    where
        F: FnOnce(CommandsBuilder) -> CommandsBuilder,
    {
        let builder = self.commands.take().unwrap_or_else(|| commands_from_config(&self.config));
        self.commands = Some(f(builder));
        self
    }

    /// Replace the REST transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<Client, ClientError> {
        let client = &self.config.client;
        if client.token.trim().is_empty() {
            return Err(ClientError::MissingToken);
        }

        let timeout = self.config.request_timeout();
        let http = match self.transport {
            Some(transport) => HttpClient::with_transport(transport).with_timeout(timeout),
            None => HttpClient::new(&client.api_url, &client.token, client.bot, timeout)?,
        };
        let cache = Arc::new(Cache::new(client.max_messages));
        let listeners = Arc::new(self.listeners);
        let commands = self
            .commands
            .map(|builder| builder.build(cache.clone(), http.clone(), listeners.clone()))
            .transpose()?
            .map(Arc::new);

        Ok(Client {
            config: self.config,
            cache,
            http,
            listeners,
            commands,
            connection: Mutex::new(None),
        })
    }
}

fn commands_from_config(config: &ClientConfig) -> CommandsBuilder {
    let section = &config.commands;
    CommandsBuilder::new()
        .prefixes(section.prefixes.iter().cloned())
        .case_insensitive(section.case_insensitive)
        .group_fallback(section.group_fallback)
        .help_command(section.help_command)
}

/// A connected chat client: entity cache, REST helpers, listeners and the
/// gateway connection that keeps the cache current.
pub struct Client {
    config: ClientConfig,
    cache: Arc<Cache>,
    http: HttpClient,
    listeners: Arc<Listeners>,
    commands: Option<Arc<CommandPipeline>>,
    connection: Mutex<Option<Arc<Connection>>>,
}

impl Client {
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub fn listeners(&self) -> &Arc<Listeners> {
        &self.listeners
    }

    /// The command registry, when commands are enabled.
    pub fn commands(&self) -> Option<&Arc<CommandRegistry>> {
        self.commands.as_ref().map(|pipeline| pipeline.registry())
    }

    /// The local account, known once `ready` has arrived.
    pub fn user(&self) -> Option<User> {
        self.cache.self_user()
    }

    pub fn get_user(&self, user_id: &str) -> Option<User> {
        self.cache.get_user(user_id)
    }

    pub fn get_server(&self, server_id: &str) -> Option<Server> {
        self.cache.get_server(server_id)
    }

    pub fn get_channel(&self, channel_id: &str) -> Option<Channel> {
        self.cache.get_channel(channel_id)
    }

    pub async fn wait_for<P>(&self, event: &str, predicate: P, timeout: Option<Duration>) -> Result<Event, WaitError>
    where
        P: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        self.listeners.wait_for(event, predicate, timeout).await
    }

    /// Connection state, while the client is running.
    pub fn state(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.connection().map(|c| c.state())
    }

    pub fn begin_typing(&self, channel_id: &str) -> Result<(), ClientError> {
        let connection = self.connection().ok_or(GatewayError::NotConnected)?;
        Ok(connection.begin_typing(channel_id)?)
    }

    pub fn end_typing(&self, channel_id: &str) -> Result<(), ClientError> {
        let connection = self.connection().ok_or(GatewayError::NotConnected)?;
        Ok(connection.end_typing(channel_id)?)
    }

    /// Close the gateway connection; `run` returns shortly after.
    pub fn shutdown(&self) {
        if let Some(connection) = self.connection() {
            connection.shutdown();
        }
    }

    /// Connect to the gateway and process frames until the connection closes.
    pub async fn run(&self) -> Result<(), ClientError> {
        let url = self.gateway_url().await?;

        let mut dispatcher = Dispatcher::new(self.cache.clone(), self.http.clone(), self.listeners.clone())
            .fetch_members_on_ready(self.config.client.fetch_members_on_ready);
        if let Some(pipeline) = &self.commands {
            dispatcher = dispatcher.with_commands(pipeline.clone());
        }

        let connection = Arc::new(Connection::new(
            GatewayConfig {
                url,
                token: self.config.client.token.clone(),
                heartbeat: self.config.heartbeat(),
                reconnect: self.config.reconnect_policy(),
            },
            Arc::new(dispatcher),
        ));
        {
            let mut slot = self.connection.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_some() {
                return Err(ClientError::AlreadyRunning);
            }
            *slot = Some(connection.clone());
        }

        let result = connection.run().await;
        self.connection.lock().unwrap_or_else(PoisonError::into_inner).take();
        info!("client stopped");
        Ok(result?)
    }

    /// The configured gateway URL, or the one the API root advertises.
    async fn gateway_url(&self) -> Result<String, ClientError> {
        if let Some(url) = &self.config.client.ws_url {
            return Ok(http_to_ws_scheme(url));
        }
        let info = self.http.api_info().await?;
        info!(ws = %info.ws, version = info.revolt.as_deref().unwrap_or("unknown"), "fetched API info");
        Ok(http_to_ws_scheme(&info.ws))
    }

    fn connection(&self) -> Option<Arc<Connection>> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}
