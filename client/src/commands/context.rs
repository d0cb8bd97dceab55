use std::fmt;
use std::sync::Arc;

use super::command::Command;
use super::converters::Arguments;
use super::registry::CommandRegistry;
use crate::cache::Cache;
use crate::events::Listeners;
use crate::http::{HttpClient, HttpError};
use crate::model::message::MessagePayload;
use crate::model::{Channel, Message, MessageAuthor, SendMessage, Server};

/// Shared state every invocation can reach.
#[derive(Clone)]
pub(crate) struct Handles {
    pub cache: Arc<Cache>,
    pub http: HttpClient,
    pub listeners: Arc<Listeners>,
    pub registry: Arc<CommandRegistry>,
}

/// Everything known about one command invocation.
///
/// Built from the triggering message; `command` is `None` when the name did
/// not resolve. Entity accessors read the cache at call time.
#[derive(Clone)]
pub struct Context {
    pub message: Message,
    /// The prefix that matched.
    pub prefix: String,
    /// The name or alias the command was called by.
    pub invoked_with: String,
    /// Group names walked through before `invoked_with`.
    pub invoked_parents: Vec<String>,
    pub command: Option<Arc<Command>>,
    pub args: Arguments,
    handles: Handles,
}

impl Context {
    pub(crate) fn new(handles: Handles, message: Message, prefix: &str, invoked_with: &str) -> Self {
        Self {
            message,
            prefix: prefix.to_string(),
            invoked_with: invoked_with.to_string(),
            invoked_parents: Vec::new(),
            command: None,
            args: Arguments::default(),
            handles,
        }
    }

    pub fn author_id(&self) -> &str {
        self.message.author_id()
    }

    pub fn author(&self) -> &MessageAuthor {
        &self.message.author
    }

    pub fn channel_id(&self) -> &str {
        &self.message.channel_id
    }

    pub fn server_id(&self) -> Option<&str> {
        self.message.server_id.as_deref()
    }

    pub fn channel(&self) -> Option<Channel> {
        self.handles.cache.get_channel(self.channel_id())
    }

    pub fn server(&self) -> Option<Server> {
        self.server_id().and_then(|id| self.handles.cache.get_server(id))
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.handles.cache
    }

    pub fn http(&self) -> &HttpClient {
        &self.handles.http
    }

    pub fn listeners(&self) -> &Arc<Listeners> {
        &self.handles.listeners
    }

    pub fn commands(&self) -> &Arc<CommandRegistry> {
        &self.handles.registry
    }

    /// Usage line of the resolved command.
    pub fn usage(&self) -> Option<String> {
        self.command
            .as_ref()
            .map(|command| command.usage_line(&self.invoked_parents))
    }

    /// Post a text message to the invoking channel.
    pub async fn send(&self, content: impl Into<String>) -> Result<MessagePayload, HttpError> {
        self.send_message(&SendMessage::text(content)).await
    }

    /// Post a text message replying to the invoking message.
    pub async fn reply(&self, content: impl Into<String>) -> Result<MessagePayload, HttpError> {
        let message = SendMessage::text(content).reply_to(&self.message.id, false);
        self.send_message(&message).await
    }

    pub async fn send_message(&self, message: &SendMessage) -> Result<MessagePayload, HttpError> {
        self.handles.http.send_message(self.channel_id(), message).await
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("message", &self.message.id)
            .field("channel", &self.message.channel_id)
            .field("author", &self.author_id())
            .field("prefix", &self.prefix)
            .field("invoked_with", &self.invoked_with)
            .field("invoked_parents", &self.invoked_parents)
            .field("command", &self.command.as_ref().map(|c| c.name.as_str()))
            .field("args", &self.args)
            .finish()
    }
}
