use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::model::channel::{Channel, ChannelPayloadError};
use crate::model::member::MemberPayload;
use crate::model::message::{MessagePayload, SendMessage};
use crate::model::server::ServerPayload;
use crate::model::user::User;
use crate::model::validation;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid channel in response: {0}")]
    Channel(#[from] ChannelPayloadError),
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl HttpError {
    /// Status code for errors the server answered with.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Forbidden(_) => Some(403),
            Self::Server { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Request/response transport: one authenticated call, decoded as JSON.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, HttpError>;
}

/// `reqwest` transport against the REST API.
pub struct RestTransport {
    client: reqwest::Client,
    api_url: String,
    token: String,
    bot: bool,
}

impl RestTransport {
    pub fn new(api_url: &str, token: &str, bot: bool, timeout: Duration) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            bot,
        })
    }
}

#[async_trait]
impl Transport for RestTransport {
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, HttpError> {
        let url = format!("{}{}", self.api_url, path);
        let auth_header = if self.bot { "x-bot-token" } else { "x-session-token" };

        let mut req = self
            .client
            .request(method.clone(), &url)
            .header(auth_header, &self.token);
        if let Some(mut body) = body {
            if method == Method::POST
                && let Some(obj) = body.as_object_mut()
            {
                obj.entry("nonce")
                    .or_insert_with(|| Value::String(uuid::Uuid::new_v4().to_string()));
            }
            req = req.json(&body);
        }

        debug!(%method, %path, "REST request");
        let response = req.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status == reqwest::StatusCode::FORBIDDEN {
            return Err(HttpError::Forbidden(text));
        }
        if status.is_client_error() || status.is_server_error() {
            return Err(HttpError::Server {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// Root document of the API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiInfo {
    pub revolt: Option<String>,
    pub ws: String,
    pub app: Option<String>,
    #[serde(default)]
    pub features: Value,
}

/// Response of the bulk member fetch.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberList {
    pub members: Vec<MemberPayload>,
    pub users: Vec<User>,
}

/// Typed REST helpers over a [`Transport`]. Cheap to clone.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    timeout: Option<Duration>,
}

impl HttpClient {
    pub fn new(api_url: &str, token: &str, bot: bool, timeout: Duration) -> Result<Self, HttpError> {
        let transport = RestTransport::new(api_url, token, bot, timeout)?;
        Ok(Self::with_transport(Arc::new(transport)).with_timeout(timeout))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            timeout: None,
        }
    }

    /// Bound every call, whatever the transport does.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, HttpError> {
        let call = self.transport.request(method, path, body);
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| HttpError::Timeout(limit))?,
            None => call.await,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, HttpError> {
        let value = self.request(Method::GET, path, None).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn api_info(&self) -> Result<ApiInfo, HttpError> {
        self.get("/").await
    }

    pub async fn fetch_user(&self, user_id: &str) -> Result<User, HttpError> {
        self.get(&format!("/users/{user_id}")).await
    }

    pub async fn fetch_channel(&self, channel_id: &str) -> Result<Channel, HttpError> {
        let value = self.request(Method::GET, &format!("/channels/{channel_id}"), None).await?;
        Ok(Channel::from_value(value)?)
    }

    pub async fn fetch_server(&self, server_id: &str) -> Result<ServerPayload, HttpError> {
        self.get(&format!("/servers/{server_id}")).await
    }

    pub async fn fetch_member(&self, server_id: &str, user_id: &str) -> Result<MemberPayload, HttpError> {
        self.get(&format!("/servers/{server_id}/members/{user_id}")).await
    }

    pub async fn fetch_members(&self, server_id: &str) -> Result<MemberList, HttpError> {
        self.get(&format!("/servers/{server_id}/members")).await
    }

    pub async fn fetch_message(&self, channel_id: &str, message_id: &str) -> Result<MessagePayload, HttpError> {
        self.get(&format!("/channels/{channel_id}/messages/{message_id}")).await
    }

    /// Validate and post a message.
    pub async fn send_message(&self, channel_id: &str, message: &SendMessage) -> Result<MessagePayload, HttpError> {
        validation::validate_message(message).map_err(HttpError::InvalidMessage)?;
        let body = serde_json::to_value(message)?;
        let value = self
            .request(Method::POST, &format!("/channels/{channel_id}/messages"), Some(body))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<MessagePayload, HttpError> {
        validation::validate_content(Some(content), false).map_err(HttpError::InvalidMessage)?;
        let value = self
            .request(
                Method::PATCH,
                &format!("/channels/{channel_id}/messages/{message_id}"),
                Some(serde_json::json!({ "content": content })),
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<(), HttpError> {
        self.request(
            Method::DELETE,
            &format!("/channels/{channel_id}/messages/{message_id}"),
            None,
        )
        .await?;
        Ok(())
    }

    /// Open (or fetch the existing) direct message channel with a user.
    pub async fn open_dm(&self, user_id: &str) -> Result<Channel, HttpError> {
        let value = self.request(Method::GET, &format!("/users/{user_id}/dm"), None).await?;
        Ok(Channel::from_value(value)?)
    }
}
