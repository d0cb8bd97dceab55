use async_trait::async_trait;

use super::channel::{Channel, DirectMessage, GroupChannel, SavedMessages};
use super::member::Member;
use super::message::{MessagePayload, SendMessage};
use super::user::User;
use crate::http::{HttpClient, HttpError};

/// Something messages can be sent to.
#[async_trait]
pub trait Messageable: Send + Sync {
    /// Id of the channel messages end up in.
    async fn message_channel_id(&self, http: &HttpClient) -> Result<String, HttpError>;

    async fn send(&self, http: &HttpClient, message: SendMessage) -> Result<MessagePayload, HttpError> {
        let channel_id = self.message_channel_id(http).await?;
        http.send_message(&channel_id, &message).await
    }

    async fn fetch_message(&self, http: &HttpClient, message_id: &str) -> Result<MessagePayload, HttpError> {
        let channel_id = self.message_channel_id(http).await?;
        http.fetch_message(&channel_id, message_id).await
    }
}

#[async_trait]
impl Messageable for SavedMessages {
    async fn message_channel_id(&self, _http: &HttpClient) -> Result<String, HttpError> {
        Ok(self.id.clone())
    }
}

#[async_trait]
impl Messageable for DirectMessage {
    async fn message_channel_id(&self, _http: &HttpClient) -> Result<String, HttpError> {
        Ok(self.id.clone())
    }
}

#[async_trait]
impl Messageable for GroupChannel {
    async fn message_channel_id(&self, _http: &HttpClient) -> Result<String, HttpError> {
        Ok(self.id.clone())
    }
}

#[async_trait]
impl Messageable for Channel {
    async fn message_channel_id(&self, _http: &HttpClient) -> Result<String, HttpError> {
        if !self.is_messageable() {
            return Err(HttpError::InvalidMessage(format!(
                "{} channels do not accept messages",
                self.channel_type()
            )));
        }
        Ok(self.id().to_string())
    }
}

/// Users are messaged through their direct message channel.
#[async_trait]
impl Messageable for User {
    async fn message_channel_id(&self, http: &HttpClient) -> Result<String, HttpError> {
        Ok(http.open_dm(&self.id).await?.id().to_string())
    }
}

#[async_trait]
impl Messageable for Member {
    async fn message_channel_id(&self, http: &HttpClient) -> Result<String, HttpError> {
        self.user.message_channel_id(http).await
    }
}
