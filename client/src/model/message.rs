use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::embed::{Embed, SendableEmbed};
use super::file::File;
use super::member::Member;
use super::user::User;

/// A timestamp that arrives either as an RFC 3339 string or as `{"$date": ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Plain(DateTime<Utc>),
    Wrapped {
        #[serde(rename = "$date")]
        date: DateTime<Utc>,
    },
}

impl Timestamp {
    pub fn into_datetime(self) -> DateTime<Utc> {
        match self {
            Self::Plain(date) | Self::Wrapped { date } => date,
        }
    }
}

/// Name/avatar override a bot can send a message under.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Masquerade {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Message content is plain text for user messages and a structured object
/// for system messages.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    System(Value),
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagePayload {
    #[serde(rename = "_id")]
    pub id: String,
    pub channel: String,
    pub author: String,
    pub content: Option<MessageContent>,
    #[serde(default)]
    pub attachments: Vec<File>,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    pub edited: Option<Timestamp>,
    pub masquerade: Option<Masquerade>,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default)]
    pub replies: Vec<String>,
}

/// Who sent a message, resolved at construction time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MessageAuthor {
    Member(Box<Member>),
    User(Box<User>),
    /// The author is not cached (webhooks, system senders).
    Unknown(String),
}

impl MessageAuthor {
    pub fn id(&self) -> &str {
        match self {
            Self::Member(m) => m.id(),
            Self::User(u) => &u.id,
            Self::Unknown(id) => id,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Member(m) => Some(&m.user),
            Self::User(u) => Some(u),
            Self::Unknown(_) => None,
        }
    }

    pub fn member(&self) -> Option<&Member> {
        match self {
            Self::Member(m) => Some(m),
            _ => None,
        }
    }
}

/// A cached message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: String,
    pub content: String,
    /// Structured body of a system message.
    pub system: Option<Value>,
    pub attachments: Vec<File>,
    pub embeds: Vec<Embed>,
    pub channel_id: String,
    pub server_id: Option<String>,
    pub author: MessageAuthor,
    pub edited_at: Option<DateTime<Utc>>,
    pub masquerade: Option<Masquerade>,
    pub mentions: Vec<String>,
    pub replies: Vec<String>,
}

impl Message {
    pub fn author_id(&self) -> &str {
        self.author.id()
    }

    /// Masquerade name, then server nickname, then the user's own name.
    pub fn author_display_name(&self) -> Option<&str> {
        if let Some(name) = self.masquerade.as_ref().and_then(|m| m.name.as_deref()) {
            return Some(name);
        }
        match &self.author {
            MessageAuthor::Member(m) => Some(m.display_name()),
            MessageAuthor::User(u) => Some(u.name()),
            MessageAuthor::Unknown(_) => None,
        }
    }

    /// Masquerade avatar URL, or the id of the member or user avatar file.
    pub fn author_avatar(&self) -> Option<&str> {
        if let Some(avatar) = self.masquerade.as_ref().and_then(|m| m.avatar.as_deref()) {
            return Some(avatar);
        }
        match &self.author {
            MessageAuthor::Member(m) => m.avatar().map(|f| f.id.as_str()),
            MessageAuthor::User(u) => u.avatar.as_ref().map(|f| f.id.as_str()),
            MessageAuthor::Unknown(_) => None,
        }
    }

    pub fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }

    pub fn apply_patch(&mut self, patch: MessagePatch) {
        if let Some(content) = patch.content {
            match content {
                MessageContent::Text(text) => self.content = text,
                MessageContent::System(value) => self.system = Some(value),
            }
        }
        if let Some(edited) = patch.edited {
            self.edited_at = Some(edited.into_datetime());
        }
        if let Some(embeds) = patch.embeds {
            self.embeds = embeds;
        }
    }
}

/// Partial message fields carried by `MessageUpdate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePatch {
    pub content: Option<MessageContent>,
    pub edited: Option<Timestamp>,
    pub embeds: Option<Vec<Embed>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub id: String,
    pub mention: bool,
}

/// Body of an outgoing message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SendMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<SendableEmbed>,
    /// Ids of previously uploaded files.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<Reply>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masquerade: Option<Masquerade>,
}

impl SendMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn embed(mut self, embed: SendableEmbed) -> Self {
        self.embeds.push(embed);
        self
    }

    pub fn reply_to(mut self, message_id: impl Into<String>, mention: bool) -> Self {
        self.replies.push(Reply {
            id: message_id.into(),
            mention,
        });
        self
    }

    pub fn masquerade(mut self, masquerade: Masquerade) -> Self {
        self.masquerade = Some(masquerade);
        self
    }
}
