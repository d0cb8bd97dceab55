use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::file::File;
use super::permissions::{PermissionOverride, Permissions};

/// The `channel_type` tag of a channel payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    SavedMessages,
    DirectMessage,
    Group,
    TextChannel,
    VoiceChannel,
}

impl ChannelType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SavedMessages" => Some(Self::SavedMessages),
            "DirectMessage" => Some(Self::DirectMessage),
            "Group" => Some(Self::Group),
            "TextChannel" => Some(Self::TextChannel),
            "VoiceChannel" => Some(Self::VoiceChannel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SavedMessages => "SavedMessages",
            Self::DirectMessage => "DirectMessage",
            Self::Group => "Group",
            Self::TextChannel => "TextChannel",
            Self::VoiceChannel => "VoiceChannel",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelPayloadError {
    #[error("channel payload has no channel_type")]
    MissingType,
    #[error("unknown channel type `{0}`")]
    UnknownType(String),
    #[error("invalid {kind} payload: {source}")]
    Invalid {
        kind: ChannelType,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedMessages {
    #[serde(rename = "_id")]
    pub id: String,
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectMessage {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub recipients: Vec<String>,
    pub last_message_id: Option<String>,
}

impl DirectMessage {
    /// The recipient that is not `self_id`.
    pub fn recipient<'a>(&'a self, self_id: &str) -> Option<&'a str> {
        self.recipients
            .iter()
            .map(String::as_str)
            .find(|id| *id != self_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupChannel {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub recipients: Vec<String>,
    pub description: Option<String>,
    pub icon: Option<File>,
    pub permissions: Option<Permissions>,
    #[serde(default)]
    pub nsfw: bool,
    pub last_message_id: Option<String>,
}

/// Fields shared by text and voice channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerChannel {
    #[serde(rename = "_id")]
    pub id: String,
    pub server: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<File>,
    pub default_permissions: Option<PermissionOverride>,
    #[serde(default)]
    pub role_permissions: HashMap<String, PermissionOverride>,
    #[serde(default)]
    pub nsfw: bool,
    pub last_message_id: Option<String>,
}

impl ServerChannel {
    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }
}

/// A cached channel, one variant per `channel_type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Channel {
    SavedMessages(SavedMessages),
    DirectMessage(DirectMessage),
    Group(GroupChannel),
    TextChannel(ServerChannel),
    VoiceChannel(ServerChannel),
}

impl Channel {
    /// Build the variant selected by the payload's `channel_type` tag.
    pub fn from_value(value: Value) -> Result<Self, ChannelPayloadError> {
        let tag = value
            .get("channel_type")
            .and_then(Value::as_str)
            .ok_or(ChannelPayloadError::MissingType)?;
        let kind =
            ChannelType::parse(tag).ok_or_else(|| ChannelPayloadError::UnknownType(tag.to_string()))?;
        let invalid = |source| ChannelPayloadError::Invalid { kind, source };

        let channel = match kind {
            ChannelType::SavedMessages => {
                Self::SavedMessages(serde_json::from_value(value).map_err(invalid)?)
            }
            ChannelType::DirectMessage => {
                Self::DirectMessage(serde_json::from_value(value).map_err(invalid)?)
            }
            ChannelType::Group => Self::Group(serde_json::from_value(value).map_err(invalid)?),
            ChannelType::TextChannel => {
                Self::TextChannel(serde_json::from_value(value).map_err(invalid)?)
            }
            ChannelType::VoiceChannel => {
                Self::VoiceChannel(serde_json::from_value(value).map_err(invalid)?)
            }
        };
        Ok(channel)
    }

    pub fn id(&self) -> &str {
        match self {
            Self::SavedMessages(c) => &c.id,
            Self::DirectMessage(c) => &c.id,
            Self::Group(c) => &c.id,
            Self::TextChannel(c) | Self::VoiceChannel(c) => &c.id,
        }
    }

    pub fn channel_type(&self) -> ChannelType {
        match self {
            Self::SavedMessages(_) => ChannelType::SavedMessages,
            Self::DirectMessage(_) => ChannelType::DirectMessage,
            Self::Group(_) => ChannelType::Group,
            Self::TextChannel(_) => ChannelType::TextChannel,
            Self::VoiceChannel(_) => ChannelType::VoiceChannel,
        }
    }

    /// Owning server for text and voice channels.
    pub fn server_id(&self) -> Option<&str> {
        self.as_server_channel().map(|c| c.server.as_str())
    }

    pub fn as_server_channel(&self) -> Option<&ServerChannel> {
        match self {
            Self::TextChannel(c) | Self::VoiceChannel(c) => Some(c),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Group(c) => Some(&c.name),
            Self::TextChannel(c) | Self::VoiceChannel(c) => Some(&c.name),
            Self::SavedMessages(_) | Self::DirectMessage(_) => None,
        }
    }

    /// Whether messages can be sent to this channel.
    pub fn is_messageable(&self) -> bool {
        !matches!(self, Self::VoiceChannel(_))
    }

    pub fn mention(&self) -> String {
        format!("<#{}>", self.id())
    }

    pub fn apply_patch(&mut self, patch: ChannelPatch, clear: &[ChannelField]) {
        match self {
            Self::SavedMessages(_) => {}
            Self::DirectMessage(c) => {
                if let Some(active) = patch.active {
                    c.active = active;
                }
                if let Some(last) = patch.last_message_id {
                    c.last_message_id = Some(last);
                }
            }
            Self::Group(c) => {
                if let Some(name) = patch.name {
                    c.name = name;
                }
                if let Some(owner) = patch.owner {
                    c.owner = owner;
                }
                if let Some(description) = patch.description {
                    c.description = Some(description);
                }
                if let Some(icon) = patch.icon {
                    c.icon = Some(icon);
                }
                if let Some(permissions) = patch.permissions {
                    c.permissions = Some(permissions);
                }
                if let Some(nsfw) = patch.nsfw {
                    c.nsfw = nsfw;
                }
                if let Some(last) = patch.last_message_id {
                    c.last_message_id = Some(last);
                }
                for field in clear {
                    match field {
                        ChannelField::Icon => c.icon = None,
                        ChannelField::Description => c.description = None,
                    }
                }
            }
            Self::TextChannel(c) | Self::VoiceChannel(c) => {
                if let Some(name) = patch.name {
                    c.name = name;
                }
                if let Some(description) = patch.description {
                    c.description = Some(description);
                }
                if let Some(icon) = patch.icon {
                    c.icon = Some(icon);
                }
                if let Some(default_permissions) = patch.default_permissions {
                    c.default_permissions = Some(default_permissions);
                }
                if let Some(role_permissions) = patch.role_permissions {
                    c.role_permissions = role_permissions;
                }
                if let Some(nsfw) = patch.nsfw {
                    c.nsfw = nsfw;
                }
                if let Some(last) = patch.last_message_id {
                    c.last_message_id = Some(last);
                }
                for field in clear {
                    match field {
                        ChannelField::Icon => c.icon = None,
                        ChannelField::Description => c.description = None,
                    }
                }
            }
        }
    }

    pub(crate) fn set_last_message_id(&mut self, message_id: &str) {
        let slot = match self {
            Self::DirectMessage(c) => &mut c.last_message_id,
            Self::Group(c) => &mut c.last_message_id,
            Self::TextChannel(c) => &mut c.last_message_id,
            Self::SavedMessages(_) | Self::VoiceChannel(_) => return,
        };
        *slot = Some(message_id.to_string());
    }
}

/// Partial channel fields carried by `ChannelUpdate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelPatch {
    pub name: Option<String>,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub icon: Option<File>,
    pub nsfw: Option<bool>,
    pub active: Option<bool>,
    pub permissions: Option<Permissions>,
    pub default_permissions: Option<PermissionOverride>,
    pub role_permissions: Option<HashMap<String, PermissionOverride>>,
    pub last_message_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ChannelField {
    Icon,
    Description,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dispatch_on_channel_type() {
        let text = Channel::from_value(json!({
            "_id": "c1",
            "channel_type": "TextChannel",
            "server": "s1",
            "name": "general",
            "role_permissions": { "r1": { "a": 0, "d": 1 << 22 } }
        }))
        .unwrap();
        assert_eq!(text.channel_type(), ChannelType::TextChannel);
        assert_eq!(text.server_id(), Some("s1"));
        assert_eq!(text.name(), Some("general"));
        assert!(text.is_messageable());

        let saved = Channel::from_value(json!({
            "_id": "c2", "channel_type": "SavedMessages", "user": "u1"
        }))
        .unwrap();
        assert_eq!(saved.server_id(), None);
        assert_eq!(saved.id(), "c2");

        let voice = Channel::from_value(json!({
            "_id": "c3", "channel_type": "VoiceChannel", "server": "s1", "name": "lounge"
        }))
        .unwrap();
        assert!(!voice.is_messageable());
    }

    #[test]
    fn test_unknown_channel_type_is_an_error() {
        let err = Channel::from_value(json!({ "_id": "c1", "channel_type": "Hologram" })).unwrap_err();
        assert!(matches!(err, ChannelPayloadError::UnknownType(t) if t == "Hologram"));

        let err = Channel::from_value(json!({ "_id": "c1" })).unwrap_err();
        assert!(matches!(err, ChannelPayloadError::MissingType));
    }

    #[test]
    fn test_invalid_variant_payload() {
        let err = Channel::from_value(json!({ "_id": "c1", "channel_type": "Group" })).unwrap_err();
        assert!(matches!(
            err,
            ChannelPayloadError::Invalid { kind: ChannelType::Group, .. }
        ));
    }

    #[test]
    fn test_dm_recipient() {
        let Channel::DirectMessage(dm) = Channel::from_value(json!({
            "_id": "d1", "channel_type": "DirectMessage", "active": true, "recipients": ["me", "you"]
        }))
        .unwrap() else {
            panic!("expected a direct message");
        };
        assert_eq!(dm.recipient("me"), Some("you"));
    }

    #[test]
    fn test_patch_and_clear() {
        let mut channel = Channel::from_value(json!({
            "_id": "c1", "channel_type": "TextChannel", "server": "s1",
            "name": "general", "description": "talk here"
        }))
        .unwrap();
        channel.apply_patch(
            ChannelPatch {
                name: Some("lobby".into()),
                ..Default::default()
            },
            &[ChannelField::Description],
        );
        let server_channel = channel.as_server_channel().unwrap();
        assert_eq!(server_channel.name, "lobby");
        assert_eq!(server_channel.description, None);
    }

    #[test]
    fn test_channel_type_roundtrip() {
        for kind in [
            ChannelType::SavedMessages,
            ChannelType::DirectMessage,
            ChannelType::Group,
            ChannelType::TextChannel,
            ChannelType::VoiceChannel,
        ] {
            assert_eq!(ChannelType::parse(kind.as_str()), Some(kind));
        }
    }
}
