//! Wire shapes of gateway frames.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::member::{MemberId, MemberPatch, MemberPayload};
use crate::model::message::MessagePatch;
use crate::model::role::RolePatch;
use crate::model::server::ServerPayload;
use crate::model::user::{RelationshipType, User};

/// Frames the client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    Authenticate { token: String },
    /// Heartbeat; `data` is echoed back in the `Pong`.
    Ping { data: i64 },
    BeginTyping { channel: String },
    EndTyping { channel: String },
}

impl ClientFrame {
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Initial snapshot sent once authentication succeeds.
#[derive(Debug, Deserialize)]
pub(crate) struct ReadyFrame {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub servers: Vec<ServerPayload>,
    /// Kept raw so one bad channel does not spoil the snapshot.
    #[serde(default)]
    pub channels: Vec<Value>,
    #[serde(default)]
    pub members: Vec<MemberPayload>,
}

/// Frames that only name an entity.
#[derive(Debug, Deserialize)]
pub(crate) struct IdFrame {
    pub id: String,
}

/// Partial update of the entity `id`. `clear` lists fields to unset.
#[derive(Debug, Deserialize)]
pub(crate) struct UpdateFrame<P> {
    pub id: String,
    pub data: P,
    #[serde(default)]
    pub clear: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageUpdateFrame {
    pub id: String,
    pub channel: String,
    pub data: MessagePatch,
}

/// `ChannelStartTyping` / `ChannelStopTyping`.
#[derive(Debug, Deserialize)]
pub(crate) struct TypingFrame {
    pub id: String,
    pub user: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MemberUpdateFrame {
    pub id: MemberId,
    pub data: MemberPatch,
    #[serde(default)]
    pub clear: Vec<Value>,
}

/// `ServerMemberJoin` / `ServerMemberLeave`: `id` is the server.
#[derive(Debug, Deserialize)]
pub(crate) struct MemberFrame {
    pub id: String,
    pub user: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleUpdateFrame {
    pub id: String,
    pub role_id: String,
    pub data: RolePatch,
    #[serde(default)]
    pub clear: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleDeleteFrame {
    pub id: String,
    pub role_id: String,
}

/// A user named either by id or by a full object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum UserRef {
    Id(String),
    User(Box<User>),
}

#[derive(Debug, Deserialize)]
pub(crate) struct RelationshipFrame {
    pub user: UserRef,
    pub status: RelationshipType,
}

/// Decode the `clear` list, skipping field names this client does not know.
pub(crate) fn clear_fields<T: DeserializeOwned>(raw: &[Value]) -> Vec<T> {
    raw.iter()
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .collect()
}
