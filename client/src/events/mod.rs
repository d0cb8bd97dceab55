pub mod listeners;

use std::sync::Arc;

use serde_json::Value;

use crate::commands::{CommandError, Context};
use crate::model::{Channel, Member, Message, RelationshipType, Role, Server, User};

pub use listeners::{EventHandler, Listeners, WaitError};

/// An event announced to listeners after the cache has been updated.
///
/// Update events carry a `(before, after)` pair of snapshots.
#[derive(Debug, Clone)]
pub enum Event {
    Ready,
    Message(Message),
    /// The raw `MessageUpdate` frame, announced even when the message is not cached.
    RawMessageUpdate(Value),
    MessageUpdate {
        before: Message,
        after: Message,
    },
    /// The raw `MessageDelete` frame, announced even when the message is not cached.
    RawMessageDelete(Value),
    MessageDelete(Message),
    ChannelCreate(Channel),
    ChannelUpdate {
        before: Channel,
        after: Channel,
    },
    ChannelDelete(Channel),
    TypingStart {
        channel_id: String,
        user_id: String,
    },
    TypingStop {
        channel_id: String,
        user_id: String,
    },
    ServerUpdate {
        before: Server,
        after: Server,
    },
    ServerDelete(Server),
    MemberJoin(Member),
    MemberUpdate {
        before: Member,
        after: Member,
    },
    MemberLeave(Member),
    RoleUpdate {
        before: Option<Role>,
        after: Role,
    },
    RoleDelete(Role),
    UserUpdate {
        before: User,
        after: User,
    },
    UserRelationshipUpdate {
        user: User,
        before: RelationshipType,
        after: RelationshipType,
    },
    /// A command was resolved and is about to run its checks.
    Command(Box<Context>),
    /// A command callback returned successfully.
    AfterCommandInvoke(Box<Context>),
    CommandError {
        context: Box<Context>,
        error: Arc<CommandError>,
    },
}

impl Event {
    /// Listener name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Message(_) => "message",
            Self::RawMessageUpdate(_) => "raw_message_update",
            Self::MessageUpdate { .. } => "message_update",
            Self::RawMessageDelete(_) => "raw_message_delete",
            Self::MessageDelete(_) => "message_delete",
            Self::ChannelCreate(_) => "channel_create",
            Self::ChannelUpdate { .. } => "channel_update",
            Self::ChannelDelete(_) => "channel_delete",
            Self::TypingStart { .. } => "typing_start",
            Self::TypingStop { .. } => "typing_stop",
            Self::ServerUpdate { .. } => "server_update",
            Self::ServerDelete(_) => "server_delete",
            Self::MemberJoin(_) => "member_join",
            Self::MemberUpdate { .. } => "member_update",
            Self::MemberLeave(_) => "member_leave",
            Self::RoleUpdate { .. } => "role_update",
            Self::RoleDelete(_) => "role_delete",
            Self::UserUpdate { .. } => "user_update",
            Self::UserRelationshipUpdate { .. } => "user_relationship_update",
            Self::Command(_) => "command",
            Self::AfterCommandInvoke(_) => "after_command_invoke",
            Self::CommandError { .. } => "command_error",
        }
    }

    /// The message of a `message` event.
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Self::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_message(self) -> Option<Message> {
        match self {
            Self::Message(m) => Some(m),
            _ => None,
        }
    }
}
