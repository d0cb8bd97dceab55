use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::file::File;

/// Relationship between the local account and another user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RelationshipType {
    #[default]
    None,
    /// The local account itself.
    User,
    Friend,
    Outgoing,
    Incoming,
    Blocked,
    BlockedOther,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presence {
    Online,
    Idle,
    Focus,
    Busy,
    Invisible,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Status {
    pub text: Option<String>,
    pub presence: Option<Presence>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotInfo {
    pub owner: String,
}

/// A user as known to the cache.
///
/// `member_of` is the back-reference set of servers this user has a cached
/// [`Member`](super::Member) projection in. It holds ids only, so it never
/// keeps a member alive; the cache clears entries when a server or member is
/// torn down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: String,
    pub display_name: Option<String>,
    pub avatar: Option<File>,
    #[serde(default)]
    pub badges: u32,
    #[serde(default)]
    pub flags: u32,
    #[serde(default)]
    pub online: bool,
    pub status: Option<Status>,
    #[serde(default)]
    pub relationship: RelationshipType,
    pub bot: Option<BotInfo>,
    #[serde(default)]
    pub privileged: bool,
    #[serde(skip)]
    pub member_of: BTreeSet<String>,
}

impl User {
    pub fn is_bot(&self) -> bool {
        self.bot.is_some()
    }

    pub fn bot_owner_id(&self) -> Option<&str> {
        self.bot.as_ref().map(|b| b.owner.as_str())
    }

    /// Display name when set, otherwise the username.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }

    /// `username#discriminator`, or just the username when there is none.
    pub fn tag(&self) -> String {
        if self.discriminator.is_empty() {
            self.username.clone()
        } else {
            format!("{}#{}", self.username, self.discriminator)
        }
    }

    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(
            self.relationship,
            RelationshipType::Blocked | RelationshipType::BlockedOther
        )
    }

    /// Apply a partial update, then drop the cleared fields.
    pub fn apply_patch(&mut self, patch: UserPatch, clear: &[UserField]) {
        if let Some(username) = patch.username {
            self.username = username;
        }
        if let Some(discriminator) = patch.discriminator {
            self.discriminator = discriminator;
        }
        if let Some(display_name) = patch.display_name {
            self.display_name = Some(display_name);
        }
        if let Some(avatar) = patch.avatar {
            self.avatar = Some(avatar);
        }
        if let Some(badges) = patch.badges {
            self.badges = badges;
        }
        if let Some(flags) = patch.flags {
            self.flags = flags;
        }
        if let Some(online) = patch.online {
            self.online = online;
        }
        if let Some(status) = patch.status {
            self.status = Some(status);
        }

        for field in clear {
            match field {
                UserField::Avatar => self.avatar = None,
                UserField::DisplayName => self.display_name = None,
                UserField::StatusText => {
                    if let Some(status) = self.status.as_mut() {
                        status.text = None;
                    }
                }
                UserField::StatusPresence => {
                    if let Some(status) = self.status.as_mut() {
                        status.presence = None;
                    }
                }
                UserField::ProfileContent | UserField::ProfileBackground => {}
            }
        }
    }
}

/// Partial user fields carried by `UserUpdate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub username: Option<String>,
    pub discriminator: Option<String>,
    pub display_name: Option<String>,
    pub avatar: Option<File>,
    pub badges: Option<u32>,
    pub flags: Option<u32>,
    pub online: Option<bool>,
    pub status: Option<Status>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum UserField {
    Avatar,
    DisplayName,
    StatusText,
    StatusPresence,
    ProfileContent,
    ProfileBackground,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alice() -> User {
        serde_json::from_value(json!({
            "_id": "u1",
            "username": "alice",
            "discriminator": "0001",
            "status": { "text": "busy day", "presence": "Busy" },
            "bot": { "owner": "u9" }
        }))
        .unwrap()
    }

    #[test]
    fn test_minimal_payload_defaults() {
        let user: User = serde_json::from_value(json!({ "_id": "u2", "username": "bob" })).unwrap();
        assert_eq!(user.relationship, RelationshipType::None);
        assert!(!user.online);
        assert!(!user.is_bot());
        assert!(user.member_of.is_empty());
        assert_eq!(user.tag(), "bob");
    }

    #[test]
    fn test_bot_owner_and_tag() {
        let user = alice();
        assert!(user.is_bot());
        assert_eq!(user.bot_owner_id(), Some("u9"));
        assert_eq!(user.tag(), "alice#0001");
        assert_eq!(user.mention(), "<@u1>");
        assert_eq!(user.name(), "alice");
    }

    #[test]
    fn test_apply_patch_and_clear() {
        let mut user = alice();
        let patch: UserPatch =
            serde_json::from_value(json!({ "display_name": "Ally", "online": true })).unwrap();
        user.apply_patch(patch, &[UserField::StatusText]);

        assert_eq!(user.name(), "Ally");
        assert!(user.online);
        let status = user.status.as_ref().unwrap();
        assert_eq!(status.text, None);
        assert_eq!(status.presence, Some(Presence::Busy));

        user.apply_patch(UserPatch::default(), &[UserField::DisplayName]);
        assert_eq!(user.name(), "alice");
    }

    #[test]
    fn test_blocked_relationships() {
        let mut user = alice();
        assert!(!user.is_blocked());
        user.relationship = RelationshipType::BlockedOther;
        assert!(user.is_blocked());
    }
}
