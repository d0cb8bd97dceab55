use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::file::File;
use super::user::User;

/// Composite key of a member: the server it lives in and the user it projects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberId {
    pub server: String,
    pub user: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberPayload {
    #[serde(rename = "_id")]
    pub id: MemberId,
    pub nickname: Option<String>,
    pub avatar: Option<File>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub timeout: Option<DateTime<Utc>>,
    pub joined_at: Option<DateTime<Utc>>,
}

/// A per-server projection of a [`User`].
///
/// `user` is a snapshot of the baseline user taken when the member was built.
/// `roles` holds role ids ordered by descending rank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Member {
    pub server_id: String,
    pub user: User,
    pub nickname: Option<String>,
    pub avatar: Option<File>,
    pub roles: Vec<String>,
    pub timeout: Option<DateTime<Utc>>,
    pub joined_at: Option<DateTime<Utc>>,
}

impl Member {
    /// Build from a payload; `ranked_roles` must already be sorted.
    pub fn new(payload: MemberPayload, user: &User, ranked_roles: Vec<String>) -> Self {
        let mut baseline = user.clone();
        baseline.member_of.clear();
        Self {
            server_id: payload.id.server,
            user: baseline,
            nickname: payload.nickname,
            avatar: payload.avatar,
            roles: ranked_roles,
            timeout: payload.timeout,
            joined_at: payload.joined_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.user.id
    }

    /// Nickname, then the user's display name, then the username.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or_else(|| self.user.name())
    }

    /// Server avatar, falling back to the user's avatar.
    pub fn avatar(&self) -> Option<&File> {
        self.avatar.as_ref().or(self.user.avatar.as_ref())
    }

    pub fn is_timed_out(&self, now: DateTime<Utc>) -> bool {
        self.timeout.is_some_and(|until| until > now)
    }

    pub fn has_role(&self, role_id: &str) -> bool {
        self.roles.iter().any(|r| r == role_id)
    }

    pub fn mention(&self) -> String {
        self.user.mention()
    }

    /// Apply a partial update. Role re-ordering is left to the caller, which
    /// owns the server's role table.
    pub fn apply_patch(&mut self, patch: MemberPatch, clear: &[MemberField]) {
        if let Some(nickname) = patch.nickname {
            self.nickname = Some(nickname);
        }
        if let Some(avatar) = patch.avatar {
            self.avatar = Some(avatar);
        }
        if let Some(roles) = patch.roles {
            self.roles = roles;
        }
        if let Some(timeout) = patch.timeout {
            self.timeout = Some(timeout);
        }
        for field in clear {
            match field {
                MemberField::Nickname => self.nickname = None,
                MemberField::Avatar => self.avatar = None,
                MemberField::Roles => self.roles.clear(),
                MemberField::Timeout => self.timeout = None,
            }
        }
    }
}

/// Partial member fields carried by `ServerMemberUpdate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberPatch {
    pub nickname: Option<String>,
    pub avatar: Option<File>,
    pub roles: Option<Vec<String>>,
    pub timeout: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum MemberField {
    Nickname,
    Avatar,
    Roles,
    Timeout,
}
