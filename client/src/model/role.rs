use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::permissions::PermissionOverride;

/// A server role. Higher `rank` sorts first and wins permission conflicts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Role {
    pub id: String,
    pub server_id: String,
    pub name: String,
    pub permissions: PermissionOverride,
    pub colour: Option<String>,
    pub hoist: bool,
    pub rank: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RolePayload {
    pub name: String,
    #[serde(default)]
    pub permissions: PermissionOverride,
    pub colour: Option<String>,
    #[serde(default)]
    pub hoist: bool,
    #[serde(default)]
    pub rank: i64,
}

impl Role {
    pub fn from_payload(id: &str, server_id: &str, payload: RolePayload) -> Self {
        Self {
            id: id.to_string(),
            server_id: server_id.to_string(),
            name: payload.name,
            permissions: payload.permissions,
            colour: payload.colour,
            hoist: payload.hoist,
            rank: payload.rank,
        }
    }

    pub fn mention(&self) -> String {
        format!("<%{}>", self.id)
    }

    pub fn apply_patch(&mut self, patch: RolePatch, clear: &[RoleField]) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(permissions) = patch.permissions {
            self.permissions = permissions;
        }
        if let Some(colour) = patch.colour {
            self.colour = Some(colour);
        }
        if let Some(hoist) = patch.hoist {
            self.hoist = hoist;
        }
        if let Some(rank) = patch.rank {
            self.rank = rank;
        }
        for field in clear {
            match field {
                RoleField::Colour => self.colour = None,
            }
        }
    }
}

/// Descending by rank; equal ranks fall back to id so the order is stable.
pub fn by_rank_desc(a: &Role, b: &Role) -> Ordering {
    b.rank.cmp(&a.rank).then_with(|| a.id.cmp(&b.id))
}

/// Partial role fields carried by `ServerRoleUpdate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RolePatch {
    pub name: Option<String>,
    pub permissions: Option<PermissionOverride>,
    pub colour: Option<String>,
    pub hoist: Option<bool>,
    pub rank: Option<i64>,
}

impl RolePatch {
    /// A patch for an unknown role carries enough to build it from scratch.
    pub fn into_payload(self) -> Option<RolePayload> {
        Some(RolePayload {
            name: self.name?,
            permissions: self.permissions.unwrap_or_default(),
            colour: self.colour,
            hoist: self.hoist.unwrap_or(false),
            rank: self.rank.unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RoleField {
    Colour,
}
