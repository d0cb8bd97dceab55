use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::category::Category;
use super::file::File;
use super::member::Member;
use super::permissions::Permissions;
use super::role::{Role, RolePayload, by_rank_desc};

#[derive(Debug, Clone, Deserialize)]
pub struct ServerPayload {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub roles: HashMap<String, RolePayload>,
    #[serde(default)]
    pub default_permissions: Permissions,
    pub icon: Option<File>,
    pub banner: Option<File>,
    #[serde(default)]
    pub nsfw: bool,
}

/// In-memory state for a server. Owns its roles and members; channels live
/// in the cache's channel map and are referenced here by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub description: Option<String>,
    pub icon: Option<File>,
    pub banner: Option<File>,
    pub nsfw: bool,
    pub default_permissions: Permissions,
    /// Channel ids in the order the server lists them.
    pub channel_ids: Vec<String>,
    pub categories: Vec<Category>,
    pub(crate) roles: HashMap<String, Role>,
    pub(crate) members: HashMap<String, Member>,
}

impl Server {
    pub fn from_payload(payload: ServerPayload) -> Self {
        let roles = payload
            .roles
            .into_iter()
            .map(|(role_id, role)| {
                let role = Role::from_payload(&role_id, &payload.id, role);
                (role_id, role)
            })
            .collect();

        Self {
            id: payload.id,
            name: payload.name,
            owner_id: payload.owner,
            description: payload.description,
            icon: payload.icon,
            banner: payload.banner,
            nsfw: payload.nsfw,
            default_permissions: payload.default_permissions,
            channel_ids: payload.channels,
            categories: payload.categories,
            roles,
            members: HashMap::new(),
        }
    }

    /// Roles ordered by descending rank.
    pub fn roles(&self) -> Vec<&Role> {
        let mut roles: Vec<&Role> = self.roles.values().collect();
        roles.sort_by(|a, b| by_rank_desc(a, b));
        roles
    }

    pub fn get_category(&self, category_id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == category_id)
    }

    /// Category holding `channel_id`, if any.
    pub fn category_of(&self, channel_id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.contains(channel_id))
    }

    pub fn get_role(&self, role_id: &str) -> Option<&Role> {
        self.roles.get(role_id)
    }

    pub fn get_member(&self, user_id: &str) -> Option<&Member> {
        self.members.get(user_id)
    }

    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owner_id == user_id
    }

    /// Keep only role ids this server knows, ordered by descending rank.
    pub fn rank_role_ids(&self, role_ids: &[String]) -> Vec<String> {
        let mut known: Vec<&Role> = role_ids.iter().filter_map(|id| self.roles.get(id)).collect();
        known.sort_by(|a, b| by_rank_desc(a, b));
        known.dedup_by(|a, b| a.id == b.id);
        known.into_iter().map(|r| r.id.clone()).collect()
    }

    /// Re-rank every member's role list after the role table changed.
    pub(crate) fn rerank_members(&mut self) {
        let ranked: Vec<(String, Vec<String>)> = self
            .members
            .iter()
            .map(|(user_id, member)| (user_id.clone(), self.rank_role_ids(&member.roles)))
            .collect();
        for (user_id, roles) in ranked {
            if let Some(member) = self.members.get_mut(&user_id) {
                member.roles = roles;
            }
        }
    }

    pub fn apply_patch(&mut self, patch: ServerPatch, clear: &[ServerField]) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(owner) = patch.owner {
            self.owner_id = owner;
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(icon) = patch.icon {
            self.icon = Some(icon);
        }
        if let Some(banner) = patch.banner {
            self.banner = Some(banner);
        }
        if let Some(nsfw) = patch.nsfw {
            self.nsfw = nsfw;
        }
        if let Some(default_permissions) = patch.default_permissions {
            self.default_permissions = default_permissions;
        }
        if let Some(channels) = patch.channels {
            self.channel_ids = channels;
        }
        if let Some(categories) = patch.categories {
            self.categories = categories;
        }
        for field in clear {
            match field {
                ServerField::Icon => self.icon = None,
                ServerField::Banner => self.banner = None,
                ServerField::Description => self.description = None,
                ServerField::Categories => self.categories.clear(),
            }
        }
    }
}

/// Partial server fields carried by `ServerUpdate`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerPatch {
    pub name: Option<String>,
    pub owner: Option<String>,
    pub description: Option<String>,
    pub icon: Option<File>,
    pub banner: Option<File>,
    pub nsfw: Option<bool>,
    pub default_permissions: Option<Permissions>,
    pub channels: Option<Vec<String>>,
    pub categories: Option<Vec<Category>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ServerField {
    Icon,
    Banner,
    Description,
    Categories,
}
