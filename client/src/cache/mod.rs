pub mod history;

use std::sync::RwLock;

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info};

use crate::model::calculator::{calculate_channel_permissions, calculate_server_permissions};
use crate::model::channel::{Channel, ChannelField, ChannelPatch, ChannelPayloadError};
use crate::model::member::{Member, MemberField, MemberPatch, MemberPayload};
use crate::model::message::{Message, MessageAuthor, MessageContent, MessagePatch, MessagePayload};
use crate::model::permissions::Permissions;
use crate::model::role::{Role, RoleField, RolePatch};
use crate::model::server::{Server, ServerField, ServerPatch, ServerPayload};
use crate::model::user::{RelationshipType, User, UserField, UserPatch};

pub use history::{DEFAULT_MAX_MESSAGES, MessageHistory};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("server {0} is not cached")]
    UnknownServer(String),
    #[error("user {0} is not cached")]
    UnknownUser(String),
    #[error("channel {0} is not cached")]
    UnknownChannel(String),
    #[error(transparent)]
    Channel(#[from] ChannelPayloadError),
}

/// In-memory entity graph.
///
/// Only the event dispatcher writes; everything else reads. Getters return
/// owned snapshots so no map guard ever escapes this type.
pub struct Cache {
    users: DashMap<String, User>,
    servers: DashMap<String, Server>,
    channels: DashMap<String, Channel>,
    messages: MessageHistory,
    /// Id of the local account, learned from the ready snapshot.
    self_id: RwLock<Option<String>>,
}

impl Cache {
    pub fn new(max_messages: usize) -> Self {
        Self {
            users: DashMap::new(),
            servers: DashMap::new(),
            channels: DashMap::new(),
            messages: MessageHistory::new(max_messages),
            self_id: RwLock::new(None),
        }
    }

    // ── Local account ───────────────────────────────────────────────

    pub fn self_id(&self) -> Option<String> {
        self.self_id
            .read()
            .map(|id| id.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub(crate) fn set_self_id(&self, user_id: &str) {
        let mut slot = self.self_id.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(user_id.to_string());
    }

    pub fn self_user(&self) -> Option<User> {
        self.self_id().and_then(|id| self.get_user(&id))
    }

    // ── Lookups ─────────────────────────────────────────────────────

    pub fn get_user(&self, user_id: &str) -> Option<User> {
        self.users.get(user_id).map(|u| u.clone())
    }

    pub fn get_server(&self, server_id: &str) -> Option<Server> {
        self.servers.get(server_id).map(|s| s.clone())
    }

    pub fn get_channel(&self, channel_id: &str) -> Option<Channel> {
        self.channels.get(channel_id).map(|c| c.clone())
    }

    pub fn get_member(&self, server_id: &str, user_id: &str) -> Option<Member> {
        self.servers
            .get(server_id)
            .and_then(|s| s.get_member(user_id).cloned())
    }

    pub fn get_role(&self, server_id: &str, role_id: &str) -> Option<Role> {
        self.servers
            .get(server_id)
            .and_then(|s| s.get_role(role_id).cloned())
    }

    pub fn get_message(&self, message_id: &str) -> Option<Message> {
        self.messages.get(message_id)
    }

    pub fn users(&self) -> Vec<User> {
        self.users.iter().map(|u| u.clone()).collect()
    }

    pub fn servers(&self) -> Vec<Server> {
        self.servers.iter().map(|s| s.clone()).collect()
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.channels.iter().map(|c| c.clone()).collect()
    }

    /// Cached messages, newest first.
    pub fn messages(&self) -> Vec<Message> {
        self.messages.snapshot()
    }

    pub fn message_capacity(&self) -> usize {
        self.messages.capacity()
    }

    pub fn find_user<P>(&self, predicate: P) -> Option<User>
    where
        P: Fn(&User) -> bool,
    {
        self.users.iter().find(|u| predicate(u)).map(|u| u.clone())
    }

    /// Channels of a server, in the server's order. Ids not cached are skipped.
    pub fn server_channels(&self, server_id: &str) -> Vec<Channel> {
        let Some(ids) = self.servers.get(server_id).map(|s| s.channel_ids.clone()) else {
            return Vec::new();
        };
        ids.iter().filter_map(|id| self.get_channel(id)).collect()
    }

    /// Cached channels of one server category, in category order.
    pub fn category_channels(&self, server_id: &str, category_id: &str) -> Vec<Channel> {
        let Some(ids) = self
            .servers
            .get(server_id)
            .and_then(|s| s.get_category(category_id).map(|c| c.channel_ids.clone()))
        else {
            return Vec::new();
        };
        ids.iter().filter_map(|id| self.get_channel(id)).collect()
    }

    /// Roles of a server ordered by descending rank.
    pub fn server_roles(&self, server_id: &str) -> Vec<Role> {
        self.servers
            .get(server_id)
            .map(|s| s.roles().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every cached member projection of a user.
    pub fn members_of_user(&self, user_id: &str) -> Vec<Member> {
        let Some(server_ids) = self.users.get(user_id).map(|u| u.member_of.clone()) else {
            return Vec::new();
        };
        server_ids
            .iter()
            .filter_map(|server_id| self.get_member(server_id, user_id))
            .collect()
    }

    // ── Construction ────────────────────────────────────────────────

    /// Upsert a user. Member back-references survive the replacement.
    pub fn add_user(&self, mut user: User) -> User {
        if user.relationship == RelationshipType::User {
            self.set_self_id(&user.id);
        }
        if let Some(existing) = self.users.get(&user.id) {
            user.member_of.extend(existing.member_of.iter().cloned());
        }
        self.users.insert(user.id.clone(), user.clone());
        user
    }

    /// Upsert a server. Members of an already cached server are kept.
    pub fn add_server(&self, payload: ServerPayload) -> Server {
        let mut server = Server::from_payload(payload);
        if let Some((_, old)) = self.servers.remove(&server.id) {
            server.members = old.members;
            server.rerank_members();
        }
        self.servers.insert(server.id.clone(), server.clone());
        server
    }

    /// Build a channel from its tagged payload and upsert it.
    pub fn add_channel(&self, payload: Value) -> Result<Channel, CacheError> {
        let channel = Channel::from_value(payload)?;
        if let Some(server_id) = channel.server_id()
            && let Some(mut server) = self.servers.get_mut(server_id)
            && !server.channel_ids.iter().any(|id| id == channel.id())
        {
            server.channel_ids.push(channel.id().to_string());
        }
        self.channels.insert(channel.id().to_string(), channel.clone());
        Ok(channel)
    }

    /// Build a member and insert it into its server. Both the server and the
    /// user must already be cached.
    pub fn add_member(&self, payload: MemberPayload) -> Result<Member, CacheError> {
        let server_id = payload.id.server.clone();
        let user_id = payload.id.user.clone();

        if !self.servers.contains_key(&server_id) {
            return Err(CacheError::UnknownServer(server_id));
        }
        let user = self
            .get_user(&user_id)
            .ok_or_else(|| CacheError::UnknownUser(user_id.clone()))?;

        let member = {
            let mut server = self
                .servers
                .get_mut(&server_id)
                .ok_or_else(|| CacheError::UnknownServer(server_id.clone()))?;
            let ranked = server.rank_role_ids(&payload.roles);
            let member = Member::new(payload, &user, ranked);
            server.members.insert(user_id.clone(), member.clone());
            member
        };

        if let Some(mut user) = self.users.get_mut(&user_id) {
            user.member_of.insert(server_id);
        }
        Ok(member)
    }

    /// Build a message without touching the cache.
    ///
    /// The channel must be cached. The author resolves to the server member
    /// when there is one, then to the user, and is left unresolved otherwise.
    pub fn build_message(&self, payload: &MessagePayload) -> Result<Message, CacheError> {
        let server_id = self
            .channels
            .get(&payload.channel)
            .ok_or_else(|| CacheError::UnknownChannel(payload.channel.clone()))?
            .server_id()
            .map(str::to_string);

        let author = server_id
            .as_deref()
            .and_then(|sid| self.get_member(sid, &payload.author))
            .map(|m| MessageAuthor::Member(Box::new(m)))
            .or_else(|| {
                self.get_user(&payload.author)
                    .map(|u| MessageAuthor::User(Box::new(u)))
            })
            .unwrap_or_else(|| MessageAuthor::Unknown(payload.author.clone()));

        let (content, system) = match payload.content.clone() {
            Some(MessageContent::Text(text)) => (text, None),
            Some(MessageContent::System(value)) => (String::new(), Some(value)),
            None => (String::new(), None),
        };

        Ok(Message {
            id: payload.id.clone(),
            content,
            system,
            attachments: payload.attachments.clone(),
            embeds: payload.embeds.clone(),
            channel_id: payload.channel.clone(),
            server_id,
            author,
            edited_at: payload.edited.map(|t| t.into_datetime()),
            masquerade: payload.masquerade.clone(),
            mentions: payload.mentions.clone(),
            replies: payload.replies.clone(),
        })
    }

    /// Build a message, prepend it to the history and evict past capacity.
    pub fn add_message(&self, payload: MessagePayload) -> Result<Message, CacheError> {
        let message = self.build_message(&payload)?;
        if let Some(mut channel) = self.channels.get_mut(&message.channel_id) {
            channel.set_last_message_id(&message.id);
        }
        let evicted = self.messages.push(message.clone());
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "evicted messages from history");
        }
        Ok(message)
    }

    // ── Updates ─────────────────────────────────────────────────────

    pub fn update_message(&self, message_id: &str, patch: MessagePatch) -> Option<(Message, Message)> {
        self.messages.update(message_id, |m| m.apply_patch(patch))
    }

    pub fn remove_message(&self, message_id: &str) -> Option<Message> {
        self.messages.remove(message_id)
    }

    pub fn update_channel(
        &self,
        channel_id: &str,
        patch: ChannelPatch,
        clear: &[ChannelField],
    ) -> Option<(Channel, Channel)> {
        let mut channel = self.channels.get_mut(channel_id)?;
        let before = channel.clone();
        channel.apply_patch(patch, clear);
        Some((before, channel.clone()))
    }

    pub fn remove_channel(&self, channel_id: &str) -> Option<Channel> {
        let (_, channel) = self.channels.remove(channel_id)?;
        if let Some(server_id) = channel.server_id()
            && let Some(mut server) = self.servers.get_mut(server_id)
        {
            server.channel_ids.retain(|id| id != channel_id);
        }
        Some(channel)
    }

    pub fn update_server(
        &self,
        server_id: &str,
        patch: ServerPatch,
        clear: &[ServerField],
    ) -> Option<(Server, Server)> {
        let mut server = self.servers.get_mut(server_id)?;
        let before = server.clone();
        server.apply_patch(patch, clear);
        Some((before, server.clone()))
    }

    /// Remove a server together with its channels and members.
    pub fn remove_server(&self, server_id: &str) -> Option<Server> {
        let (_, server) = self.servers.remove(server_id)?;

        for user_id in server.members.keys() {
            if let Some(mut user) = self.users.get_mut(user_id) {
                user.member_of.remove(server_id);
            }
        }
        for channel_id in &server.channel_ids {
            self.channels.remove(channel_id);
        }
        self.channels.retain(|_, c| c.server_id() != Some(server_id));

        info!(%server_id, members = server.member_count(), "server removed from cache");
        Some(server)
    }

    pub fn update_member(
        &self,
        server_id: &str,
        user_id: &str,
        patch: MemberPatch,
        clear: &[MemberField],
    ) -> Option<(Member, Member)> {
        let mut server = self.servers.get_mut(server_id)?;
        let ranked = patch.roles.as_ref().map(|roles| server.rank_role_ids(roles));
        let member = server.members.get_mut(user_id)?;
        let before = member.clone();
        member.apply_patch(patch, clear);
        if let Some(ranked) = ranked {
            member.roles = ranked;
        }
        Some((before, member.clone()))
    }

    pub fn remove_member(&self, server_id: &str, user_id: &str) -> Option<Member> {
        let member = self.servers.get_mut(server_id)?.members.remove(user_id)?;
        if let Some(mut user) = self.users.get_mut(user_id) {
            user.member_of.remove(server_id);
        }
        Some(member)
    }

    /// Patch a role, creating it when the patch carries enough to build one.
    /// Member role lists are re-ranked afterwards.
    pub fn upsert_role(
        &self,
        server_id: &str,
        role_id: &str,
        patch: RolePatch,
        clear: &[RoleField],
    ) -> Option<(Option<Role>, Role)> {
        let mut server = self.servers.get_mut(server_id)?;
        let result = match server.roles.get_mut(role_id) {
            Some(role) => {
                let before = role.clone();
                role.apply_patch(patch, clear);
                (Some(before), role.clone())
            }
            None => {
                let role = Role::from_payload(role_id, server_id, patch.into_payload()?);
                server.roles.insert(role_id.to_string(), role.clone());
                (None, role)
            }
        };
        server.rerank_members();
        Some(result)
    }

    pub fn remove_role(&self, server_id: &str, role_id: &str) -> Option<Role> {
        let mut server = self.servers.get_mut(server_id)?;
        let role = server.roles.remove(role_id)?;
        for member in server.members.values_mut() {
            member.roles.retain(|id| id != role_id);
        }
        Some(role)
    }

    /// Patch a user and refresh the baseline copied into its members.
    pub fn update_user(&self, user_id: &str, patch: UserPatch, clear: &[UserField]) -> Option<(User, User)> {
        let (before, after) = {
            let mut user = self.users.get_mut(user_id)?;
            let before = user.clone();
            user.apply_patch(patch, clear);
            (before, user.clone())
        };
        self.refresh_member_baselines(&after);
        Some((before, after))
    }

    /// Set the relationship of a user; returns the user and its previous state.
    pub fn set_relationship(&self, user_id: &str, relationship: RelationshipType) -> Option<(User, RelationshipType)> {
        let (user, before) = {
            let mut user = self.users.get_mut(user_id)?;
            let before = user.relationship;
            user.relationship = relationship;
            (user.clone(), before)
        };
        self.refresh_member_baselines(&user);
        Some((user, before))
    }

    fn refresh_member_baselines(&self, user: &User) {
        for server_id in &user.member_of {
            if let Some(mut server) = self.servers.get_mut(server_id)
                && let Some(member) = server.members.get_mut(&user.id)
            {
                let mut baseline = user.clone();
                baseline.member_of.clear();
                member.user = baseline;
            }
        }
    }

    /// Drop users, servers and channels ahead of a fresh ready snapshot.
    /// Message history is kept.
    pub fn reset_entities(&self) {
        self.users.clear();
        self.servers.clear();
        self.channels.clear();
    }

    // ── Permissions ─────────────────────────────────────────────────

    pub fn server_permissions(&self, server_id: &str, user_id: &str) -> Option<Permissions> {
        let server = self.servers.get(server_id)?;
        if server.is_owner(user_id) {
            return Some(Permissions::all());
        }
        let member = server.get_member(user_id)?;
        Some(calculate_server_permissions(&server, member, Utc::now()))
    }

    pub fn channel_permissions(&self, channel_id: &str, user_id: &str) -> Option<Permissions> {
        let channel = self.get_channel(channel_id)?;
        let user = self.get_user(user_id)?;
        let server = channel.server_id().and_then(|sid| self.get_server(sid));
        let recipient = match &channel {
            Channel::DirectMessage(dm) => dm.recipient(user_id).and_then(|id| self.get_user(id)),
            _ => None,
        };
        Some(calculate_channel_permissions(
            &channel,
            &user,
            server.as_ref(),
            recipient.as_ref(),
            Utc::now(),
        ))
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGES)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn user(id: &str, name: &str) -> User {
        serde_json::from_value(json!({ "_id": id, "username": name })).unwrap()
    }

    pub(crate) fn server_payload(id: &str, owner: &str, channels: &[&str]) -> ServerPayload {
        serde_json::from_value(json!({
            "_id": id,
            "owner": owner,
            "name": format!("server {id}"),
            "channels": channels,
            "categories": [{ "id": "k1", "title": "Lobby", "channels": channels }],
            "default_permissions": (1u64 << 20) | (1u64 << 22),
            "roles": {
                "r5": { "name": "Admin", "rank": 5 },
                "r1": { "name": "Member", "rank": 1 }
            }
        }))
        .unwrap()
    }

    pub(crate) fn text_channel(id: &str, server: &str, name: &str) -> Value {
        json!({ "_id": id, "channel_type": "TextChannel", "server": server, "name": name })
    }

    pub(crate) fn member_payload(server: &str, user: &str, roles: &[&str]) -> MemberPayload {
        serde_json::from_value(json!({ "_id": { "server": server, "user": user }, "roles": roles })).unwrap()
    }

    pub(crate) fn message_payload(id: &str, channel: &str, author: &str, content: &str) -> MessagePayload {
        serde_json::from_value(json!({
            "_id": id, "channel": channel, "author": author, "content": content
        }))
        .unwrap()
    }

    /// A cache with one server `s1` (owner `u1`), channel `c1`, and users
    /// `u1`/`u2` where `u2` is a member with role `r1`.
    pub(crate) fn populated() -> Cache {
        let cache = Cache::new(10);
        cache.add_user(user("u1", "alice"));
        cache.add_user(user("u2", "bob"));
        cache.add_server(server_payload("s1", "u1", &["c1"]));
        cache.add_channel(text_channel("c1", "s1", "general")).unwrap();
        cache.add_member(member_payload("s1", "u2", &["r1"])).unwrap();
        cache
    }

    #[test]
    fn test_lookups_return_absent() {
        let cache = Cache::default();
        assert!(cache.get_user("nope").is_none());
        assert!(cache.get_server("nope").is_none());
        assert!(cache.get_channel("nope").is_none());
        assert!(cache.get_member("nope", "nope").is_none());
        assert!(cache.get_message("nope").is_none());
        assert_eq!(cache.message_capacity(), DEFAULT_MAX_MESSAGES);
    }

    #[test]
    fn test_add_member_requires_server() {
        let cache = Cache::new(10);
        cache.add_user(user("u1", "alice"));
        let err = cache.add_member(member_payload("s9", "u1", &[])).unwrap_err();
        assert!(matches!(err, CacheError::UnknownServer(id) if id == "s9"));
    }

    #[test]
    fn test_add_member_requires_user() {
        let cache = Cache::new(10);
        cache.add_server(server_payload("s1", "u1", &[]));
        let err = cache.add_member(member_payload("s1", "ghost", &[])).unwrap_err();
        assert!(matches!(err, CacheError::UnknownUser(_)));
    }

    #[test]
    fn test_category_channels() {
        let cache = populated();
        let channels = cache.category_channels("s1", "k1");
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].id(), "c1");
        assert!(cache.category_channels("s1", "k9").is_empty());
        assert!(cache.category_channels("s9", "k1").is_empty());
    }

    #[test]
    fn test_member_back_reference() {
        let cache = populated();
        let members = cache.members_of_user("u2");
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].server_id, "s1");
        assert!(cache.get_user("u2").unwrap().member_of.contains("s1"));
    }

    #[test]
    fn test_remove_server_clears_children_and_back_references() {
        let cache = populated();
        let removed = cache.remove_server("s1").unwrap();
        assert_eq!(removed.member_count(), 1);

        assert!(cache.get_channel("c1").is_none());
        assert!(cache.get_member("s1", "u2").is_none());
        assert!(cache.members_of_user("u2").is_empty());
        assert!(cache.get_user("u2").unwrap().member_of.is_empty());
    }

    #[test]
    fn test_add_channel_links_server() {
        let cache = populated();
        cache.add_channel(text_channel("c2", "s1", "random")).unwrap();
        let names: Vec<String> = cache
            .server_channels("s1")
            .iter()
            .filter_map(|c| c.name().map(str::to_string))
            .collect();
        assert_eq!(names, vec!["general", "random"]);

        cache.remove_channel("c1");
        assert_eq!(cache.get_server("s1").unwrap().channel_ids, vec!["c2"]);
    }

    #[test]
    fn test_unknown_channel_type_fails_construction() {
        let cache = Cache::new(10);
        let err = cache
            .add_channel(json!({ "_id": "x", "channel_type": "Stage" }))
            .unwrap_err();
        assert!(matches!(err, CacheError::Channel(ChannelPayloadError::UnknownType(_))));
        assert!(cache.get_channel("x").is_none());
    }

    #[test]
    fn test_message_author_resolution() {
        let cache = populated();

        let from_member = cache.add_message(message_payload("m1", "c1", "u2", "hi")).unwrap();
        assert!(matches!(from_member.author, MessageAuthor::Member(_)));
        assert_eq!(from_member.server_id.as_deref(), Some("s1"));

        // u1 owns the server but has no member projection.
        let from_user = cache.add_message(message_payload("m2", "c1", "u1", "hey")).unwrap();
        assert!(matches!(from_user.author, MessageAuthor::User(_)));

        let from_ghost = cache.add_message(message_payload("m3", "c1", "wh", "boo")).unwrap();
        assert!(matches!(from_ghost.author, MessageAuthor::Unknown(ref id) if id == "wh"));
    }

    #[test]
    fn test_message_without_channel_fails() {
        let cache = populated();
        let err = cache.add_message(message_payload("m1", "nowhere", "u2", "hi")).unwrap_err();
        assert!(matches!(err, CacheError::UnknownChannel(_)));
        assert!(cache.get_message("m1").is_none());
    }

    #[test]
    fn test_build_message_is_read_only() {
        let cache = populated();
        let message = cache.build_message(&message_payload("m1", "c1", "u2", "hi")).unwrap();
        assert_eq!(message.content, "hi");
        assert!(cache.get_message("m1").is_none());
    }

    #[test]
    fn test_bounded_history_through_cache() {
        let cache = populated();
        for i in 0..11 {
            cache.add_message(message_payload(&format!("m{i}"), "c1", "u2", "x")).unwrap();
        }
        let ids: Vec<String> = cache.messages().into_iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), 10);
        assert_eq!(ids.first().map(String::as_str), Some("m10"));
        assert!(!ids.contains(&"m0".to_string()));

        let channel = cache.get_channel("c1").unwrap();
        assert_eq!(channel.as_server_channel().unwrap().last_message_id.as_deref(), Some("m10"));
    }

    #[test]
    fn test_role_upsert_reranks_members() {
        let cache = populated();
        cache
            .update_member("s1", "u2", MemberPatch { roles: Some(vec!["r1".into(), "r5".into()]), ..Default::default() }, &[])
            .unwrap();
        assert_eq!(cache.get_member("s1", "u2").unwrap().roles, vec!["r5", "r1"]);

        let (before, after) = cache
            .upsert_role("s1", "r1", RolePatch { rank: Some(9), ..Default::default() }, &[])
            .unwrap();
        assert_eq!(before.unwrap().rank, 1);
        assert_eq!(after.rank, 9);
        assert_eq!(cache.get_member("s1", "u2").unwrap().roles, vec!["r1", "r5"]);

        let ranks: Vec<i64> = cache.server_roles("s1").iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![9, 5]);
    }

    #[test]
    fn test_role_upsert_creates_when_named() {
        let cache = populated();
        assert!(cache.upsert_role("s1", "r7", RolePatch::default(), &[]).is_none());
        let (before, role) = cache
            .upsert_role("s1", "r7", RolePatch { name: Some("New".into()), rank: Some(7), ..Default::default() }, &[])
            .unwrap();
        assert!(before.is_none());
        assert_eq!(role.name, "New");
        assert!(cache.get_role("s1", "r7").is_some());
    }

    #[test]
    fn test_remove_role_strips_members() {
        let cache = populated();
        cache.remove_role("s1", "r1").unwrap();
        assert!(cache.get_member("s1", "u2").unwrap().roles.is_empty());
    }

    #[test]
    fn test_user_update_refreshes_member_baseline() {
        let cache = populated();
        let patch = UserPatch { username: Some("robert".into()), ..Default::default() };
        let (before, after) = cache.update_user("u2", patch, &[]).unwrap();
        assert_eq!(before.username, "bob");
        assert_eq!(after.username, "robert");
        assert_eq!(cache.get_member("s1", "u2").unwrap().user.username, "robert");
    }

    #[test]
    fn test_self_user_from_relationship() {
        let cache = Cache::new(10);
        let mut me = user("me", "bot");
        me.relationship = RelationshipType::User;
        cache.add_user(me);
        assert_eq!(cache.self_id().as_deref(), Some("me"));
        assert_eq!(cache.self_user().unwrap().username, "bot");
    }

    #[test]
    fn test_add_server_keeps_members() {
        let cache = populated();
        cache.add_server(server_payload("s1", "u1", &["c1"]));
        assert!(cache.get_member("s1", "u2").is_some());
    }

    #[test]
    fn test_reset_keeps_messages() {
        let cache = populated();
        cache.add_message(message_payload("m1", "c1", "u2", "hi")).unwrap();
        cache.reset_entities();
        assert!(cache.get_server("s1").is_none());
        assert!(cache.get_user("u1").is_none());
        assert!(cache.get_message("m1").is_some());
    }

    #[test]
    fn test_permissions_through_cache() {
        let cache = populated();
        let perms = cache.channel_permissions("c1", "u2").unwrap();
        assert!(perms.contains(Permissions::SEND_MESSAGE));
        // u1 owns s1 without a member projection.
        assert_eq!(cache.server_permissions("s1", "u1"), Some(Permissions::all()));
        assert_eq!(cache.channel_permissions("c1", "u1"), Some(Permissions::all()));
        assert_eq!(cache.server_permissions("s1", "nobody"), None);
        assert!(cache.channel_permissions("c1", "nobody").is_none());
    }
}
