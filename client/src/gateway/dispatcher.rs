use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::DispatchError;
use super::frames::{
    IdFrame, MemberFrame, MemberUpdateFrame, MessageUpdateFrame, ReadyFrame, RelationshipFrame, RoleDeleteFrame,
    RoleUpdateFrame, TypingFrame, UpdateFrame, UserRef, clear_fields,
};
use crate::cache::{Cache, CacheError};
use crate::commands::CommandPipeline;
use crate::events::{Event, Listeners};
use crate::http::HttpClient;
use crate::model::channel::ChannelPatch;
use crate::model::member::{MemberId, MemberPayload};
use crate::model::message::MessagePayload;
use crate::model::server::ServerPatch;
use crate::model::user::UserPatch;

/// What a frame turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Authenticated,
    /// The initial snapshot was loaded and `ready` announced.
    Ready,
    Pong,
    /// The cache was updated and an event announced.
    Event,
    /// Unknown discriminant, or an update for something not cached.
    Ignored,
}

fn decode<T: DeserializeOwned>(kind: &str, frame: Value) -> Result<T, DispatchError> {
    serde_json::from_value(frame).map_err(|source| DispatchError::Malformed {
        kind: kind.to_string(),
        source,
    })
}

/// Applies decoded frames to the cache, then announces them.
///
/// The only writer of the cache. Frames must be handled one at a time in
/// arrival order; listeners and commands run as their own tasks.
pub struct Dispatcher {
    cache: Arc<Cache>,
    http: HttpClient,
    listeners: Arc<Listeners>,
    commands: Option<Arc<CommandPipeline>>,
    fetch_members_on_ready: bool,
}

impl Dispatcher {
    pub fn new(cache: Arc<Cache>, http: HttpClient, listeners: Arc<Listeners>) -> Self {
        Self {
            cache,
            http,
            listeners,
            commands: None,
            fetch_members_on_ready: false,
        }
    }

    /// Run every `message` through the command pipeline.
    pub fn with_commands(mut self, pipeline: Arc<CommandPipeline>) -> Self {
        self.commands = Some(pipeline);
        self
    }

    pub fn fetch_members_on_ready(mut self, enabled: bool) -> Self {
        self.fetch_members_on_ready = enabled;
        self
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    pub async fn handle_text(&self, text: &str) -> Result<Handled, DispatchError> {
        let frame: Value = serde_json::from_str(text).map_err(|source| DispatchError::Malformed {
            kind: "frame".to_string(),
            source,
        })?;
        self.handle_frame(frame).await
    }

    pub async fn handle_frame(&self, frame: Value) -> Result<Handled, DispatchError> {
        let kind = frame
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DispatchError::MissingType)?
            .to_lowercase();

        match kind.as_str() {
            "authenticated" => {
                debug!("gateway accepted credentials");
                Ok(Handled::Authenticated)
            }
            "pong" => Ok(Handled::Pong),
            "ready" => self.on_ready(decode(&kind, frame)?).await,
            "message" => self.on_message(decode(&kind, frame)?),
            "messageupdate" => self.on_message_update(frame),
            "messagedelete" => self.on_message_delete(frame),
            "channelcreate" => {
                let channel = self.cache.add_channel(frame)?;
                self.announce(Event::ChannelCreate(channel))
            }
            "channelupdate" => {
                let update: UpdateFrame<ChannelPatch> = decode(&kind, frame)?;
                let clear = clear_fields(&update.clear);
                match self.cache.update_channel(&update.id, update.data, &clear) {
                    Some((before, after)) => self.announce(Event::ChannelUpdate { before, after }),
                    None => Ok(self.not_cached(&kind, &update.id)),
                }
            }
            "channeldelete" => {
                let IdFrame { id } = decode(&kind, frame)?;
                match self.cache.remove_channel(&id) {
                    Some(channel) => self.announce(Event::ChannelDelete(channel)),
                    None => Ok(self.not_cached(&kind, &id)),
                }
            }
            "channelstarttyping" | "channelstoptyping" => {
                let TypingFrame { id, user } = decode(&kind, frame)?;
                let event = if kind == "channelstarttyping" {
                    Event::TypingStart {
                        channel_id: id,
                        user_id: user,
                    }
                } else {
                    Event::TypingStop {
                        channel_id: id,
                        user_id: user,
                    }
                };
                self.announce(event)
            }
            "serverupdate" => {
                let update: UpdateFrame<ServerPatch> = decode(&kind, frame)?;
                let clear = clear_fields(&update.clear);
                match self.cache.update_server(&update.id, update.data, &clear) {
                    Some((before, after)) => self.announce(Event::ServerUpdate { before, after }),
                    None => Ok(self.not_cached(&kind, &update.id)),
                }
            }
            "serverdelete" => {
                let IdFrame { id } = decode(&kind, frame)?;
                match self.cache.remove_server(&id) {
                    Some(server) => self.announce(Event::ServerDelete(server)),
                    None => Ok(self.not_cached(&kind, &id)),
                }
            }
            "servermemberupdate" => {
                let update: MemberUpdateFrame = decode(&kind, frame)?;
                let clear = clear_fields(&update.clear);
                let MemberId { server, user } = update.id;
                match self.cache.update_member(&server, &user, update.data, &clear) {
                    Some((before, after)) => self.announce(Event::MemberUpdate { before, after }),
                    None => Ok(self.not_cached(&kind, &user)),
                }
            }
            "servermemberjoin" => self.on_member_join(decode(&kind, frame)?).await,
            "servermemberleave" => {
                let MemberFrame { id, user } = decode(&kind, frame)?;
                match self.cache.remove_member(&id, &user) {
                    Some(member) => self.announce(Event::MemberLeave(member)),
                    None => Ok(self.not_cached(&kind, &user)),
                }
            }
            "serverroleupdate" => {
                let update: RoleUpdateFrame = decode(&kind, frame)?;
                let clear = clear_fields(&update.clear);
                match self.cache.upsert_role(&update.id, &update.role_id, update.data, &clear) {
                    Some((before, after)) => self.announce(Event::RoleUpdate { before, after }),
                    None => Ok(self.not_cached(&kind, &update.role_id)),
                }
            }
            "serverroledelete" => {
                let RoleDeleteFrame { id, role_id } = decode(&kind, frame)?;
                match self.cache.remove_role(&id, &role_id) {
                    Some(role) => self.announce(Event::RoleDelete(role)),
                    None => Ok(self.not_cached(&kind, &role_id)),
                }
            }
            "userupdate" => {
                let update: UpdateFrame<UserPatch> = decode(&kind, frame)?;
                let clear = clear_fields(&update.clear);
                match self.cache.update_user(&update.id, update.data, &clear) {
                    Some((before, after)) => self.announce(Event::UserUpdate { before, after }),
                    None => Ok(self.not_cached(&kind, &update.id)),
                }
            }
            "userrelationship" => {
                let RelationshipFrame { user, status } = decode(&kind, frame)?;
                let user_id = match user {
                    UserRef::Id(id) => id,
                    UserRef::User(user) => {
                        if self.cache.get_user(&user.id).is_some() {
                            user.id
                        } else {
                            self.cache.add_user(*user).id
                        }
                    }
                };
                match self.cache.set_relationship(&user_id, status) {
                    Some((user, before)) => self.announce(Event::UserRelationshipUpdate {
                        user,
                        before,
                        after: status,
                    }),
                    None => Ok(self.not_cached(&kind, &user_id)),
                }
            }
            _ => {
                debug!(kind = %kind, "unknown frame dropped");
                Ok(Handled::Ignored)
            }
        }
    }

    fn announce(&self, event: Event) -> Result<Handled, DispatchError> {
        self.listeners.dispatch(event);
        Ok(Handled::Event)
    }

    fn not_cached(&self, kind: &str, id: &str) -> Handled {
        debug!(kind, %id, "update for uncached entity dropped");
        Handled::Ignored
    }

    /// Replace users, servers and channels with the snapshot. History is kept.
    async fn on_ready(&self, ready: ReadyFrame) -> Result<Handled, DispatchError> {
        self.cache.reset_entities();

        let users = ready.users.len();
        for user in ready.users {
            self.cache.add_user(user);
        }
        let servers = ready.servers.len();
        for server in ready.servers {
            self.cache.add_server(server);
        }
        let mut channels = 0;
        for payload in ready.channels {
            match self.cache.add_channel(payload) {
                Ok(_) => channels += 1,
                Err(e) => warn!(error = %e, "skipping channel in ready snapshot"),
            }
        }
        for member in ready.members {
            if let Err(e) = self.cache.add_member(member) {
                debug!(error = %e, "skipping member in ready snapshot");
            }
        }

        if self.fetch_members_on_ready {
            self.fetch_all_members().await;
        }

        info!(users, servers, channels, "ready snapshot loaded");
        self.listeners.dispatch(Event::Ready);
        Ok(Handled::Ready)
    }

    async fn fetch_all_members(&self) {
        for server in self.cache.servers() {
            let list = match self.http.fetch_members(&server.id).await {
                Ok(list) => list,
                Err(e) => {
                    warn!(server_id = %server.id, error = %e, "failed to fetch server members");
                    continue;
                }
            };
            for user in list.users {
                self.cache.add_user(user);
            }
            let count = list.members.len();
            for member in list.members {
                if let Err(e) = self.cache.add_member(member) {
                    debug!(error = %e, "skipping fetched member");
                }
            }
            debug!(server_id = %server.id, count, "members fetched");
        }
    }

    fn on_message(&self, payload: MessagePayload) -> Result<Handled, DispatchError> {
        let message = self.cache.add_message(payload).inspect_err(|e| {
            if let CacheError::UnknownChannel(channel_id) = e {
                error!(%channel_id, "message for an unknown channel");
            }
        })?;

        self.listeners.dispatch(Event::Message(message.clone()));
        if let Some(pipeline) = &self.commands {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                pipeline.process_message(message).await;
            });
        }
        Ok(Handled::Event)
    }

    fn on_message_update(&self, frame: Value) -> Result<Handled, DispatchError> {
        let update: MessageUpdateFrame = decode("messageupdate", frame.clone())?;
        self.listeners.dispatch(Event::RawMessageUpdate(frame));
        match self.cache.update_message(&update.id, update.data) {
            Some((before, after)) => self.announce(Event::MessageUpdate { before, after }),
            None => Ok(self.not_cached("messageupdate", &update.id)),
        }
    }

    fn on_message_delete(&self, frame: Value) -> Result<Handled, DispatchError> {
        let IdFrame { id } = decode("messagedelete", frame.clone())?;
        self.listeners.dispatch(Event::RawMessageDelete(frame));
        match self.cache.remove_message(&id) {
            Some(message) => self.announce(Event::MessageDelete(message)),
            None => Ok(self.not_cached("messagedelete", &id)),
        }
    }

    /// The joining user may be new to the cache; fetch it before building the member.
    async fn on_member_join(&self, frame: MemberFrame) -> Result<Handled, DispatchError> {
        if self.cache.get_user(&frame.user).is_none() {
            let user = self.http.fetch_user(&frame.user).await?;
            self.cache.add_user(user);
        }
        let member = self.cache.add_member(MemberPayload {
            id: MemberId {
                server: frame.id,
                user: frame.user,
            },
            nickname: None,
            avatar: None,
            roles: Vec::new(),
            timeout: None,
            joined_at: Some(Utc::now()),
        })?;
        self.announce(Event::MemberJoin(member))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::tests::populated;
    use std::time::Duration;

    use crate::http::HttpError;
    use crate::http::testing::{RecordingTransport, StalledTransport};

    fn dispatcher_with(cache: Cache, transport: Arc<RecordingTransport>) -> (Dispatcher, Arc<Listeners>) {
        let listeners = Arc::new(Listeners::new());
        let dispatcher = Dispatcher::new(
            Arc::new(cache),
            HttpClient::with_transport(transport),
            listeners.clone(),
        );
        (dispatcher, listeners)
    }

    fn dispatcher() -> (Dispatcher, Arc<Listeners>) {
        dispatcher_with(populated(), RecordingTransport::echo())
    }

    #[tokio::test]
    async fn test_discriminant_is_case_insensitive() {
        let (d, _) = dispatcher();
        assert_eq!(
            d.handle_frame(json!({ "type": "AUTHENTICATED" })).await.unwrap(),
            Handled::Authenticated
        );
        assert_eq!(d.handle_frame(json!({ "type": "Pong", "data": 1 })).await.unwrap(), Handled::Pong);
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_frames() {
        let (d, _) = dispatcher();
        assert_eq!(
            d.handle_frame(json!({ "type": "EmojiCreate" })).await.unwrap(),
            Handled::Ignored
        );
        assert!(matches!(
            d.handle_frame(json!({ "data": 1 })).await,
            Err(DispatchError::MissingType)
        ));
        assert!(matches!(
            d.handle_text("{not json").await,
            Err(DispatchError::Malformed { .. })
        ));
        assert!(matches!(
            d.handle_frame(json!({ "type": "ChannelDelete" })).await,
            Err(DispatchError::Malformed { kind, .. }) if kind == "channeldelete"
        ));
    }

    #[tokio::test]
    async fn test_ready_bulk_loads_and_announces() {
        let (d, listeners) = dispatcher_with(Cache::new(10), RecordingTransport::echo());
        let ready = listeners.register_waiter("ready", |_| true);

        let handled = d
            .handle_frame(json!({
                "type": "Ready",
                "users": [
                    { "_id": "me", "username": "bot", "relationship": "User" },
                    { "_id": "u2", "username": "bob" }
                ],
                "servers": [{ "_id": "s1", "owner": "u2", "name": "Home", "channels": ["c1"] }],
                "channels": [
                    { "_id": "c1", "channel_type": "TextChannel", "server": "s1", "name": "general" },
                    { "_id": "bad", "channel_type": "Hologram" }
                ],
                "members": [{ "_id": { "server": "s1", "user": "u2" } }]
            }))
            .await
            .unwrap();

        assert_eq!(handled, Handled::Ready);
        assert!(matches!(ready.await.unwrap(), Event::Ready));
        assert_eq!(d.cache().self_id().as_deref(), Some("me"));
        assert_eq!(d.cache().users().len(), 2);
        assert!(d.cache().get_channel("c1").is_some());
        assert!(d.cache().get_channel("bad").is_none());
        assert!(d.cache().get_member("s1", "u2").is_some());
    }

    #[tokio::test]
    async fn test_ready_replaces_entities_but_keeps_history() {
        let (d, _) = dispatcher();
        d.handle_frame(json!({
            "type": "Message", "_id": "m1", "channel": "c1", "author": "u2", "content": "hi"
        }))
        .await
        .unwrap();

        d.handle_frame(json!({ "type": "Ready", "users": [{ "_id": "u9", "username": "new" }] }))
            .await
            .unwrap();
        assert!(d.cache().get_user("u1").is_none());
        assert!(d.cache().get_server("s1").is_none());
        assert!(d.cache().get_message("m1").is_some());
    }

    #[tokio::test]
    async fn test_ready_fetches_members_when_enabled() {
        let transport = RecordingTransport::new(Box::new(|_, path, _| {
            assert_eq!(path, "/servers/s1/members");
            Ok(json!({
                "members": [{ "_id": { "server": "s1", "user": "u3" }, "nickname": "Cee" }],
                "users": [{ "_id": "u3", "username": "carol" }]
            }))
        }));
        let listeners = Arc::new(Listeners::new());
        let d = Dispatcher::new(
            Arc::new(Cache::new(10)),
            HttpClient::with_transport(transport.clone()),
            listeners,
        )
        .fetch_members_on_ready(true);

        d.handle_frame(json!({
            "type": "Ready",
            "servers": [{ "_id": "s1", "owner": "u3", "name": "Home" }]
        }))
        .await
        .unwrap();

        assert_eq!(transport.calls().len(), 1);
        let member = d.cache().get_member("s1", "u3").unwrap();
        assert_eq!(member.display_name(), "Cee");
    }

    #[tokio::test]
    async fn test_message_for_unknown_channel_fails_loudly() {
        let (d, _) = dispatcher();
        let err = d
            .handle_frame(json!({ "type": "Message", "_id": "m1", "channel": "nope", "author": "u2", "content": "x" }))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Cache(CacheError::UnknownChannel(_))));
        assert!(d.cache().messages().is_empty());
    }

    #[tokio::test]
    async fn test_message_update_announces_raw_then_pair() {
        let (d, listeners) = dispatcher();
        d.handle_frame(json!({
            "type": "Message", "_id": "m1", "channel": "c1", "author": "u2", "content": "hi"
        }))
        .await
        .unwrap();

        let raw = listeners.register_waiter("raw_message_update", |_| true);
        let typed = listeners.register_waiter("message_update", |_| true);
        d.handle_frame(json!({
            "type": "MessageUpdate", "id": "m1", "channel": "c1",
            "data": { "content": "edited", "edited": "2024-01-01T00:00:00Z" }
        }))
        .await
        .unwrap();

        assert!(matches!(raw.await.unwrap(), Event::RawMessageUpdate(v) if v["id"] == "m1"));
        match typed.await.unwrap() {
            Event::MessageUpdate { before, after } => {
                assert_eq!(before.content, "hi");
                assert_eq!(after.content, "edited");
                assert!(after.is_edited());
            }
            other => panic!("unexpected {}", other.name()),
        }
    }

    #[tokio::test]
    async fn test_update_for_uncached_message_still_announces_raw() {
        let (d, listeners) = dispatcher();
        let raw = listeners.register_waiter("raw_message_delete", |_| true);
        let handled = d
            .handle_frame(json!({ "type": "MessageDelete", "id": "ghost", "channel": "c1" }))
            .await
            .unwrap();
        assert_eq!(handled, Handled::Ignored);
        assert!(matches!(raw.await.unwrap(), Event::RawMessageDelete(_)));
    }

    #[tokio::test]
    async fn test_channel_lifecycle() {
        let (d, _) = dispatcher();
        d.handle_frame(json!({
            "type": "ChannelCreate", "_id": "c2", "channel_type": "TextChannel",
            "server": "s1", "name": "random", "description": "misc"
        }))
        .await
        .unwrap();
        assert_eq!(d.cache().server_channels("s1").len(), 2);

        d.handle_frame(json!({
            "type": "ChannelUpdate", "id": "c2", "data": { "name": "offtopic" }, "clear": ["Description"]
        }))
        .await
        .unwrap();
        let channel = d.cache().get_channel("c2").unwrap();
        assert_eq!(channel.name(), Some("offtopic"));
        assert_eq!(channel.as_server_channel().unwrap().description, None);

        d.handle_frame(json!({ "type": "ChannelDelete", "id": "c2" })).await.unwrap();
        assert!(d.cache().get_channel("c2").is_none());
        assert_eq!(d.cache().server_channels("s1").len(), 1);
    }

    #[tokio::test]
    async fn test_typing_events() {
        let (d, listeners) = dispatcher();
        let start = listeners.register_waiter("typing_start", |_| true);
        d.handle_frame(json!({ "type": "ChannelStartTyping", "id": "c1", "user": "u2" }))
            .await
            .unwrap();
        assert!(matches!(
            start.await.unwrap(),
            Event::TypingStart { channel_id, user_id } if channel_id == "c1" && user_id == "u2"
        ));
    }

    #[tokio::test]
    async fn test_member_join_fetches_unknown_user() {
        let transport = RecordingTransport::new(Box::new(|_, path, _| {
            assert_eq!(path, "/users/u7");
            Ok(json!({ "_id": "u7", "username": "dave" }))
        }));
        let (d, listeners) = dispatcher_with(populated(), transport.clone());
        let joined = listeners.register_waiter("member_join", |_| true);

        d.handle_frame(json!({ "type": "ServerMemberJoin", "id": "s1", "user": "u7" }))
            .await
            .unwrap();
        assert!(matches!(joined.await.unwrap(), Event::MemberJoin(m) if m.id() == "u7"));
        assert_eq!(transport.calls().len(), 1);
        assert_eq!(d.cache().members_of_user("u7").len(), 1);

        d.handle_frame(json!({ "type": "ServerMemberLeave", "id": "s1", "user": "u7" }))
            .await
            .unwrap();
        assert!(d.cache().get_member("s1", "u7").is_none());
        assert!(d.cache().members_of_user("u7").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_user_fetch_does_not_wedge_dispatch() {
        let listeners = Arc::new(Listeners::new());
        let d = Dispatcher::new(
            Arc::new(populated()),
            HttpClient::with_transport(Arc::new(StalledTransport)).with_timeout(Duration::from_secs(10)),
            listeners,
        );

        let err = d
            .handle_frame(json!({ "type": "ServerMemberJoin", "id": "s1", "user": "u7" }))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Http(HttpError::Timeout(_))));
        assert!(d.cache().get_member("s1", "u7").is_none());

        d.handle_frame(json!({
            "type": "ServerMemberUpdate", "id": { "server": "s1", "user": "u2" }, "data": { "nickname": "Bobby" }
        }))
        .await
        .unwrap();
        assert_eq!(d.cache().get_member("s1", "u2").unwrap().display_name(), "Bobby");
    }

    #[tokio::test]
    async fn test_member_update_clears_nickname() {
        let (d, _) = dispatcher();
        d.handle_frame(json!({
            "type": "ServerMemberUpdate", "id": { "server": "s1", "user": "u2" }, "data": { "nickname": "Bobby" }
        }))
        .await
        .unwrap();
        assert_eq!(d.cache().get_member("s1", "u2").unwrap().display_name(), "Bobby");

        d.handle_frame(json!({
            "type": "ServerMemberUpdate", "id": { "server": "s1", "user": "u2" }, "data": {}, "clear": ["Nickname"]
        }))
        .await
        .unwrap();
        assert_eq!(d.cache().get_member("s1", "u2").unwrap().display_name(), "bob");
    }

    #[tokio::test]
    async fn test_role_update_creates_and_reranks() {
        let (d, listeners) = dispatcher();
        let update = listeners.register_waiter("role_update", |_| true);
        d.handle_frame(json!({
            "type": "ServerRoleUpdate", "id": "s1", "role_id": "r9",
            "data": { "name": "Mod", "rank": 3 }
        }))
        .await
        .unwrap();
        assert!(matches!(update.await.unwrap(), Event::RoleUpdate { before: None, after } if after.rank == 3));

        let ranks: Vec<i64> = d.cache().server_roles("s1").iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![5, 3, 1]);

        d.handle_frame(json!({ "type": "ServerRoleDelete", "id": "s1", "role_id": "r1" }))
            .await
            .unwrap();
        assert!(d.cache().get_member("s1", "u2").unwrap().roles.is_empty());
    }

    #[tokio::test]
    async fn test_server_delete_drops_channels() {
        let (d, listeners) = dispatcher();
        let deleted = listeners.register_waiter("server_delete", |_| true);
        d.handle_frame(json!({ "type": "ServerDelete", "id": "s1" })).await.unwrap();
        assert!(matches!(deleted.await.unwrap(), Event::ServerDelete(s) if s.id == "s1"));
        assert!(d.cache().get_channel("c1").is_none());
        assert!(d.cache().members_of_user("u2").is_empty());
    }

    #[tokio::test]
    async fn test_user_update_and_relationship() {
        let (d, listeners) = dispatcher();
        d.handle_frame(json!({ "type": "UserUpdate", "id": "u2", "data": { "display_name": "Robert" } }))
            .await
            .unwrap();
        assert_eq!(d.cache().get_member("s1", "u2").unwrap().user.name(), "Robert");

        let rel = listeners.register_waiter("user_relationship_update", |_| true);
        d.handle_frame(json!({ "type": "UserRelationship", "id": "me", "user": "u2", "status": "Friend" }))
            .await
            .unwrap();
        match rel.await.unwrap() {
            Event::UserRelationshipUpdate { user, before, after } => {
                assert_eq!(user.id, "u2");
                assert_eq!(before, crate::model::RelationshipType::None);
                assert_eq!(after, crate::model::RelationshipType::Friend);
            }
            other => panic!("unexpected {}", other.name()),
        }
    }

    #[tokio::test]
    async fn test_update_for_unknown_server_is_ignored() {
        let (d, _) = dispatcher();
        let handled = d
            .handle_frame(json!({ "type": "ServerUpdate", "id": "nope", "data": { "name": "x" } }))
            .await
            .unwrap();
        assert_eq!(handled, Handled::Ignored);
    }
}
