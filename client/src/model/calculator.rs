use chrono::{DateTime, Utc};

use super::channel::Channel;
use super::member::Member;
use super::permissions::{
    PermissionOverride, Permissions, compute_channel_permissions, compute_server_permissions,
};
use super::server::Server;
use super::user::User;

/// A member's permissions across a whole server.
pub fn calculate_server_permissions(server: &Server, member: &Member, now: DateTime<Utc>) -> Permissions {
    if member.user.privileged {
        return Permissions::all();
    }
    compute_server_permissions(
        server.default_permissions,
        &ranked_role_permissions(server, member),
        server.is_owner(member.id()),
        member.is_timed_out(now),
    )
}

/// A user's permissions in one channel.
///
/// Server channels need the owning `server` (the user must be a member of
/// it, otherwise nothing is granted). Direct messages consult `dm_recipient`
/// for a block in either direction.
pub fn calculate_channel_permissions(
    channel: &Channel,
    user: &User,
    server: Option<&Server>,
    dm_recipient: Option<&User>,
    now: DateTime<Utc>,
) -> Permissions {
    if user.privileged {
        return Permissions::all();
    }

    match channel {
        Channel::SavedMessages(_) => Permissions::all(),
        Channel::DirectMessage(_) => match dm_recipient {
            Some(recipient) if recipient.is_blocked() => Permissions::default_view_only(),
            _ => Permissions::default_direct_message(),
        },
        Channel::Group(group) => {
            if group.owner == user.id {
                Permissions::all()
            } else {
                group
                    .permissions
                    .filter(|p| !p.is_empty())
                    .unwrap_or_else(Permissions::default_direct_message)
            }
        }
        Channel::TextChannel(c) | Channel::VoiceChannel(c) => {
            let Some(server) = server.filter(|s| s.id == c.server) else {
                return Permissions::empty();
            };
            if server.is_owner(&user.id) {
                return Permissions::all();
            }
            let Some(member) = server.get_member(&user.id) else {
                return Permissions::empty();
            };

            let server_perms = compute_server_permissions(
                server.default_permissions,
                &ranked_role_permissions(server, member),
                false,
                false,
            );
            let overrides: Vec<PermissionOverride> = member
                .roles
                .iter()
                .filter_map(|role_id| c.role_permissions.get(role_id).copied())
                .collect();

            compute_channel_permissions(
                server_perms,
                c.default_permissions,
                &overrides,
                false,
                member.is_timed_out(now),
            )
        }
    }
}

fn ranked_role_permissions(server: &Server, member: &Member) -> Vec<PermissionOverride> {
    member
        .roles
        .iter()
        .filter_map(|role_id| server.get_role(role_id))
        .map(|role| role.permissions)
        .collect()
}
