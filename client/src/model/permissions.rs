use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    /// Permission bitfield for servers, roles, groups and channel overrides.
    /// Travels over the wire as a plain integer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Permissions: u64 {
        // ── Server ──
        const MANAGE_CHANNEL        = 1 << 0;
        const MANAGE_SERVER         = 1 << 1;
        const MANAGE_PERMISSIONS    = 1 << 2;
        const MANAGE_ROLE           = 1 << 3;
        const MANAGE_CUSTOMISATION  = 1 << 4;
        const KICK_MEMBERS          = 1 << 6;
        const BAN_MEMBERS           = 1 << 7;
        const TIMEOUT_MEMBERS       = 1 << 8;
        const ASSIGN_ROLES          = 1 << 9;
        const CHANGE_NICKNAME       = 1 << 10;
        const MANAGE_NICKNAMES      = 1 << 11;
        const CHANGE_AVATAR         = 1 << 12;
        const REMOVE_AVATARS        = 1 << 13;

        // ── Channel ──
        const VIEW_CHANNEL          = 1 << 20;
        const READ_MESSAGE_HISTORY  = 1 << 21;
        const SEND_MESSAGE          = 1 << 22;
        const MANAGE_MESSAGES       = 1 << 23;
        const MANAGE_WEBHOOKS       = 1 << 24;
        const INVITE_OTHERS         = 1 << 25;
        const SEND_EMBEDS           = 1 << 26;
        const UPLOAD_FILES          = 1 << 27;
        const MASQUERADE            = 1 << 28;
        const REACT                 = 1 << 29;

        // ── Voice ──
        const CONNECT               = 1 << 30;
        const SPEAK                 = 1 << 31;
        const VIDEO                 = 1 << 32;
        const MUTE_MEMBERS          = 1 << 33;
        const DEAFEN_MEMBERS        = 1 << 34;
        const MOVE_MEMBERS          = 1 << 35;
    }
}

impl Permissions {
    /// What a timed-out member (or a blocked DM) is reduced to.
    pub const fn default_view_only() -> Self {
        Self::VIEW_CHANNEL.union(Self::READ_MESSAGE_HISTORY)
    }

    /// Baseline for direct messages and groups without explicit permissions.
    pub const fn default_direct_message() -> Self {
        Self::default_view_only()
            .union(Self::SEND_MESSAGE)
            .union(Self::INVITE_OTHERS)
            .union(Self::SEND_EMBEDS)
            .union(Self::UPLOAD_FILES)
            .union(Self::REACT)
            .union(Self::CONNECT)
            .union(Self::SPEAK)
            .union(Self::VIDEO)
    }
}

impl Serialize for Permissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for Permissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Unknown bits from newer servers are dropped rather than rejected.
        u64::deserialize(deserializer).map(Self::from_bits_truncate)
    }
}

/// An allow/deny pair carried by roles and channel overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionOverride {
    #[serde(rename = "a", default)]
    pub allow: Permissions,
    #[serde(rename = "d", default)]
    pub deny: Permissions,
}

impl PermissionOverride {
    pub fn new(allow: Permissions, deny: Permissions) -> Self {
        Self { allow, deny }
    }
}

/// Overlay overrides onto `base`, where `ranked` is already sorted by
/// descending rank. The first override to mention a bit decides it; lower
/// ranked overrides cannot flip a bit a higher one already allowed or denied.
pub fn overlay_ranked<'a>(
    base: Permissions,
    ranked: impl IntoIterator<Item = &'a PermissionOverride>,
) -> Permissions {
    let mut perms = base;
    let mut decided = Permissions::empty();
    for ov in ranked {
        perms |= ov.allow & !decided;
        perms &= !(ov.deny & !decided);
        decided |= ov.allow | ov.deny;
    }
    perms
}

/// Server-level permissions of a member.
///
///   1. Owners and privileged accounts get everything.
///   2. Start from the server default permissions.
///   3. Overlay the member's roles, highest rank first.
///   4. An active timeout masks the result to view-only.
pub fn compute_server_permissions(
    default_permissions: Permissions,
    ranked_roles: &[PermissionOverride],
    is_owner: bool,
    timed_out: bool,
) -> Permissions {
    if is_owner {
        return Permissions::all();
    }

    let perms = overlay_ranked(default_permissions, ranked_roles);

    if timed_out {
        return perms & Permissions::default_view_only();
    }
    perms
}

/// Channel-level permissions of a member in a server channel.
///
/// `server_perms` is the result of [`compute_server_permissions`] without the
/// timeout mask; `ranked_overrides` are the channel's per-role overrides for
/// the member's own roles, highest rank first.
pub fn compute_channel_permissions(
    server_perms: Permissions,
    channel_default: Option<PermissionOverride>,
    ranked_overrides: &[PermissionOverride],
    is_owner: bool,
    timed_out: bool,
) -> Permissions {
    if is_owner {
        return Permissions::all();
    }

    let mut perms = server_perms;
    if let Some(ov) = channel_default {
        perms |= ov.allow;
        perms &= !ov.deny;
    }
    perms = overlay_ranked(perms, ranked_overrides);

    if timed_out {
        return perms & Permissions::default_view_only();
    }
    perms
}
