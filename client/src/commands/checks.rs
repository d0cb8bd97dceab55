use super::command::{Check, boxed_check};
use super::context::Context;
use super::errors::CommandError;
use crate::model::Permissions;

fn require_server(ctx: &Context) -> Result<&str, CommandError> {
    ctx.server_id().ok_or(CommandError::ServerOnly)
}

/// Reject invocations outside a server.
pub fn server_only() -> Check {
    boxed_check(|ctx: Context| async move { require_server(&ctx).map(|_| ()) })
}

/// Only the owner of the invoking server may run the command.
pub fn is_server_owner() -> Check {
    boxed_check(|ctx: Context| async move {
        let server_id = require_server(&ctx)?;
        let owns = ctx
            .cache()
            .get_server(server_id)
            .is_some_and(|s| s.is_owner(ctx.author_id()));
        if owns { Ok(()) } else { Err(CommandError::NotServerOwner) }
    })
}

/// Only the owner of the bot account may run the command. A user account
/// is its own owner.
pub fn is_bot_owner() -> Check {
    boxed_check(|ctx: Context| async move {
        let owner = ctx
            .cache()
            .self_user()
            .map(|me| me.bot_owner_id().map_or_else(|| me.id.clone(), str::to_string));
        if owner.as_deref() == Some(ctx.author_id()) {
            Ok(())
        } else {
            Err(CommandError::NotBotOwner)
        }
    })
}

/// The author needs every bit of `required` in the invoking channel.
pub fn has_permissions(required: Permissions) -> Check {
    boxed_check(move |ctx: Context| async move {
        let granted = ctx
            .cache()
            .channel_permissions(ctx.channel_id(), ctx.author_id())
            .unwrap_or_else(Permissions::empty);
        let missing = required - granted;
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CommandError::MissingPermissions(missing))
        }
    })
}
