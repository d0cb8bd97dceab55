use super::message::SendMessage;

/// Maximum message content length (characters).
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Maximum embeds on one outgoing message.
pub const MAX_EMBEDS: usize = 10;

/// Validate message content. Empty content is allowed only when the message
/// carries something else (embeds or attachments).
pub fn validate_content(content: Option<&str>, has_payload: bool) -> Result<(), String> {
    let content = content.unwrap_or_default();
    if content.trim().is_empty() && !has_payload {
        return Err("Message cannot be empty".into());
    }
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(format!(
            "Message too long (max {} characters)",
            MAX_MESSAGE_LENGTH
        ));
    }
    Ok(())
}

/// Validate a full outgoing message body.
pub fn validate_message(message: &SendMessage) -> Result<(), String> {
    if message.embeds.len() > MAX_EMBEDS {
        return Err(format!("Too many embeds (max {})", MAX_EMBEDS));
    }
    validate_content(
        message.content.as_deref(),
        !message.embeds.is_empty() || !message.attachments.is_empty(),
    )
}
