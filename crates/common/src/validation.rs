//! Input validation for chat requests.
//!
//! Runs before any pipeline stage. Rejected requests never reach the
//! orchestrator.

use crate::message::ChatRequest;
use crate::{Result, TwinError};

/// Maximum accepted length of a chat message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Validate a chat request and fill in anonymous identifiers.
///
/// - `message` must be non-empty after trimming and at most
///   [`MAX_MESSAGE_CHARS`] characters
/// - a missing or blank `user_id` becomes `anon_<uuid>`
/// - a missing or blank `conversation_id` becomes `conv_<uuid>`
pub fn validate_chat_request(mut request: ChatRequest) -> Result<ChatRequest> {
    if request.message.trim().is_empty() {
        return Err(TwinError::Validation(
            "message is required and must not be empty".to_string(),
        ));
    }

    let len = request.message.chars().count();
    if len > MAX_MESSAGE_CHARS {
        return Err(TwinError::Validation(format!(
            "message is {} characters, maximum is {}",
            len, MAX_MESSAGE_CHARS
        )));
    }

    if is_blank(request.user_id.as_deref()) {
        request.user_id = Some(format!("anon_{}", uuid::Uuid::new_v4().simple()));
    }
    if is_blank(request.conversation_id.as_deref()) {
        request.conversation_id = Some(new_conversation_id());
    }

    Ok(request)
}

/// Generate a fresh conversation identifier.
pub fn new_conversation_id() -> String {
    format!("conv_{}", uuid::Uuid::new_v4().simple())
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}
