//! Validation helpers for DTOs.

use validator::ValidationError;

use crate::state::registry::{ROOM_CODE_ALPHABET, ROOM_CODE_LEN};

/// Longest chat message accepted, in characters, after trimming.
pub const MAX_CHAT_MESSAGE_LEN: usize = 500;

/// Validates that a room code has the generated length and alphabet (case-insensitive).
///
/// # Examples
///
/// ```ignore
/// validate_room_code("K7QXM2") // Ok
/// validate_room_code("k7qxm2") // Ok - normalized to upper case
/// validate_room_code("K7QXM")  // Err - too short
/// validate_room_code("K7QXM0") // Err - 0 is not in the alphabet
/// ```
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    let len = code.chars().count();
    if len != ROOM_CODE_LEN {
        let mut err = ValidationError::new("room_code_length");
        err.message = Some(
            format!("Room code must be exactly {ROOM_CODE_LEN} characters (got {len})").into(),
        );
        return Err(err);
    }

    if !code
        .chars()
        .all(|c| c.is_ascii() && ROOM_CODE_ALPHABET.contains(&(c.to_ascii_uppercase() as u8)))
    {
        let mut err = ValidationError::new("room_code_format");
        err.message = Some("Room code contains characters outside its alphabet".into());
        return Err(err);
    }

    Ok(())
}

/// Validates that a chat message is non-blank and at most [`MAX_CHAT_MESSAGE_LEN`] characters.
pub fn validate_chat_message(message: &str) -> Result<(), ValidationError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        let mut err = ValidationError::new("chat_message_empty");
        err.message = Some("Chat message must not be empty".into());
        return Err(err);
    }

    let len = trimmed.chars().count();
    if len > MAX_CHAT_MESSAGE_LEN {
        let mut err = ValidationError::new("chat_message_length");
        err.message = Some(
            format!("Chat message must be at most {MAX_CHAT_MESSAGE_LEN} characters (got {len})")
                .into(),
        );
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_room_code_valid() {
        assert!(validate_room_code("K7QXM2").is_ok());
        assert!(validate_room_code("k7qxm2").is_ok());
        assert!(validate_room_code("ABCDEF").is_ok());
    }

    #[test]
    fn test_validate_room_code_invalid_length() {
        assert!(validate_room_code("K7QXM").is_err()); // too short
        assert!(validate_room_code("K7QXM22").is_err()); // too long
        assert!(validate_room_code("").is_err()); // empty
    }

    #[test]
    fn test_validate_room_code_invalid_format() {
        assert!(validate_room_code("K7QXM0").is_err()); // zero
        assert!(validate_room_code("K7QXMO").is_err()); // letter O
        assert!(validate_room_code("K7QX 2").is_err()); // space
        assert!(validate_room_code("K7QXé2").is_err()); // non-ascii
    }

    #[test]
    fn test_validate_chat_message() {
        assert!(validate_chat_message("hello").is_ok());
        assert!(validate_chat_message("   ").is_err());
        assert!(validate_chat_message(&"x".repeat(MAX_CHAT_MESSAGE_LEN)).is_ok());
        assert!(validate_chat_message(&"x".repeat(MAX_CHAT_MESSAGE_LEN + 1)).is_err());
        assert!(validate_chat_message(&format!("  {}  ", "x".repeat(MAX_CHAT_MESSAGE_LEN))).is_ok());
    }
}
