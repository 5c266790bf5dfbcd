/// Client-side input validation — the pre-check a client applies before
/// anything reaches the wire.
///
/// The server core does not re-validate message content (it relays
/// verbatim) and only defensively rejects empty nicknames at
/// registration. These rules belong to the message-authoring side; they
/// live here so both sides agree on them.
use super::codec::MAX_FRAME;

/// Maximum nickname length in characters.
pub const MAX_NICKNAME_LEN: usize = 20;

/// Maximum chat message size in encoded bytes (one wire frame).
pub const MAX_MESSAGE_BYTES: usize = MAX_FRAME;

/// Why an input was rejected before reaching the wire.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("el nickname no puede estar vacío")]
    EmptyNickname,
    #[error("el nickname es demasiado largo (máx. {MAX_NICKNAME_LEN} caracteres)")]
    NicknameTooLong,
    #[error("el nickname no puede contener espacios")]
    NicknameHasWhitespace,
    #[error("el mensaje no puede estar vacío")]
    EmptyMessage,
    #[error("el mensaje es demasiado largo")]
    MessageTooLong,
}

/// Check a nickname before offering it in the handshake.
pub fn validate_nickname(nickname: &str) -> Result<(), ValidationError> {
    if nickname.is_empty() {
        return Err(ValidationError::EmptyNickname);
    }
    if nickname.chars().count() > MAX_NICKNAME_LEN {
        return Err(ValidationError::NicknameTooLong);
    }
    if nickname.chars().any(char::is_whitespace) {
        return Err(ValidationError::NicknameHasWhitespace);
    }
    Ok(())
}

/// Check a chat message before sending it.
pub fn validate_message(message: &str) -> Result<(), ValidationError> {
    if message.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    if message.len() > MAX_MESSAGE_BYTES {
        return Err(ValidationError::MessageTooLong);
    }
    Ok(())
}
