use thiserror::Error;

/// Host-side errors surfaced synchronously at the API boundary.
///
/// Connection outcomes are never errors: every `connect` ends in exactly one
/// disconnect event carrying an [`crate::types::ErrorCode`] and a message.
/// `BridgeError` covers only what this layer can reject before touching the
/// engine: malformed configuration, calls in an invalid session state, and
/// settings-file problems.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid session state: {0}")]
    InvalidState(String),
    #[error("settings error: {0}")]
    Settings(String),
}

impl BridgeError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        BridgeError::InvalidConfig(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        BridgeError::InvalidState(message.into())
    }

    pub fn settings(message: impl Into<String>) -> Self {
        BridgeError::Settings(message.into())
    }
}
