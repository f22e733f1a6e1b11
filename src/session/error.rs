//! Authentication error types.

use thiserror::Error;

use crate::code_input::CodeError;

/// Errors that can occur during session operations.
///
/// A 401 on the session check is not an error; it yields
/// [`SessionState::Anonymous`](super::SessionState::Anonymous).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Wrong username or password.
    #[error("authentication failed: {0}")]
    AuthenticationFailure(String),

    /// Wrong or expired verification code.
    #[error("verification failed: {0}")]
    VerificationFailure(String),

    /// The server refused the request for another reason (e.g. username taken).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The code failed local validation; nothing was sent.
    #[error("invalid code: {0}")]
    InvalidCode(#[from] CodeError),

    /// Transport failure or unexpected server response.
    #[error("network or server failure: {0}")]
    NetworkOrServerFailure(String),
}

impl AuthError {
    /// Message for the user-visible notification.
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthenticationFailure(message)
            | Self::VerificationFailure(message)
            | Self::Rejected(message)
            | Self::NetworkOrServerFailure(message) => message.clone(),
            Self::InvalidCode(e) => e.to_string(),
        }
    }
}
