//! Domain error taxonomy shared by every core operation.
//!
//! Operations return these by value; nothing in the core raises. Only the
//! HTTP boundary translates them into status codes, and only `Internal`
//! hides its detail from clients.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing caller-supplied data.
    #[error("{0}")]
    InvalidInput(String),
    /// Missing, invalid, expired, or replayed credential/token.
    #[error("{0}")]
    Unauthorized(String),
    /// Authenticated but not entitled to the specific action.
    #[error("{0}")]
    Forbidden(String),
    /// Referenced entity absent.
    #[error("{0}")]
    NotFound(String),
    /// Uniqueness violation: duplicate username/email, or a race-lost
    /// insert on a vote key.
    #[error("{0}")]
    Conflict(String),
    /// Unexpected store or crypto failure. Never mapped onto a domain kind
    /// so internal state cannot leak into a misleading client error.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}
