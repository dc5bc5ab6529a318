//! Crate-wide error taxonomy.
//!
//! Four caller-visible outcomes: [`Error::NotFound`], [`Error::Upstream`],
//! [`Error::Validation`], and [`Error::Internal`]. Internal errors carry full
//! context for logging but display as an opaque message so details never
//! reach a client.

use thiserror::Error;

/// Convenience alias used by every fallible operation in the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Referenced conversation, user, paper, or recommendation does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// The language model or literature API failed (network, auth, quota).
    /// Surfaced as a generic "try again" failure; never retried automatically.
    #[error("upstream service failed: {0}")]
    Upstream(String),

    /// Malformed input, rejected before any state mutation.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Unexpected failure. Logged with full context at the failure site.
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound(entity.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::Upstream(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Internal(anyhow::Error::new(e).context("database operation failed"))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(anyhow::Error::new(e).context("blocking task failed"))
    }
}
