//! Language-model collaborator.
//!
//! [`ModelProvider`] is the narrow seam the chat orchestrator talks
//! through: given a system preamble and an ordered message history, produce
//! reply text plus optional citations and a confidence score.
//! [`ModelError`] keeps auth/quota failures distinguishable from malformed
//! responses, as callers treat them differently.

pub mod anthropic;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::Message;
pub use anthropic::AnthropicProvider;

/// A cited source attached to a model reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub url: Option<String>,
}

/// What the collaborator produced for one exchange.
#[derive(Debug, Clone)]
pub struct ModelReply {
    pub text: String,
    pub sources: Vec<Citation>,
    /// In `[0.0, 1.0]` when the provider supplies one; the orchestrator
    /// substitutes the configured default otherwise.
    pub confidence: Option<f64>,
}

#[derive(Debug, Error)]
pub enum ModelError {
    /// Key missing or rejected. Not retryable with the same credentials.
    #[error("model authentication failed: {0}")]
    Auth(String),

    /// Quota exhausted or rate limited upstream.
    #[error("model rate limited: {0}")]
    RateLimited(String),

    /// Network failure or upstream 5xx.
    #[error("model endpoint unavailable: {0}")]
    Unavailable(String),

    /// The endpoint answered but the body was not a usable reply.
    #[error("model returned a malformed response: {0}")]
    Malformed(String),
}

/// Contract for the external language-model collaborator.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// One generation call. Implementations must not hold any shared lock
    /// while the request is in flight.
    async fn generate(
        &self,
        system: &str,
        history: &[Message],
    ) -> Result<ModelReply, ModelError>;

    /// The name of this provider implementation.
    fn name(&self) -> &str;
}

const MAX_API_ERROR_CHARS: usize = 200;

/// Truncate an upstream error body before it reaches logs.
pub(crate) fn truncate_error(body: &str) -> String {
    if body.chars().count() <= MAX_API_ERROR_CHARS {
        return body.to_string();
    }
    let truncated: String = body.chars().take(MAX_API_ERROR_CHARS).collect();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_error_bodies_pass_through() {
        assert_eq!(truncate_error("bad key"), "bad key");
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let long = "x".repeat(500);
        let out = truncate_error(&long);
        assert!(out.len() < long.len());
        assert!(out.ends_with("..."));
    }
}
