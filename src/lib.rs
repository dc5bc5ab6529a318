//! Sleep science explainer backend.
//!
//! somnus answers sleep-science questions by combining a language-model
//! call, a static corpus of expert recommendations, NIH PubMed literature
//! search, and lightweight interaction analytics.
//!
//! # Architecture
//!
//! - **Storage**: pluggable — an in-memory map with per-conversation locks
//!   for small deployments, or SQLite tables behind the same traits for
//!   durable ones
//! - **Model**: Anthropic Messages API over HTTP, behind the narrow
//!   [`model::ModelProvider`] seam
//! - **Transport**: axum REST under `/api/v1`
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`db`] — SQLite initialization, schema, and migrations
//! - [`conversation`] — Conversation store: lifecycle and ordered messages
//! - [`analytics`] — Interaction log, per-user sessions, topic rankings, retention
//! - [`chat`] — Orchestrator turning one user message into one assistant reply
//! - [`model`] — Language-model collaborator contract and HTTP provider
//! - [`papers`] — PubMed literature search and the recommendation corpus
//! - [`api`] + [`server`] — REST surface and server wiring

pub mod analytics;
pub mod api;
pub mod chat;
pub mod config;
pub mod conversation;
pub mod db;
pub mod error;
pub mod model;
pub mod papers;
pub mod server;
