//! Conversational financial assistant engine.
//!
//! Three layers, wired through the port traits in [`ports`]:
//! - retrieval: embedding-based ranking of a user's financial records and
//!   the system prompts built from them
//! - agent: a bounded tool-calling loop the model uses to act on data
//! - services: transaction enrichment and the chat orchestrator
//!
//! Persistence and HTTP transport live outside this crate; callers supply
//! store implementations and drive the services directly.

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod ports;
pub mod retrieval;
pub mod services;

pub use config::Config;
pub use error::{FinsageError, Result};
