//! Chat-style imitation library
//!
//! This library provides tools to:
//! - Parse Telegram HTML chat exports into per-author messages
//! - Profile an author's writing style into a fingerprint
//! - Steer a chat-completions model to answer in that style
//! - Repair and roughen generated replies so they read like chat messages
//! - Persist profiles in memory or MySQL and report statistics over them

pub mod commands;
pub mod config;
pub mod error;
pub mod imitator;
pub mod integrations;
pub mod metrics;
pub mod prompts;
pub mod session;
pub mod stats;
pub mod storage;
pub mod style;
pub mod transcript;

// Re-export common types
pub use config::Config;
pub use error::{Error, Result};
pub use imitator::{ImitationSettings, Imitator, IngestReport, Reply, SelectedTarget};
pub use integrations::{GenerationRequest, Generator, OpenAIClient};
pub use session::{ImitationSession, RequesterId, SessionStore};
pub use storage::{MemoryProfileStore, MySqlProfileStore, ProfileStore};
pub use style::{profile, CoherenceFilter, StyleFingerprint};
