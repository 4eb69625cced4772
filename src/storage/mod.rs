//! Persistent author profiles.
//!
//! A profile is the full message set plus the last fingerprint for one
//! (requester, target) pair. Backends replace a pair as a unit.

pub mod memory;
pub mod mysql;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::session::RequesterId;
use crate::style::StyleFingerprint;
use crate::Result;

pub use memory::MemoryProfileStore;
pub use mysql::MySqlProfileStore;

/// Default number of messages loaded when a session starts.
pub const DEFAULT_MESSAGE_LIMIT: usize = 50;

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Overwrite all messages and the fingerprint of one pair.
    async fn replace_messages(
        &self,
        requester: RequesterId,
        target: &str,
        messages: &[String],
        fingerprint: Option<&StyleFingerprint>,
    ) -> Result<()>;

    /// Up to `limit` messages, most recent first.
    async fn get_messages(
        &self,
        requester: RequesterId,
        target: &str,
        limit: usize,
    ) -> Result<Vec<String>>;

    async fn get_fingerprint(
        &self,
        requester: RequesterId,
        target: &str,
    ) -> Result<Option<StyleFingerprint>>;

    /// Remove every profile of a requester.
    async fn delete_all(&self, requester: RequesterId) -> Result<bool>;

    /// Remove one profile. Deleting a missing profile is not an error.
    async fn delete_target(&self, requester: RequesterId, target: &str) -> Result<bool>;

    /// Target names, sorted.
    async fn list_targets(&self, requester: RequesterId) -> Result<Vec<String>>;

    /// Messages of every target, oldest first.
    async fn messages_by_target(
        &self,
        requester: RequesterId,
    ) -> Result<BTreeMap<String, Vec<String>>>;
}
