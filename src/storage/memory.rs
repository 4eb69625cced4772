//! In-process profile store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::ProfileStore;
use crate::session::RequesterId;
use crate::style::StyleFingerprint;
use crate::Result;

#[derive(Debug, Clone)]
struct StoredProfile {
    messages: Vec<String>,
    fingerprint: Option<StyleFingerprint>,
}

/// Profiles kept in a map; replacement swaps the whole record under one lock.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<RequesterId, BTreeMap<String, StoredProfile>>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn replace_messages(
        &self,
        requester: RequesterId,
        target: &str,
        messages: &[String],
        fingerprint: Option<&StyleFingerprint>,
    ) -> Result<()> {
        let record = StoredProfile {
            messages: messages.to_vec(),
            fingerprint: fingerprint.cloned(),
        };
        self.profiles
            .write()
            .await
            .entry(requester)
            .or_default()
            .insert(target.to_string(), record);
        Ok(())
    }

    async fn get_messages(
        &self,
        requester: RequesterId,
        target: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        let profiles = self.profiles.read().await;
        Ok(profiles
            .get(&requester)
            .and_then(|targets| targets.get(target))
            .map(|p| p.messages.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_fingerprint(
        &self,
        requester: RequesterId,
        target: &str,
    ) -> Result<Option<StyleFingerprint>> {
        let profiles = self.profiles.read().await;
        Ok(profiles
            .get(&requester)
            .and_then(|targets| targets.get(target))
            .and_then(|p| p.fingerprint.clone()))
    }

    async fn delete_all(&self, requester: RequesterId) -> Result<bool> {
        self.profiles.write().await.remove(&requester);
        Ok(true)
    }

    async fn delete_target(&self, requester: RequesterId, target: &str) -> Result<bool> {
        let mut profiles = self.profiles.write().await;
        if let Some(targets) = profiles.get_mut(&requester) {
            targets.remove(target);
            if targets.is_empty() {
                profiles.remove(&requester);
            }
        }
        Ok(true)
    }

    async fn list_targets(&self, requester: RequesterId) -> Result<Vec<String>> {
        let profiles = self.profiles.read().await;
        Ok(profiles
            .get(&requester)
            .map(|targets| targets.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn messages_by_target(
        &self,
        requester: RequesterId,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let profiles = self.profiles.read().await;
        Ok(profiles
            .get(&requester)
            .map(|targets| {
                targets
                    .iter()
                    .map(|(name, p)| (name.clone(), p.messages.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}
