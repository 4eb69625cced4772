//! Live imitation sessions
//!
//! Provides:
//! - Per-requester imitation state (target, samples, fingerprint, history)
//! - Incremental fingerprint refresh every few new samples
//! - An injectable, lock-guarded store keyed by requester id

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::style::{profile, StyleFingerprint};

/// Requester identity (Telegram user id).
pub type RequesterId = i64;

/// History keeps this many turns (10 user/assistant pairs).
pub const HISTORY_CAP: usize = 20;

/// The fingerprint is recomputed whenever the seen-sample count hits a multiple of this.
pub const REFRESH_EVERY: usize = 10;

/// Upper bound on samples held in memory per session.
pub const DEFAULT_MAX_SAMPLES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One entry of the rolling dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTurn {
    pub role: Role,
    pub content: String,
}

impl DialogueTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// State of one requester imitating one target.
#[derive(Debug, Clone)]
pub struct ImitationSession {
    pub target: String,
    pub samples: Vec<String>,
    pub fingerprint: Option<StyleFingerprint>,
    pub history: Vec<DialogueTurn>,
    pub imitating: bool,
    samples_seen: usize,
    max_samples: usize,
}

impl ImitationSession {
    pub fn new(
        target: impl Into<String>,
        samples: Vec<String>,
        fingerprint: Option<StyleFingerprint>,
    ) -> Self {
        Self::with_capacity(target, samples, fingerprint, DEFAULT_MAX_SAMPLES)
    }

    /// `samples` are oldest first. Past `max_samples` the oldest are dropped.
    pub fn with_capacity(
        target: impl Into<String>,
        mut samples: Vec<String>,
        fingerprint: Option<StyleFingerprint>,
        max_samples: usize,
    ) -> Self {
        let max_samples = max_samples.max(1);
        let samples_seen = samples.len();
        if samples.len() > max_samples {
            samples.drain(..samples.len() - max_samples);
        }
        Self {
            target: target.into(),
            samples,
            fingerprint,
            history: Vec::new(),
            imitating: true,
            samples_seen,
            max_samples,
        }
    }

    /// Total samples observed, including ones evicted by the bound.
    pub fn samples_seen(&self) -> usize {
        self.samples_seen
    }

    /// Append one user/assistant exchange, keeping the newest [`HISTORY_CAP`] turns.
    pub fn push_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.history.push(DialogueTurn::user(user));
        self.history.push(DialogueTurn::assistant(assistant));
        if self.history.len() > HISTORY_CAP {
            let excess = self.history.len() - HISTORY_CAP;
            self.history.drain(..excess);
        }
    }

    /// Record a new sample and refresh the fingerprint on every tenth one.
    ///
    /// Returns `true` when the fingerprint was recomputed. Recomputation always
    /// covers the whole sample list and replaces the fingerprint wholesale.
    pub fn record_sample(&mut self, text: impl Into<String>) -> bool {
        self.samples.push(text.into());
        if self.samples.len() > self.max_samples {
            let excess = self.samples.len() - self.max_samples;
            self.samples.drain(..excess);
        }
        self.samples_seen += 1;

        if self.samples_seen % REFRESH_EVERY == 0 {
            self.fingerprint = Some(profile(&self.samples));
            debug!(
                target = %self.target,
                samples = self.samples.len(),
                "Fingerprint refreshed"
            );
            true
        } else {
            false
        }
    }

    /// The stored fingerprint, or a rough one built from the samples.
    pub fn effective_fingerprint(&self, min_samples: usize) -> StyleFingerprint {
        match &self.fingerprint {
            Some(fp) => fp.clone(),
            None if self.samples.len() >= min_samples => StyleFingerprint::ad_hoc(&self.samples),
            None => StyleFingerprint::default(),
        }
    }

    /// The last `n` history turns.
    pub fn recent_history(&self, n: usize) -> &[DialogueTurn] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }
}

/// Sessions keyed by requester, shared between handler tasks.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<RequesterId, ImitationSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh session, replacing any previous one.
    pub async fn start(&self, requester: RequesterId, session: ImitationSession) {
        self.inner.write().await.insert(requester, session);
    }

    /// Copy of the current session for use across an await point.
    pub async fn snapshot(&self, requester: RequesterId) -> Option<ImitationSession> {
        self.inner.read().await.get(&requester).cloned()
    }

    /// Run `f` on the session under the write lock.
    pub async fn update<T>(
        &self,
        requester: RequesterId,
        f: impl FnOnce(&mut ImitationSession) -> T,
    ) -> Option<T> {
        self.inner.write().await.get_mut(&requester).map(f)
    }

    /// Leave imitation mode; the session stays but history is dropped.
    pub async fn stop_imitating(&self, requester: RequesterId) -> bool {
        self.update(requester, |s| {
            s.imitating = false;
            s.history.clear();
        })
        .await
        .is_some()
    }

    pub async fn remove(&self, requester: RequesterId) -> Option<ImitationSession> {
        self.inner.write().await.remove(&requester)
    }

    /// Drop the session only if it targets `target`.
    pub async fn remove_if_target(&self, requester: RequesterId, target: &str) -> bool {
        let mut sessions = self.inner.write().await;
        if sessions.get(&requester).is_some_and(|s| s.target == target) {
            sessions.remove(&requester);
            true
        } else {
            false
        }
    }

    pub async fn is_imitating(&self, requester: RequesterId) -> bool {
        self.inner
            .read()
            .await
            .get(&requester)
            .is_some_and(|s| s.imitating)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
