//! Imitation service
//!
//! Ties the pipeline together: transcript upload and profiling, target
//! selection, reply generation through the [`Generator`] with coherence
//! filtering, and profile management on top of a [`ProfileStore`].

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::join_all;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};

use crate::integrations::Generator;
use crate::prompts::{compose, PromptRequest};
use crate::session::{ImitationSession, RequesterId, SessionStore, DEFAULT_MAX_SAMPLES};
use crate::stats::render_report;
use crate::storage::{ProfileStore, DEFAULT_MESSAGE_LIMIT};
use crate::style::coherence::pick;
use crate::style::{profile, CoherenceFilter, NoiseSettings};
use crate::transcript;
use crate::{metrics, Error, Result};

/// Replies used when the generator fails or times out.
pub const GENERATION_FALLBACKS: [&str; 3] = ["Че?", "Ошибка", "..."];

/// Runtime knobs.
#[derive(Debug, Clone)]
pub struct ImitationSettings {
    /// A fingerprint is stored only for authors with at least this many messages.
    pub min_analysis_samples: usize,
    /// Imitation is refused below this many stored messages.
    pub min_imitation_samples: usize,
    /// Messages loaded when a session starts.
    pub message_limit: usize,
    pub max_session_samples: usize,
    pub max_upload_bytes: u64,
    pub generation_timeout: Duration,
    pub max_tokens: u32,
    pub temperature: f32,
    pub noise: NoiseSettings,
    /// Fixed seed for reproducible sampling; entropy when unset.
    pub seed: Option<u64>,
}

impl Default for ImitationSettings {
    fn default() -> Self {
        Self {
            min_analysis_samples: crate::config::MIN_SAMPLES_FOR_ANALYSIS,
            min_imitation_samples: crate::config::MIN_SAMPLES_FOR_IMITATION,
            message_limit: DEFAULT_MESSAGE_LIMIT,
            max_session_samples: DEFAULT_MAX_SAMPLES,
            max_upload_bytes: crate::config::MAX_UPLOAD_BYTES,
            generation_timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS),
            max_tokens: crate::config::DEFAULT_MAX_TOKENS,
            temperature: crate::config::DEFAULT_TEMPERATURE,
            noise: NoiseSettings::default(),
            seed: None,
        }
    }
}

/// Outcome of one transcript upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub owner_name: String,
    pub owner_messages: usize,
    /// Participant profiles written to the store.
    pub saved_participants: usize,
    /// Attributable authors found in the document, sorted.
    pub participants: Vec<String>,
}

impl IngestReport {
    pub fn is_empty(&self) -> bool {
        self.owner_messages == 0 && self.participants.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedTarget {
    pub target: String,
    pub samples: usize,
    pub has_fingerprint: bool,
}

/// What a requester gets back for one text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// No active imitation; the caller shows its menu.
    NotImitating,
    /// The session was inconsistent and imitation has been switched off.
    StateReset(String),
    Generated(String),
}

pub struct Imitator {
    store: Arc<dyn ProfileStore>,
    generator: Arc<dyn Generator>,
    sessions: SessionStore,
    filter: CoherenceFilter,
    settings: ImitationSettings,
    // Never held across an await.
    rng: Mutex<StdRng>,
}

impl Imitator {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        generator: Arc<dyn Generator>,
        settings: ImitationSettings,
    ) -> Self {
        Self::with_sessions(store, generator, SessionStore::new(), settings)
    }

    pub fn with_sessions(
        store: Arc<dyn ProfileStore>,
        generator: Arc<dyn Generator>,
        sessions: SessionStore,
        settings: ImitationSettings,
    ) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            store,
            generator,
            sessions,
            filter: CoherenceFilter::new(settings.noise),
            settings,
            rng: Mutex::new(rng),
        }
    }

    pub fn settings(&self) -> &ImitationSettings {
        &self.settings
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        // A poisoned lock still holds a usable generator
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut rng)
    }

    /// Parse an uploaded export and store one profile per author.
    ///
    /// The owner's messages are saved under `owner_name`, the name the
    /// platform knows the requester by.
    pub async fn ingest_transcript(
        &self,
        requester: RequesterId,
        owner_name: &str,
        bytes: &[u8],
        filename: &str,
    ) -> Result<IngestReport> {
        if !filename.to_lowercase().ends_with(".html") {
            return Err(Error::InvalidArgument(format!(
                "expected an .html export, got {}",
                filename
            )));
        }
        if bytes.len() as u64 > self.settings.max_upload_bytes {
            return Err(Error::InvalidArgument(format!(
                "export is {} bytes, limit is {}",
                bytes.len(),
                self.settings.max_upload_bytes
            )));
        }

        let extraction = transcript::extract_bytes(bytes, None);
        let mut report = IngestReport {
            owner_name: owner_name.to_string(),
            owner_messages: extraction.owner_messages.len(),
            ..Default::default()
        };
        if extraction.is_empty() {
            warn!(requester, filename, "No messages found in export");
            return Ok(report);
        }

        if !extraction.owner_messages.is_empty() {
            self.save_profile(requester, owner_name, &extraction.owner_messages)
                .await;
        }

        report.participants = extraction.participants();
        let saves = report
            .participants
            .iter()
            .map(|participant| (participant, extraction.messages_of(participant)))
            .filter(|(_, messages)| !messages.is_empty())
            .map(|(participant, messages)| async move {
                self.save_profile(requester, participant, &messages).await
            });
        report.saved_participants = join_all(saves)
            .await
            .into_iter()
            .filter(|saved| *saved)
            .count();

        info!(
            requester,
            owner_messages = report.owner_messages,
            saved = report.saved_participants,
            "Export ingested"
        );
        Ok(report)
    }

    async fn save_profile(&self, requester: RequesterId, target: &str, messages: &[String]) -> bool {
        let fingerprint = if messages.len() >= self.settings.min_analysis_samples {
            Some(profile(messages))
        } else {
            debug!(
                requester,
                target,
                count = messages.len(),
                "Too few messages for style analysis, saving without fingerprint"
            );
            None
        };

        match self
            .store
            .replace_messages(requester, target, messages, fingerprint.as_ref())
            .await
        {
            Ok(()) => true,
            Err(err) => {
                error!(requester, target, "Failed to save profile: {}", err);
                false
            }
        }
    }

    /// Start imitating `target`. Any previous session and its history are replaced.
    pub async fn select_target(
        &self,
        requester: RequesterId,
        target: &str,
    ) -> Result<SelectedTarget> {
        let mut samples = self
            .store
            .get_messages(requester, target, self.settings.message_limit)
            .await
            .unwrap_or_else(|err| {
                warn!(requester, target, "Failed to load messages: {}", err);
                Vec::new()
            });

        if samples.is_empty() {
            return Err(Error::ProfileNotFound(target.to_string()));
        }
        if samples.len() < self.settings.min_imitation_samples {
            warn!(
                requester,
                target,
                found = samples.len(),
                "Not enough messages for imitation"
            );
            return Err(Error::InsufficientData {
                target: target.to_string(),
                found: samples.len(),
                required: self.settings.min_imitation_samples,
            });
        }

        let fingerprint = self
            .store
            .get_fingerprint(requester, target)
            .await
            .unwrap_or_else(|err| {
                warn!(requester, target, "Failed to load fingerprint: {}", err);
                None
            });
        if fingerprint.is_none() {
            warn!(requester, target, "No stored fingerprint, imitating from raw samples");
        }

        // Stores hand back newest first, sessions keep oldest first
        samples.reverse();

        let selected = SelectedTarget {
            target: target.to_string(),
            samples: samples.len(),
            has_fingerprint: fingerprint.is_some(),
        };
        let session = ImitationSession::with_capacity(
            target,
            samples,
            fingerprint,
            self.settings.max_session_samples,
        );
        self.sessions.start(requester, session).await;

        info!(requester, target, samples = selected.samples, "Imitation started");
        Ok(selected)
    }

    /// Answer one message in the imitated style.
    pub async fn reply(&self, requester: RequesterId, text: &str) -> Result<Reply> {
        let session = match self.sessions.snapshot(requester).await {
            Some(session) if session.imitating => session,
            _ => {
                metrics::record_reply("not_imitating");
                return Ok(Reply::NotImitating);
            }
        };

        if let Err(err) = self.check_consistency(&session) {
            error!(requester, "{}", err);
            self.sessions.stop_imitating(requester).await;
            metrics::record_reply("reset");
            let notice = if session.target.is_empty() {
                "Произошла внутренняя ошибка состояния имитации. Режим выключен.".to_string()
            } else {
                format!(
                    "⚠️ Ошибка состояния: Недостаточно данных для имитации {}. Режим выключен.",
                    session.target
                )
            };
            return Ok(Reply::StateReset(notice));
        }

        let fingerprint = session.effective_fingerprint(self.settings.min_imitation_samples);
        let prompt = self.with_rng(|rng| {
            compose(
                &PromptRequest {
                    target: &session.target,
                    fingerprint: &fingerprint,
                    samples: &session.samples,
                    history: &session.history,
                    input: text,
                },
                rng,
            )
        });
        let request = prompt.into_request(self.settings.max_tokens, self.settings.temperature);

        let started = Instant::now();
        let generated =
            tokio::time::timeout(self.settings.generation_timeout, self.generator.generate(&request))
                .await
                .unwrap_or_else(|_| Err(Error::GenerationTimeout(self.settings.generation_timeout)));

        let reply = match generated {
            Ok(raw) => {
                metrics::record_generation(started.elapsed(), "ok");
                let context = session.recent_history(crate::prompts::HISTORY_TURNS);
                let (reply, outcome) = self.with_rng(|rng| self.filter.apply(&raw, context, rng));
                metrics::record_reply(outcome.as_str());
                reply
            }
            Err(err) => {
                let status = if matches!(err, Error::GenerationTimeout(_)) {
                    "timeout"
                } else {
                    "error"
                };
                metrics::record_generation(started.elapsed(), status);
                metrics::record_reply("fallback");
                warn!(requester, target = %session.target, "Generation failed: {}", err);
                self.with_rng(|rng| pick(&GENERATION_FALLBACKS, rng))
            }
        };

        let target = session.target.clone();
        let refreshed = self
            .sessions
            .update(requester, |s| {
                // The requester may have switched target while we were waiting
                if s.target != target || !s.imitating {
                    return false;
                }
                s.push_exchange(text, reply.as_str());
                s.record_sample(text)
            })
            .await
            .unwrap_or(false);
        if refreshed {
            debug!(requester, target = %target, "Session fingerprint refreshed");
        }

        Ok(Reply::Generated(reply))
    }

    fn check_consistency(&self, session: &ImitationSession) -> Result<()> {
        if session.target.is_empty() {
            return Err(Error::StateInconsistency(
                "imitating without a target".to_string(),
            ));
        }
        if session.samples.len() < self.settings.min_imitation_samples {
            return Err(Error::StateInconsistency(format!(
                "{} has {} samples, need {}",
                session.target,
                session.samples.len(),
                self.settings.min_imitation_samples
            )));
        }
        Ok(())
    }

    /// Leave imitation mode. Returns `false` when there was no session.
    pub async fn exit_imitation(&self, requester: RequesterId) -> bool {
        self.sessions.stop_imitating(requester).await
    }

    pub async fn is_imitating(&self, requester: RequesterId) -> bool {
        self.sessions.is_imitating(requester).await
    }

    /// Delete one stored profile; a session pointing at it is dropped too.
    pub async fn delete_target(&self, requester: RequesterId, target: &str) -> bool {
        match self.store.delete_target(requester, target).await {
            Ok(true) => {
                if self.sessions.remove_if_target(requester, target).await {
                    info!(requester, target, "Active session dropped with its profile");
                }
                true
            }
            Ok(false) => false,
            Err(err) => {
                error!(requester, target, "Failed to delete profile: {}", err);
                false
            }
        }
    }

    /// Delete every stored profile and the session.
    pub async fn clear_all(&self, requester: RequesterId) -> bool {
        match self.store.delete_all(requester).await {
            Ok(true) => {
                self.sessions.remove(requester).await;
                info!(requester, "All profiles cleared");
                true
            }
            Ok(false) => false,
            Err(err) => {
                error!(requester, "Failed to clear profiles: {}", err);
                false
            }
        }
    }

    pub async fn list_targets(&self, requester: RequesterId) -> Vec<String> {
        self.store
            .list_targets(requester)
            .await
            .unwrap_or_else(|err| {
                warn!(requester, "Failed to list profiles: {}", err);
                Vec::new()
            })
    }

    /// Plain-text statistics over every stored profile, `None` when there are none.
    pub async fn statistics_report(&self, requester: RequesterId, user_label: &str) -> Option<String> {
        let data = self
            .store
            .messages_by_target(requester)
            .await
            .unwrap_or_else(|err| {
                warn!(requester, "Failed to load statistics data: {}", err);
                Default::default()
            });
        render_report(user_label, &data)
    }
}
