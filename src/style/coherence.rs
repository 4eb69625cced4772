//! Repair or replace degenerate model replies.

use rand::seq::SliceRandom;
use rand::Rng;

use super::noise::{inject_typos, jitter_punctuation, NoiseSettings};
use crate::session::DialogueTurn;

/// Replies are cut to this many chars.
pub const MAX_REPLY_CHARS: usize = 150;

/// Returned when everything else leaves an empty reply.
pub const EMPTY_PLACEHOLDER: &str = "🤷‍♂️";

/// Phrases that mean the model is talking about itself instead of answering.
pub const SELF_REFERENCE_TRIGGERS: [&str; 2] = ["повторюсь", "как я уже говорил"];

pub const REPHRASE_FALLBACKS: [&str; 2] = ["Давай по-другому.", "Уточни вопрос."];
pub const TOO_SHORT_FALLBACKS: [&str; 2] = ["Не понял вопрос.", "Можешь уточнить?"];
pub const MANGLED_FALLBACKS: [&str; 2] = ["Не совсем понял.", "О чем ты?"];

/// Which rule decided the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    SelfReference,
    TooShort,
    MangledQuestion,
    Passed,
}

impl FilterOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOutcome::SelfReference => "self_reference",
            FilterOutcome::TooShort => "too_short",
            FilterOutcome::MangledQuestion => "mangled_question",
            FilterOutcome::Passed => "passed",
        }
    }
}

/// Post-processing applied to every successful generation.
#[derive(Debug, Clone)]
pub struct CoherenceFilter {
    noise: NoiseSettings,
    max_chars: usize,
}

impl Default for CoherenceFilter {
    fn default() -> Self {
        Self::new(NoiseSettings::default())
    }
}

impl CoherenceFilter {
    pub fn new(noise: NoiseSettings) -> Self {
        Self {
            noise,
            max_chars: MAX_REPLY_CHARS,
        }
    }

    /// Classify a raw reply. Rules are checked in order; the first match wins.
    pub fn classify(raw: &str) -> FilterOutcome {
        let lower = raw.to_lowercase();
        if SELF_REFERENCE_TRIGGERS.iter().any(|t| lower.contains(t)) {
            return FilterOutcome::SelfReference;
        }
        if raw.trim().chars().count() < 3 {
            return FilterOutcome::TooShort;
        }
        if raw.contains('?')
            && ![' ', '.', ','].iter().any(|c| raw.contains(*c))
            && raw.chars().count() < 10
        {
            return FilterOutcome::MangledQuestion;
        }
        FilterOutcome::Passed
    }

    /// Run the rules, then truncation, jitter and the emptiness guard.
    ///
    /// `_context` is the recent dialogue; the rules do not consult it yet.
    pub fn apply<R: Rng + ?Sized>(
        &self,
        raw: &str,
        _context: &[DialogueTurn],
        rng: &mut R,
    ) -> (String, FilterOutcome) {
        let outcome = Self::classify(raw);
        let repaired = match outcome {
            FilterOutcome::SelfReference => pick(&REPHRASE_FALLBACKS, rng),
            FilterOutcome::TooShort => pick(&TOO_SHORT_FALLBACKS, rng),
            FilterOutcome::MangledQuestion => pick(&MANGLED_FALLBACKS, rng),
            FilterOutcome::Passed => raw.to_string(),
        };

        let truncated: String = repaired.chars().take(self.max_chars).collect();
        let mut reply = jitter_punctuation(
            &truncated,
            self.noise.removal_prob,
            self.noise.replace_prob,
            rng,
        );
        if self.noise.typos_enabled {
            reply = inject_typos(&reply, self.noise.typo_rate, rng);
        }

        if reply.trim().is_empty() {
            reply = EMPTY_PLACEHOLDER.to_string();
        }
        (reply, outcome)
    }
}

pub(crate) fn pick<R: Rng + ?Sized>(options: &[&str], rng: &mut R) -> String {
    options
        .choose(rng)
        .map(|s| s.to_string())
        .unwrap_or_default()
}
