//! Statistical fingerprint of one author's writing.

use std::collections::{BTreeMap, HashMap, HashSet};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::transcript::MIN_WORDS_PER_MESSAGE;

/// Used when no message qualifies.
pub const DEFAULT_AVERAGE_LENGTH: usize = 50;

pub const MAX_KEYWORDS: usize = 5;
pub const MAX_PHRASES: usize = 10;

/// How many of the most frequent words are considered before filtering.
const KEYWORD_CANDIDATES: usize = 50;

/// Keywords must be longer than this (in chars).
const MIN_KEYWORD_CHARS: usize = 3;

pub const PUNCTUATION: [char; 6] = ['!', '?', '.', ',', ';', ':'];

pub const EMOJIS: [&str; 8] = ["😀", "😂", "😊", "😎", "😢", "😡", "😉", "❤"];

pub static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "я", "ты", "он", "она", "мы", "вы", "они", "и", "в", "на", "а", "но", "что", "как", "не",
        "да", "ну",
    ]
    .into_iter()
    .collect()
});

/// Summary of how one person writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleFingerprint {
    pub keywords: Vec<String>,
    pub common_phrases: Vec<String>,
    pub average_length: usize,
    pub punctuation_counts: BTreeMap<char, usize>,
    pub emoji_samples: Vec<String>,
}

impl Default for StyleFingerprint {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            common_phrases: Vec::new(),
            average_length: DEFAULT_AVERAGE_LENGTH,
            punctuation_counts: BTreeMap::new(),
            emoji_samples: Vec::new(),
        }
    }
}

impl StyleFingerprint {
    /// Rough fingerprint for sessions that have samples but no stored profile.
    ///
    /// Only keywords and average length are filled. Unlike [`profile`], every
    /// sample counts toward the mean and words are lowercased before counting.
    /// Stop-words are dropped here too, so a session without a stored profile
    /// never gets function words as keywords.
    pub fn ad_hoc(samples: &[String]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut words = FrequencyCounter::default();
        for sample in samples {
            for word in sample.split_whitespace() {
                if word.chars().count() > MIN_KEYWORD_CHARS {
                    words.add(word.to_lowercase());
                }
            }
        }

        let keywords = words
            .ranked()
            .into_iter()
            .filter(|w| !STOP_WORDS.contains(w.as_str()))
            .take(MAX_KEYWORDS)
            .collect();
        let total: usize = samples.iter().map(|s| s.chars().count()).sum();

        Self {
            keywords,
            average_length: total / samples.len(),
            ..Self::default()
        }
    }

    /// Total punctuation marks seen across qualifying messages.
    pub fn punctuation_total(&self) -> usize {
        self.punctuation_counts.values().sum()
    }
}

/// Build a fingerprint from one author's messages.
///
/// Pure: the same input always yields the same fingerprint. Messages with
/// fewer than three whitespace tokens are ignored entirely.
pub fn profile<S: AsRef<str>>(messages: &[S]) -> StyleFingerprint {
    let mut lengths = Vec::new();
    let mut punctuation_counts = BTreeMap::new();
    let mut emoji_samples = Vec::new();
    let mut words = FrequencyCounter::default();
    let mut phrases = FrequencyCounter::default();

    for message in messages {
        let message = message.as_ref();
        let tokens: Vec<&str> = message.split_whitespace().collect();
        if tokens.len() < MIN_WORDS_PER_MESSAGE {
            continue;
        }

        lengths.push(message.chars().count());

        for c in message.chars().filter(|c| PUNCTUATION.contains(c)) {
            *punctuation_counts.entry(c).or_insert(0) += 1;
        }

        if EMOJIS.iter().any(|e| message.contains(e)) {
            emoji_samples.push(message.to_string());
        }

        for token in &tokens {
            words.add((*token).to_string());
        }
        for pair in tokens.windows(2) {
            phrases.add(pair.join(" "));
        }
    }

    let keywords = words
        .ranked()
        .into_iter()
        .take(KEYWORD_CANDIDATES)
        .filter(|w| {
            !STOP_WORDS.contains(w.to_lowercase().as_str())
                && w.chars().count() > MIN_KEYWORD_CHARS
        })
        .take(MAX_KEYWORDS)
        .collect();

    let common_phrases = phrases.ranked().into_iter().take(MAX_PHRASES).collect();

    let average_length = if lengths.is_empty() {
        DEFAULT_AVERAGE_LENGTH
    } else {
        lengths.iter().sum::<usize>() / lengths.len()
    };

    StyleFingerprint {
        keywords,
        common_phrases,
        average_length,
        punctuation_counts,
        emoji_samples,
    }
}

/// Counts occurrences and remembers first-seen order for tie breaking.
#[derive(Debug, Default)]
struct FrequencyCounter {
    counts: HashMap<String, (usize, usize)>,
}

impl FrequencyCounter {
    fn add(&mut self, item: String) {
        let next_index = self.counts.len();
        self.counts.entry(item).or_insert((0, next_index)).0 += 1;
    }

    /// Items by count descending, then by first appearance.
    fn ranked(self) -> Vec<String> {
        let mut entries: Vec<(String, (usize, usize))> = self.counts.into_iter().collect();
        entries.sort_by(|(_, (ca, ia)), (_, (cb, ib))| cb.cmp(ca).then(ia.cmp(ib)));
        entries.into_iter().map(|(item, _)| item).collect()
    }
}
