//! Controlled randomness so replies do not look machine-perfect.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;

/// Punctuation marks that jitter may drop or swap.
pub const JITTER_PUNCTUATION: [char; 4] = ['.', ',', '!', '?'];

/// Typos are drawn from the lowercase Cyrillic range.
const TYPO_ALPHABET: std::ops::RangeInclusive<char> = 'а'..='я';

pub const DEFAULT_REMOVAL_PROB: f64 = 0.02;
pub const DEFAULT_REPLACE_PROB: f64 = 0.01;
pub const DEFAULT_TYPO_RATE: f64 = 0.1;

/// Probabilities for the post-processing stages.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct NoiseSettings {
    pub removal_prob: f64,
    pub replace_prob: f64,
    pub typo_rate: f64,
    /// Typo injection is optional and off unless enabled.
    pub typos_enabled: bool,
}

impl Default for NoiseSettings {
    fn default() -> Self {
        Self {
            removal_prob: DEFAULT_REMOVAL_PROB,
            replace_prob: DEFAULT_REPLACE_PROB,
            typo_rate: DEFAULT_TYPO_RATE,
            typos_enabled: false,
        }
    }
}

impl NoiseSettings {
    /// No perturbation at all.
    pub fn silent() -> Self {
        Self {
            removal_prob: 0.0,
            replace_prob: 0.0,
            typo_rate: 0.0,
            typos_enabled: false,
        }
    }
}

/// Drop or swap punctuation marks, one independent draw per mark.
pub fn jitter_punctuation<R: Rng + ?Sized>(
    text: &str,
    removal_prob: f64,
    replace_prob: f64,
    rng: &mut R,
) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if !JITTER_PUNCTUATION.contains(&c) {
            out.push(c);
            continue;
        }
        if rng.gen::<f64>() < removal_prob {
            continue;
        }
        if rng.gen::<f64>() < replace_prob {
            if let Some(replacement) = JITTER_PUNCTUATION.choose(rng) {
                out.push(*replacement);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Replace one random letter in some words with a random Cyrillic letter.
///
/// Words of two chars or fewer are never touched. Whitespace is normalized
/// to single spaces.
pub fn inject_typos<R: Rng + ?Sized>(text: &str, error_rate: f64, rng: &mut R) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars: Vec<char> = word.chars().collect();
            if rng.gen::<f64>() < error_rate && chars.len() > 2 {
                let index = rng.gen_range(0..chars.len());
                chars[index] = rng.gen_range(TYPO_ALPHABET);
                chars.into_iter().collect()
            } else {
                word.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
