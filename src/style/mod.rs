//! Style modeling: fingerprint extraction, reply repair and noise injection.

pub mod coherence;
pub mod noise;
pub mod profiler;

pub use coherence::{CoherenceFilter, FilterOutcome};
pub use noise::{inject_typos, jitter_punctuation, NoiseSettings};
pub use profiler::{profile, StyleFingerprint, DEFAULT_AVERAGE_LENGTH};
