//! `profile`: compute the style fingerprint of one author from an export.

use std::path::Path;

use tracing::info;

use super::{read_export, OutputFormat};
use crate::error::{Error, Result};
use crate::style::{profile, StyleFingerprint};
use crate::transcript;

/// Fingerprint of `author`; fails when the export has no messages by them.
pub fn fingerprint_for(extraction: &transcript::Extraction, author: &str) -> Result<StyleFingerprint> {
    let messages = extraction.messages_of(author);
    if messages.is_empty() {
        return Err(Error::ProfileNotFound(author.to_string()));
    }
    info!(author, messages = messages.len(), "Profiling author");
    Ok(profile(&messages))
}

pub async fn run(path: &Path, author: &str, format: &str) -> Result<()> {
    let fmt = OutputFormat::parse(format)?;
    let bytes = read_export(path)?;
    let extraction = transcript::try_extract_bytes(&bytes, None)?;
    let fingerprint = fingerprint_for(&extraction, author)?;

    match fmt.render(&fingerprint)? {
        Some(out) => println!("{}", out),
        None => {
            println!("Профиль: {}", author);
            println!("Средняя длина: {}", fingerprint.average_length);
            println!("Ключевые слова: {}", fingerprint.keywords.join(", "));
            println!("Частые фразы: {}", fingerprint.common_phrases.join(" | "));
            println!("Знаков препинания: {}", fingerprint.punctuation_total());
            println!("Эмодзи: {}", fingerprint.emoji_samples.join(" "));
        }
    }
    Ok(())
}
