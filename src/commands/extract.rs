//! `extract`: list who wrote what in an export, or dump one author's messages.

use std::path::Path;

use serde::Serialize;

use super::{read_export, OutputFormat};
use crate::error::Result;
use crate::transcript::{self, Extraction};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ParticipantSummary {
    pub name: String,
    pub messages: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractSummary {
    pub owner: Option<String>,
    pub owner_messages: usize,
    pub total_messages: usize,
    pub participants: Vec<ParticipantSummary>,
}

impl ExtractSummary {
    pub fn from_extraction(extraction: &Extraction) -> Self {
        let participants = extraction
            .participants()
            .into_iter()
            .map(|name| ParticipantSummary {
                messages: extraction.messages_of(&name).len(),
                name,
            })
            .collect();

        Self {
            owner: extraction.owner.clone(),
            owner_messages: extraction.owner_messages.len(),
            total_messages: extraction.messages.len(),
            participants,
        }
    }
}

pub async fn run(
    path: &Path,
    owner: Option<&str>,
    author: Option<&str>,
    format: &str,
) -> Result<()> {
    let fmt = OutputFormat::parse(format)?;
    let bytes = read_export(path)?;
    let extraction = transcript::try_extract_bytes(&bytes, owner)?;

    if let Some(author) = author {
        let messages = extraction.style_samples_of(author);
        match fmt.render(&messages)? {
            Some(out) => println!("{}", out),
            None => {
                println!("{}: {} сообщений", author, messages.len());
                for message in &messages {
                    println!("- {}", message);
                }
            }
        }
        return Ok(());
    }

    let summary = ExtractSummary::from_extraction(&extraction);
    match fmt.render(&summary)? {
        Some(out) => println!("{}", out),
        None => print_table(&summary),
    }
    Ok(())
}

fn print_table(summary: &ExtractSummary) {
    println!(
        "Владелец: {} ({} сообщений)",
        summary.owner.as_deref().unwrap_or("не найден"),
        summary.owner_messages
    );
    println!("Всего сообщений: {}", summary.total_messages);
    println!("{:<32} {:>8}", "Участник", "Сообщ.");
    for p in &summary.participants {
        println!("{:<32} {:>8}", p.name, p.messages);
    }
}
