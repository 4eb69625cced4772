//! `reply`: one-shot imitation straight from an export file.
//!
//! The export is ingested into an in-memory store, the target is selected and
//! every message (from arguments, or stdin lines when none are given) is
//! answered in the target's style.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use super::read_export;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::imitator::{Imitator, Reply};
use crate::integrations::{Generator, OpenAIClient};
use crate::storage::MemoryProfileStore;

/// Requester id used for local runs.
const LOCAL_REQUESTER: i64 = 0;

#[derive(Debug, Clone)]
pub struct ReplyArgs {
    pub path: PathBuf,
    pub target: String,
    pub messages: Vec<String>,
    pub config: Option<PathBuf>,
    pub seed: Option<u64>,
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_file(path).map_err(Error::Config),
        None => Ok(Config::new()),
    }
}

/// Build the chat-completions client from configuration.
pub fn generator_from_config(config: &Config) -> Result<OpenAIClient> {
    let client = if config.llm.api_key.is_empty() {
        OpenAIClient::from_env()?
    } else {
        OpenAIClient::new(config.llm.api_key.clone())?
    };
    Ok(client
        .with_base_url(config.llm.base_url.clone())
        .with_model(config.llm.model.clone()))
}

pub async fn run(args: ReplyArgs) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    let generator: Arc<dyn Generator> = Arc::new(generator_from_config(&config)?);
    let mut settings = config.imitation_settings();
    if args.seed.is_some() {
        settings.seed = args.seed;
    }

    let imitator = Imitator::new(Arc::new(MemoryProfileStore::new()), generator, settings);
    let filename = args
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let bytes = read_export(&args.path)?;
    let report = imitator
        .ingest_transcript(LOCAL_REQUESTER, "Me", &bytes, &filename)
        .await?;
    info!(participants = ?report.participants, "Export loaded");

    let selected = imitator.select_target(LOCAL_REQUESTER, &args.target).await?;
    println!(
        "Имитирую {} ({} сообщений{})",
        selected.target,
        selected.samples,
        if selected.has_fingerprint { "" } else { ", без профиля стиля" }
    );

    if !args.messages.is_empty() {
        for message in &args.messages {
            answer(&imitator, message).await?;
        }
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        answer(&imitator, line).await?;
    }
    Ok(())
}

async fn answer(imitator: &Imitator, message: &str) -> Result<()> {
    match imitator.reply(LOCAL_REQUESTER, message).await? {
        Reply::Generated(text) => println!("> {}\n{}", message, text),
        Reply::StateReset(notice) => {
            return Err(Error::StateInconsistency(notice));
        }
        Reply::NotImitating => {
            return Err(Error::StateInconsistency("imitation is off".to_string()));
        }
    }
    Ok(())
}
