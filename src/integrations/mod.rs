//! External integrations module.
//!
//! Provides:
//! - The [`Generator`] seam the imitation pipeline calls
//! - An OpenAI-compatible chat-completions client (OpenRouter by default)

pub mod openai;

use async_trait::async_trait;

use crate::Result;

pub use openai::OpenAIClient;

/// One generation call: instructions, the user turn and sampling limits.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub stop: Vec<String>,
}

/// Text in, text out. Transport, status and body problems are all `Err`.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}
