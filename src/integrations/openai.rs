//! OpenAI-compatible chat-completions client used for reply generation.
//!
//! Defaults to OpenRouter; any endpoint speaking the `/chat/completions`
//! protocol works.

use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GenerationRequest, Generator};
use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "anthropic/claude-3-haiku";

/// Chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAIClient {
    http: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIClient {
    /// Create client from environment variables.
    ///
    /// `OPENROUTER_API_KEY` wins over `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("OPENROUTER_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .map_err(|_| Error::Config("OPENROUTER_API_KEY не установлен".to_string()))?;
        Self::new(api_key)
    }

    /// Create client with API key.
    pub fn new<S: Into<String>>(api_key: S) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Config("API ключ пустой".to_string()));
        }

        let http = Client::builder()
            .user_agent("style_imitator/0.1.0")
            .build()
            .map_err(|e| Error::Config(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Chat completion.
    pub async fn chat_completion(
        &self,
        messages: Vec<ChatMessage>,
        temperature: f32,
        max_tokens: u32,
        stop: Vec<String>,
    ) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature,
            max_tokens,
            stop,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Generation(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(Error::Generation(format!("API error {}: {}", status, text)));
        }

        let chat_response: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| Error::Generation(format!("Invalid response: {}", e)))?;

        chat_response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| Error::Generation("Empty response from model".to_string()))
    }
}

#[async_trait]
impl Generator for OpenAIClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        debug!(model = %self.model, max_tokens = request.max_tokens, "Requesting completion");
        let messages = vec![
            ChatMessage {
                role: "system".to_string(),
                content: Some(request.system.clone()),
            },
            ChatMessage {
                role: "user".to_string(),
                content: Some(request.user.clone()),
            },
        ];
        self.chat_completion(
            messages,
            request.temperature,
            request.max_tokens,
            request.stop.clone(),
        )
        .await
    }
}

/// Chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_new_rejects_empty_key() {
        let err = OpenAIClient::new("   ").unwrap_err();
        assert!(format!("{}", err).contains("пустой"));
    }

    fn client(server: &MockServer) -> OpenAIClient {
        OpenAIClient::new("test_key")
            .expect("client")
            .with_base_url(server.base_url())
            .with_model("test/model")
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            system: "Ты точно имитируешь Bob".to_string(),
            user: "привет".to_string(),
            max_tokens: 100,
            temperature: 0.3,
            stop: vec!["\n".to_string()],
        }
    }

    #[tokio::test]
    async fn generate_sends_limits_and_returns_content() {
        let server = MockServer::start_async().await;

        let completion_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/chat/completions")
                .header("Authorization", "Bearer test_key")
                .is_true(|req| {
                    let Ok(body) = serde_json::from_slice::<serde_json::Value>(req.body().as_ref())
                    else {
                        return false;
                    };
                    body["model"] == "test/model"
                        && body["max_tokens"] == 100
                        && body["stop"] == json!(["\n"])
                });
            then.status(200).json_body(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "Здарова" } }
                ]
            }));
        });

        let reply = client(&server).generate(&request()).await.unwrap();

        assert_eq!(reply, "Здарова");
        completion_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn generate_sends_system_and_user_turns() {
        let server = MockServer::start_async().await;

        let completion_mock = server.mock(|when, then| {
            when.method(POST).path("/chat/completions").is_true(|req| {
                let body = String::from_utf8_lossy(req.body().as_ref());
                body.contains("\"system\"") && body.contains("имитируешь Bob")
            });
            then.status(200).json_body(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "Ok" } }
                ]
            }));
        });

        client(&server).generate(&request()).await.unwrap();
        completion_mock.assert_calls(1);
    }

    #[tokio::test]
    async fn non_success_status_is_generation_error() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(429).body("rate limited");
        });

        let err = client(&server).generate(&request()).await.unwrap_err();

        assert!(matches!(err, Error::Generation(_)));
        let msg = err.to_string();
        assert!(msg.contains("429"));
        assert!(msg.contains("rate limited"));
    }

    #[tokio::test]
    async fn invalid_json_is_generation_error() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).body("not json");
        });

        let err = client(&server).generate(&request()).await.unwrap_err();
        assert!(err.to_string().contains("Invalid response"));
    }

    #[tokio::test]
    async fn empty_choices_is_generation_error() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({ "choices": [] }));
        });

        let err = client(&server).generate(&request()).await.unwrap_err();
        assert!(err.to_string().contains("Empty response"));
    }

    #[tokio::test]
    async fn null_content_is_generation_error() {
        let server = MockServer::start_async().await;

        server.mock(|when, then| {
            when.method(POST).path("/chat/completions");
            then.status(200).json_body(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": null } }
                ]
            }));
        });

        let err = client(&server).generate(&request()).await.unwrap_err();
        assert!(err.is_generation_failure());
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_generation_error() {
        let err = OpenAIClient::new("k")
            .unwrap()
            .with_base_url("http://127.0.0.1:9")
            .generate(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Generation(_)));
    }
}
