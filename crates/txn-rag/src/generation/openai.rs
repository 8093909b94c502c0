//! OpenAI chat-completions client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::CompletionProvider;
use crate::config::LlmConfig;
use crate::error::{Error, Result, UpstreamError};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for `POST {base_url}/chat/completions`
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: Option<f32>,
    timeout_ms: u64,
}

impl OpenAiClient {
    /// Create a client; the API key is read from `config.api_key_env`
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Self::with_api_key(config, config.api_key())
    }

    /// Create a client with an explicit key
    pub fn with_api_key(config: &LlmConfig, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        if api_key.is_none() {
            tracing::warn!(
                "{} is not set; completion requests will fail with an authentication error",
                config.api_key_env
            );
        }

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            timeout_ms: config.timeout_secs * 1000,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, UpstreamError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| UpstreamError::Authentication {
            message: "no API key configured".to_string(),
        })?;

        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        tracing::debug!("Sending completion request to {} ({})", url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| UpstreamError::from_reqwest_error(e, self.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::from_status_and_body(status.as_u16(), &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| UpstreamError::from_reqwest_error(e, self.timeout_ms))?;

        parse_answer(&body)
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Extract `choices[0].message.content`
fn parse_answer(body: &str) -> std::result::Result<String, UpstreamError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| UpstreamError::InvalidResponse {
            message: format!("unparseable completion body: {}", e),
        })?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| UpstreamError::InvalidResponse {
            message: "completion returned no choices".to_string(),
        })
}
