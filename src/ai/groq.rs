//! Groq chat-completions client (OpenAI-compatible API).

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{AiError, Completion, CompletionProvider};

const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_MODEL: &str = "llama-3.1-70b-versatile";

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("GROQ_API_KEY").unwrap_or_default(),
            api_url: std::env::var("GROQ_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            model: std::env::var("GROQ_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            timeout_secs: std::env::var("AI_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            temperature: 0.7,
            max_tokens: 4000,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    total_tokens: i64,
}

fn into_completion(response: ChatResponse) -> Result<Completion, AiError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| AiError::MalformedResponse("response contained no message".to_string()))?;

    Ok(Completion {
        content,
        tokens_used: response.usage.map(|u| u.total_tokens).unwrap_or(0),
    })
}

pub struct GroqClient {
    client: reqwest::Client,
    config: AiConfig,
}

impl GroqClient {
    pub fn new(config: AiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to build AI HTTP client, using defaults");
                reqwest::Client::new()
            });
        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        !self.config.api_key.trim().is_empty()
    }
}

#[async_trait]
impl CompletionProvider for GroqClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<Completion, AiError> {
        if !self.is_configured() {
            return Err(AiError::NotConfigured);
        }

        let request = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "AI provider request failed");
                AiError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "AI provider returned error");
            return Err(AiError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.json::<ChatResponse>().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse AI provider response");
            AiError::MalformedResponse(e.to_string())
        })?;

        into_completion(body)
    }
}

static PROVIDER: Lazy<Arc<dyn CompletionProvider>> =
    Lazy::new(|| -> Arc<dyn CompletionProvider> { Arc::new(GroqClient::new(AiConfig::default())) });

/// Process-wide provider built from the environment on first use.
pub fn provider() -> Arc<dyn CompletionProvider> {
    PROVIDER.clone()
}

/// Whether `GROQ_API_KEY` is set to a non-blank value.
pub fn api_key_configured() -> bool {
    std::env::var("GROQ_API_KEY")
        .map(|key| !key.trim().is_empty())
        .unwrap_or(false)
}
