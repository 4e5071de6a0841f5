//! Prompt templating, the chat-completion provider and usage accounting.

pub mod groq;
pub mod prompts;
pub mod types;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db::models::NewAiLog;

/// Prompts are truncated to this many characters in usage logs.
pub const LOGGED_PROMPT_CHARS: usize = 500;

/// Provider call kinds, as recorded in `ai_logs.action`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiAction {
    GenerateOutline,
    GenerateContent,
    SeoAnalyze,
    Rewrite,
    Expand,
}

impl AiAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiAction::GenerateOutline => "generate_outline",
            AiAction::GenerateContent => "generate_content",
            AiAction::SeoAnalyze => "seo_analyze",
            AiAction::Rewrite => "rewrite",
            AiAction::Expand => "expand",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("AI API key not configured. Please set GROQ_API_KEY in your environment.")]
    NotConfigured,
    #[error("AI service request failed: {body}")]
    RequestFailed { status: u16, body: String },
    #[error("AI service error: {0}")]
    Transport(String),
    #[error("AI service returned an invalid response: {0}")]
    MalformedResponse(String),
}

/// Raw result of one chat-completion call
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub tokens_used: i64,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str)
        -> Result<Completion, AiError>;
}

/// A templated prompt ready to send
#[derive(Debug, Clone)]
pub struct Prompt {
    pub action: AiAction,
    pub system: String,
    pub user: String,
}

/// Parsed model output for one action
#[derive(Debug, Clone)]
pub struct Generation<T> {
    pub data: T,
    pub raw: Value,
    pub tokens_used: i64,
}

/// Strip a Markdown code fence if the model wrapped its JSON in one.
fn extract_json(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Send `prompt` to the provider and decode the JSON object it returns.
pub async fn generate<T: DeserializeOwned>(
    provider: &dyn CompletionProvider,
    prompt: &Prompt,
) -> Result<Generation<T>, AiError> {
    tracing::debug!(action = prompt.action.as_str(), "sending prompt to provider");

    let completion = provider.complete(&prompt.system, &prompt.user).await?;

    let raw: Value = serde_json::from_str(extract_json(&completion.content))
        .map_err(|e| AiError::MalformedResponse(e.to_string()))?;
    if !raw.is_object() {
        return Err(AiError::MalformedResponse(
            "expected a JSON object".to_string(),
        ));
    }
    let data = serde_json::from_value::<T>(raw.clone())
        .map_err(|e| AiError::MalformedResponse(e.to_string()))?;

    tracing::info!(
        action = prompt.action.as_str(),
        tokens_used = completion.tokens_used,
        "provider call completed"
    );

    Ok(Generation {
        data,
        raw,
        tokens_used: completion.tokens_used,
    })
}

/// First `max` characters of `s`, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Usage-log record for a successful generation.
pub fn usage_log<T>(user_id: Uuid, prompt: &Prompt, generation: &Generation<T>) -> NewAiLog {
    NewAiLog {
        user_id,
        action: prompt.action.as_str().to_string(),
        tokens_used: i32::try_from(generation.tokens_used).unwrap_or(i32::MAX),
        request_data: json!({
            "system_prompt": truncate_chars(&prompt.system, LOGGED_PROMPT_CHARS),
            "user_prompt": truncate_chars(&prompt.user, LOGGED_PROMPT_CHARS),
        }),
        response_data: generation.raw.clone(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Provider returning a canned completion and recording the prompts it saw.
    pub struct MockProvider {
        pub response: Result<Completion, fn() -> AiError>,
        pub seen: Mutex<Vec<(String, String)>>,
    }

    impl MockProvider {
        pub fn replying(content: &str, tokens_used: i64) -> Self {
            Self {
                response: Ok(Completion {
                    content: content.to_string(),
                    tokens_used,
                }),
                seen: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(make: fn() -> AiError) -> Self {
            Self {
                response: Err(make),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for MockProvider {
        async fn complete(
            &self,
            system_prompt: &str,
            user_prompt: &str,
        ) -> Result<Completion, AiError> {
            self.seen
                .lock()
                .unwrap()
                .push((system_prompt.to_string(), user_prompt.to_string()));
            match &self.response {
                Ok(completion) => Ok(completion.clone()),
                Err(make) => Err(make()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockProvider;
    use super::types::RewriteResult;
    use super::*;

    fn prompt() -> Prompt {
        Prompt {
            action: AiAction::Rewrite,
            system: "s".repeat(600),
            user: "é".repeat(700),
        }
    }

    #[test]
    fn test_action_names_match_log_values() {
        assert_eq!(AiAction::GenerateOutline.as_str(), "generate_outline");
        assert_eq!(
            serde_json::to_string(&AiAction::SeoAnalyze).unwrap(),
            "\"seo_analyze\""
        );
    }

    #[test]
    fn test_extract_json_strips_fence() {
        assert_eq!(extract_json("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(extract_json("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[tokio::test]
    async fn test_generate_decodes_typed_result() {
        let provider = MockProvider::replying(
            r#"{"rewritten_content":"Better.","changes_made":["Shorter"]}"#,
            42,
        );
        let generation: Generation<RewriteResult> =
            generate(&provider, &prompt()).await.unwrap();
        assert_eq!(generation.data.rewritten_content, "Better.");
        assert_eq!(generation.tokens_used, 42);
        assert_eq!(provider.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_rejects_non_json() {
        let provider = MockProvider::replying("Sure! Here is your text.", 5);
        let result: Result<Generation<RewriteResult>, _> = generate(&provider, &prompt()).await;
        assert!(matches!(result, Err(AiError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_generate_propagates_provider_error() {
        let provider = MockProvider::failing(|| AiError::NotConfigured);
        let result: Result<Generation<RewriteResult>, _> = generate(&provider, &prompt()).await;
        assert!(matches!(result, Err(AiError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_usage_log_truncates_prompts() {
        let provider = MockProvider::replying(r#"{"rewritten_content":"x"}"#, 7);
        let p = prompt();
        let generation: Generation<RewriteResult> = generate(&provider, &p).await.unwrap();
        let log = usage_log(Uuid::nil(), &p, &generation);

        assert_eq!(log.action, "rewrite");
        assert_eq!(log.tokens_used, 7);
        let user_prompt = log.request_data["user_prompt"].as_str().unwrap();
        assert_eq!(user_prompt.chars().count(), LOGGED_PROMPT_CHARS);
        let system_prompt = log.request_data["system_prompt"].as_str().unwrap();
        assert_eq!(system_prompt.len(), LOGGED_PROMPT_CHARS);
        assert_eq!(log.response_data["rewritten_content"], "x");
    }
}
