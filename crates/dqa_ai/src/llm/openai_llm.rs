use std::time::Duration;

use dqa_core::error::AppError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Llm;
use crate::config::CompletionConfig;

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
///
/// Constructed once and shared; the credential is resolved per call so a missing key is
/// reported when a question is asked, before any request is sent.
#[derive(Debug, Clone)]
pub struct OpenAiLlm {
    agent: ureq::Agent,
    config: CompletionConfig,
}

impl OpenAiLlm {
    pub fn new(config: CompletionConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self { agent, config }
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl Llm for OpenAiLlm {
    fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let api_key = self.config.resolve_api_key()?;

        let url = self.config.endpoint();
        let req = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        let body = serde_json::to_value(req).map_err(|e| {
            AppError::new("AI_COMPLETION_FAILED", "Failed to encode completion request")
                .with_details(e.to_string())
        })?;

        debug!(model = %self.config.model, url = %url, prompt_chars = prompt.chars().count(), "sending completion request");
        let resp = self
            .agent
            .post(&url)
            .set("Authorization", &format!("Bearer {api_key}"))
            .send_json(body);

        match resp {
            Ok(r) => {
                let v: ChatResponse = r.into_json().map_err(|e| {
                    AppError::new("AI_COMPLETION_FAILED", "Failed to decode completion response")
                        .with_details(e.to_string())
                })?;
                let content = v
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .unwrap_or_default();
                if content.trim().is_empty() {
                    return Err(AppError::new(
                        "AI_COMPLETION_EMPTY",
                        "Completion response had no content",
                    ));
                }
                Ok(content)
            }
            Err(ureq::Error::Status(status, r)) => {
                let body = r.into_string().unwrap_or_default();
                Err(
                    AppError::new("AI_COMPLETION_FAILED", "Completion request was rejected")
                        .with_details(format!("status={status}; body={}", body.trim()))
                        .with_retryable(status == 429 || status >= 500),
                )
            }
            Err(e) => Err(
                AppError::new("AI_COMPLETION_FAILED", "Failed to call completion endpoint")
                    .with_details(e.to_string())
                    .with_retryable(true),
            ),
        }
    }
}
