use std::str::FromStr;

use dqa_core::error::{AppError, CONFIG_MISSING_CREDENTIAL};

pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Settings for the OpenAI-compatible completion endpoint.
///
/// The API key itself is not stored here: it is looked up from `api_key_env` on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub api_key_env: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4.1-mini".to_string(),
            temperature: 0.1,
            max_tokens: 500,
            timeout_secs: 60,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

impl CompletionConfig {
    /// Defaults overridden by `DQA_LLM_*` variables (process environment or `.env`).
    pub fn from_env() -> Result<Self, AppError> {
        let mut cfg = Self::default();
        if let Ok(v) = dotenv::var("DQA_LLM_BASE_URL") {
            cfg.base_url = v;
        }
        if let Ok(v) = dotenv::var("DQA_LLM_MODEL") {
            cfg.model = v;
        }
        if let Some(v) = parse_var("DQA_LLM_TEMPERATURE")? {
            cfg.temperature = v;
        }
        if let Some(v) = parse_var("DQA_LLM_MAX_TOKENS")? {
            cfg.max_tokens = v;
        }
        if let Some(v) = parse_var("DQA_LLM_TIMEOUT_SECS")? {
            cfg.timeout_secs = v;
        }
        if let Ok(v) = dotenv::var("DQA_LLM_API_KEY_ENV") {
            cfg.api_key_env = v;
        }
        Ok(cfg)
    }

    /// Chat completions URL for bases ending in `/v1`, `/chat/completions`, or neither.
    pub fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }

    /// Resolve the API key now. Absent or blank is a configuration error naming the variable.
    pub fn resolve_api_key(&self) -> Result<String, AppError> {
        match dotenv::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
            _ => Err(AppError::new(
                CONFIG_MISSING_CREDENTIAL,
                format!(
                    "Environment variable {} is not set; set it before asking questions",
                    self.api_key_env
                ),
            )
            .with_details(format!("var={}", self.api_key_env))),
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, AppError>
where
    T::Err: std::fmt::Display,
{
    match dotenv::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            AppError::new("CONFIG_INVALID", format!("Invalid value for {name}"))
                .with_details(format!("value={raw}; err={e}"))
        }),
        Err(_) => Ok(None),
    }
}
