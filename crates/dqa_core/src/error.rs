use serde::{Deserialize, Serialize};
use std::fmt;

/// Raised before any network attempt when the completion credential is absent.
pub const CONFIG_MISSING_CREDENTIAL: &str = "CONFIG_MISSING_CREDENTIAL";
/// Empty question, non-positive `k`, or similar caller contract violations.
pub const INVALID_ARGUMENT: &str = "INVALID_ARGUMENT";

/// Single structured error shape used across the library crates and printed by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(INVALID_ARGUMENT, message)
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn is_config_error(&self) -> bool {
        self.code.starts_with("CONFIG_")
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}
