use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A retrievable unit of disclosure text, cited in answers as `[chunk_id=<id>]`.
///
/// Fragments are owned by the fragment store; the answer pipeline only borrows them for the
/// duration of one request and clones the ones it reports back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fragment {
    pub id: u32,
    /// Originating document name, e.g. `factset_esg_clean.txt`.
    pub source: String,
    /// Free-form category such as `esg` or `financial`.
    pub doc_type: String,
    pub year: i32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrievalRequest {
    pub question: String,
    /// Maximum number of fragments to retrieve.
    pub k: usize,
    /// `None` means no doc_type filter.
    pub allowed_doc_types: Option<BTreeSet<String>>,
}

impl RetrievalRequest {
    pub fn new(
        question: impl Into<String>,
        k: usize,
        allowed_doc_types: Option<BTreeSet<String>>,
    ) -> Self {
        Self {
            question: question.into(),
            k,
            allowed_doc_types,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.question.trim().is_empty() {
            return Err(AppError::invalid_argument("Question must not be empty"));
        }
        if self.k == 0 {
            return Err(AppError::invalid_argument("k must be a positive integer")
                .with_details(format!("k={}", self.k)));
        }
        Ok(())
    }

    pub fn allows_doc_type(&self, doc_type: &str) -> bool {
        match self.allowed_doc_types.as_ref() {
            Some(allowed) => allowed.contains(doc_type),
            None => true,
        }
    }
}

/// Outcome of one question. `answer` is always a plain string: either the model output or a
/// `LLM CALL FAILED` diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswerResult {
    pub answer: String,
    pub fragments_used: Vec<Fragment>,
    pub prompt_used: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationWarning {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl ValidationWarning {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
