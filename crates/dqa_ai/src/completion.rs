use dqa_core::error::AppError;
use tracing::warn;

use crate::llm::Llm;

/// Prefix of every diagnostic produced in place of a model answer.
pub const FAILURE_MARKER: &str = "LLM CALL FAILED";

/// Characters of the outgoing prompt echoed back in a failure diagnostic.
pub const PROMPT_PREVIEW_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Answered(String),
    Failed { kind: String, detail: String },
}

impl CompletionOutcome {
    /// Flatten to the string that callers see in `AnswerResult::answer`.
    pub fn into_answer(self, prompt: &str) -> String {
        match self {
            CompletionOutcome::Answered(text) => text,
            CompletionOutcome::Failed { kind, detail } => {
                failure_diagnostic(&kind, &detail, prompt)
            }
        }
    }
}

/// Run one completion, classifying the result.
///
/// Configuration errors (missing credential) are returned as `Err`; every other failure becomes
/// `CompletionOutcome::Failed`.
pub fn try_complete(llm: &dyn Llm, prompt: &str) -> Result<CompletionOutcome, AppError> {
    match llm.generate(prompt) {
        Ok(text) => Ok(CompletionOutcome::Answered(text)),
        Err(e) if e.is_config_error() => Err(e),
        Err(e) => {
            let detail = match e.details.as_deref() {
                Some(d) => format!("{} ({d})", e.message),
                None => e.message.clone(),
            };
            warn!(code = %e.code, retryable = e.retryable, "completion failed; returning diagnostic");
            Ok(CompletionOutcome::Failed {
                kind: e.code,
                detail,
            })
        }
    }
}

/// Fail-soft completion: the model's text, or a diagnostic string if the call failed.
pub fn complete(llm: &dyn Llm, prompt: &str) -> Result<String, AppError> {
    Ok(try_complete(llm, prompt)?.into_answer(prompt))
}

pub fn failure_diagnostic(kind: &str, detail: &str, prompt: &str) -> String {
    format!(
        "{FAILURE_MARKER}: {kind}: {detail}\n\n--- PROMPT PREVIEW ---\n\n{}",
        prompt_preview(prompt)
    )
}

fn prompt_preview(prompt: &str) -> &str {
    match prompt.char_indices().nth(PROMPT_PREVIEW_CHARS) {
        Some((idx, _)) => &prompt[..idx],
        None => prompt,
    }
}
