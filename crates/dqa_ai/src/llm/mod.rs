use dqa_core::error::AppError;

/// A text-completion backend. Implementations are shared across concurrent requests.
pub trait Llm: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, AppError>;
}

pub mod openai_llm;
