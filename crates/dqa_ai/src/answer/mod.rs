use std::collections::BTreeSet;
use std::sync::Arc;

use dqa_core::domain::{AnswerResult, RetrievalRequest};
use dqa_core::error::AppError;
use tracing::{info, warn};

use crate::completion::complete;
use crate::context::serialize_context;
use crate::llm::Llm;
use crate::retrieve::Retriever;

pub mod prompts;

pub use prompts::{context_block, PromptBuilder, DEFAULT_SUBJECT, FALLBACK_ANSWER};

/// Answer one question: retrieve, serialize, prompt, complete.
///
/// One retrieval call and one completion call, no retries. Retrieval and configuration errors
/// propagate; completion failures come back as a diagnostic in `answer`.
pub fn answer_with_llm(
    retriever: &dyn Retriever,
    llm: &dyn Llm,
    prompts: &PromptBuilder,
    req: &RetrievalRequest,
) -> Result<AnswerResult, AppError> {
    req.validate()?;

    let mut fragments = retriever.retrieve(req)?;
    if fragments.len() > req.k {
        warn!(
            returned = fragments.len(),
            k = req.k,
            "retriever returned more than k fragments; truncating"
        );
        fragments.truncate(req.k);
    }

    let context = serialize_context(&fragments);
    let prompt = prompts.build(&req.question, &context);
    info!(
        k = req.k,
        fragments = fragments.len(),
        prompt_chars = prompt.chars().count(),
        "answering question"
    );

    let answer = complete(llm, &prompt)?;

    Ok(AnswerResult {
        answer,
        fragments_used: fragments,
        prompt_used: prompt,
    })
}

/// Request-scoped question answering over injected collaborators.
///
/// Holds no per-request state; one instance can serve concurrent callers.
#[derive(Clone)]
pub struct AnswerPipeline {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn Llm>,
    prompts: PromptBuilder,
}

impl AnswerPipeline {
    pub fn new(retriever: Arc<dyn Retriever>, llm: Arc<dyn Llm>, prompts: PromptBuilder) -> Self {
        Self {
            retriever,
            llm,
            prompts,
        }
    }

    pub fn prompts(&self) -> &PromptBuilder {
        &self.prompts
    }

    pub fn answer(
        &self,
        question: &str,
        k: usize,
        allowed_doc_types: Option<BTreeSet<String>>,
    ) -> Result<AnswerResult, AppError> {
        self.answer_request(&RetrievalRequest::new(question, k, allowed_doc_types))
    }

    pub fn answer_request(&self, req: &RetrievalRequest) -> Result<AnswerResult, AppError> {
        answer_with_llm(self.retriever.as_ref(), self.llm.as_ref(), &self.prompts, req)
    }
}
