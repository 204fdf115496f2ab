use std::collections::BTreeSet;
use std::sync::OnceLock;

use dqa_core::domain::AnswerResult;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::answer::FALLBACK_ANSWER;
use crate::completion::FAILURE_MARKER;
use crate::context::parse_prompt_headers;

/// Advisory inspection of an answer's citations. Nothing here rejects an answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CitationAudit {
    pub cited_chunk_ids: Vec<u32>,
    /// Ids whose headers appear in the prompt's context section, in prompt order.
    pub context_chunk_ids: Vec<u32>,
    /// Cited ids that were not in the context sent to the model.
    pub unknown_chunk_ids: Vec<u32>,
    pub is_fallback: bool,
    pub is_completion_failure: bool,
}

pub fn citation_token(chunk_id: u32) -> String {
    format!("[chunk_id={chunk_id}]")
}

fn citation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[chunk_id=(\d+)\]").expect("citation pattern is valid"))
}

/// Ids referenced by `[chunk_id=N]` tokens, deduplicated and sorted.
pub fn extract_cited_chunk_ids(answer: &str) -> BTreeSet<u32> {
    citation_regex()
        .captures_iter(answer)
        .filter_map(|c| c[1].parse().ok())
        .collect()
}

/// True when the answer is exactly the fallback sentence (surrounding whitespace ignored).
pub fn is_fallback_answer(answer: &str) -> bool {
    answer.trim() == FALLBACK_ANSWER
}

pub fn is_completion_failure(answer: &str) -> bool {
    answer.starts_with(FAILURE_MARKER)
}

/// Compare an answer's citations with the context headers of the prompt that produced it.
pub fn audit_answer(result: &AnswerResult) -> CitationAudit {
    let cited = extract_cited_chunk_ids(&result.answer);
    let context_chunk_ids: Vec<u32> = parse_prompt_headers(&result.prompt_used)
        .into_iter()
        .map(|h| h.chunk_id)
        .collect();
    let seen: BTreeSet<u32> = context_chunk_ids.iter().copied().collect();
    CitationAudit {
        unknown_chunk_ids: cited.difference(&seen).copied().collect(),
        context_chunk_ids,
        cited_chunk_ids: cited.into_iter().collect(),
        is_fallback: is_fallback_answer(&result.answer),
        is_completion_failure: is_completion_failure(&result.answer),
    }
}
