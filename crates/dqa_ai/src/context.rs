use std::sync::OnceLock;

use dqa_core::domain::Fragment;
use regex::Regex;

use crate::answer::context_block;

/// Metadata recovered from one serialized fragment header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextHeader {
    pub chunk_id: u32,
    pub source: String,
    pub doc_type: String,
    pub year: i32,
}

pub fn fragment_header(fragment: &Fragment) -> String {
    format!(
        "[chunk_id={}, source={}, doc_type={}, year={}]",
        fragment.id, fragment.source, fragment.doc_type, fragment.year
    )
}

/// Render fragments into the prompt's context block.
///
/// Each block is the header line followed by the raw text; blocks are separated by one blank
/// line. Retrieval order is kept as-is and an empty slice yields an empty string.
pub fn serialize_context(fragments: &[Fragment]) -> String {
    fragments
        .iter()
        .map(|f| format!("{}\n{}", fragment_header(f), f.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[chunk_id=(\d+), source=(.*?), doc_type=(.*?), year=(-?\d+)\]$")
            .expect("header pattern is valid")
    })
}

fn parse_header_line(line: &str) -> Option<ContextHeader> {
    let c = header_regex().captures(line)?;
    Some(ContextHeader {
        chunk_id: c[1].parse().ok()?,
        source: c[2].to_string(),
        doc_type: c[3].to_string(),
        year: c[4].parse().ok()?,
    })
}

/// Headers found in a serialized context (or a whole prompt), in order of appearance.
///
/// Only lines that open a block are read: the first line, or a line after a blank line.
/// Header-shaped lines directly inside a fragment's text are skipped.
pub fn parse_context_headers(context: &str) -> Vec<ContextHeader> {
    let mut out = Vec::new();
    let mut block_start = true;
    for line in context.split('\n') {
        if block_start {
            if let Some(header) = parse_header_line(line) {
                out.push(header);
            }
        }
        block_start = line.is_empty();
    }
    out
}

/// Headers of the context section of a prompt built by `PromptBuilder::build`.
pub fn parse_prompt_headers(prompt: &str) -> Vec<ContextHeader> {
    parse_context_headers(context_block(prompt))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(id: u32, source: &str, doc_type: &str, year: i32, text: &str) -> Fragment {
        Fragment {
            id,
            source: source.to_string(),
            doc_type: doc_type.to_string(),
            year,
            text: text.to_string(),
        }
    }

    #[test]
    fn empty_input_serializes_to_empty_string() {
        assert_eq!(serialize_context(&[]), "");
    }

    #[test]
    fn header_is_followed_by_text_on_next_line() {
        let ctx = serialize_context(&[frag(
            0,
            "factset_esg_clean.txt",
            "esg",
            2024,
            "Scope 1: 116,092 tCO2e",
        )]);
        assert_eq!(
            ctx,
            "[chunk_id=0, source=factset_esg_clean.txt, doc_type=esg, year=2024]\nScope 1: 116,092 tCO2e"
        );
    }

    #[test]
    fn blocks_keep_order_and_duplicates() {
        let a = frag(7, "b.txt", "financial", 2023, "first");
        let b = frag(2, "a.txt", "esg", 2024, "second");
        let ctx = serialize_context(&[a.clone(), b, a]);
        assert_eq!(
            ctx,
            "[chunk_id=7, source=b.txt, doc_type=financial, year=2023]\nfirst\n\n\
             [chunk_id=2, source=a.txt, doc_type=esg, year=2024]\nsecond\n\n\
             [chunk_id=7, source=b.txt, doc_type=financial, year=2023]\nfirst"
        );
    }

    #[test]
    fn header_fields_may_contain_commas() {
        let line = "[chunk_id=4, source=Annual Report, 2024.txt, doc_type=esg, scope, year=-1]";
        assert_eq!(
            parse_header_line(line),
            Some(ContextHeader {
                chunk_id: 4,
                source: "Annual Report, 2024.txt".to_string(),
                doc_type: "esg, scope".to_string(),
                year: -1,
            })
        );
    }
}
