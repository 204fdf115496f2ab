/// Exact reply the model is told to give when the chunks do not contain the answer.
/// Downstream consumers match on this byte-for-byte.
pub const FALLBACK_ANSWER: &str =
    "Based on the provided documents, this information is not available.";

pub const DEFAULT_SUBJECT: &str = "EssilorLuxottica";

// Placeholders are substituted after dedenting, in a single pass.
const ANSWER_TEMPLATE: &str = r#"
    You are a financial and ESG analyst answering questions about {subject}.

    Use ONLY the information provided in the text chunks below.
    If the answer does not appear in the chunks, respond exactly:
    "{fallback}"

    Rules:
    1. Cite chunk_ids like this: [chunk_id=5].
    2. Do NOT introduce information that is not in the chunks.
    3. Keep the answer to 3–5 sentences.
    4. If chunks conflict, choose the one with the most recent year.

    User question:
    {question}

    Retrieved chunks:
    {context}

    Now provide:
    1. A direct answer (3–5 sentences).
    2. A short note on missing or uncertain information.
    3. A list of chunk_ids used.
    "#;

const CONTEXT_OPEN: &str = "Retrieved chunks:\n";
const CONTEXT_CLOSE: &str = "\n\nNow provide:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBuilder {
    subject: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_SUBJECT)
    }
}

impl PromptBuilder {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Final prompt for `question` grounded in the serialized `context`.
    pub fn build(&self, question: &str, context: &str) -> String {
        let template = textwrap::dedent(ANSWER_TEMPLATE);
        render(
            &template,
            &[
                ("subject", self.subject.as_str()),
                ("fallback", FALLBACK_ANSWER),
                ("question", question),
                ("context", context),
            ],
        )
        .trim()
        .to_string()
    }
}

/// The serialized context inside a prompt produced by [`PromptBuilder::build`], or `""` when
/// the prompt has no context section.
pub fn context_block(prompt: &str) -> &str {
    let Some(open) = prompt.find(CONTEXT_OPEN) else {
        return "";
    };
    let start = open + CONTEXT_OPEN.len();
    match prompt[start..].rfind(CONTEXT_CLOSE) {
        Some(end) => &prompt[start..start + end],
        None => "",
    }
}

/// Replace `{name}` placeholders from `vars`. Substituted text is never re-scanned and unknown
/// `{...}` sequences are copied through untouched.
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| (*v, close))
        });
        match value {
            Some((v, close)) => {
                out.push_str(v);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_once() {
        let out = render(
            "q={question} c={context} x={other}",
            &[("question", "{context}"), ("context", "ctx")],
        );
        assert_eq!(out, "q={context} c=ctx x={other}");
    }

    #[test]
    fn prompt_has_no_template_indentation() {
        let prompt = PromptBuilder::default().build("What was EBITDA in FY24?", "");
        assert!(prompt.starts_with(
            "You are a financial and ESG analyst answering questions about EssilorLuxottica."
        ));
        assert!(prompt.ends_with("3. A list of chunk_ids used."));
        assert!(prompt.lines().all(|l| !l.starts_with(' ')));
    }

    #[test]
    fn indented_context_lines_do_not_shift_the_template() {
        let prompt = PromptBuilder::default().build("q", "    indented evidence");
        assert!(prompt.contains("\nRules:\n"));
        assert!(prompt.contains("\n    indented evidence\n"));
    }

    #[test]
    fn context_block_recovers_the_embedded_context() {
        let ctx = "[chunk_id=1, source=a.txt, doc_type=esg, year=2024]\none\n\nNow provide: more";
        let prompt = PromptBuilder::default().build("Retrieved chunks?", ctx);
        assert_eq!(context_block(&prompt), ctx);
        assert_eq!(context_block(&PromptBuilder::default().build("q", "")), "");
        assert_eq!(context_block("no sections here"), "");
    }
}
