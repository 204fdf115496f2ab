use super::store::normalize_text;

/// Upper bound for a single fragment body, in characters.
pub const MAX_FRAGMENT_CHARS: usize = 1600;

/// Split a document into paragraph-aligned fragment bodies.
///
/// Paragraphs (blank-line separated) are packed greedily until adding the next one would exceed
/// `max_chars`. A single paragraph longer than `max_chars` is kept whole.
pub fn chunk_text_by_paragraphs(text: &str, max_chars: usize) -> Vec<String> {
    let normalized = normalize_text(text);
    let paras: Vec<&str> = normalized
        .split("\n\n")
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();

    let mut out = Vec::new();
    let mut buf = String::new();
    let mut buf_chars = 0usize;
    for p in paras {
        let p_chars = p.chars().count();
        if !buf.is_empty() && buf_chars + 2 + p_chars > max_chars {
            out.push(std::mem::take(&mut buf));
            buf_chars = 0;
        }
        if !buf.is_empty() {
            buf.push_str("\n\n");
            buf_chars += 2;
        }
        buf.push_str(p);
        buf_chars += p_chars;
    }
    if !buf.trim().is_empty() {
        out.push(buf);
    }
    out
}
