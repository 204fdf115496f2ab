use std::collections::BTreeMap;

pub type SparseVector = BTreeMap<String, f32>;

/// Lowercased alphanumeric terms of at least two characters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(|t| t.to_lowercase())
        .collect()
}

pub fn term_counts(tokens: &[String]) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for t in tokens {
        *counts.entry(t.clone()).or_insert(0u32) += 1;
    }
    counts
}

pub fn l2_norm(v: &SparseVector) -> f32 {
    let mut sum = 0.0f32;
    for x in v.values() {
        sum += x * x;
    }
    sum.sqrt()
}

pub fn normalize(v: &mut SparseVector) {
    let norm = l2_norm(v);
    if norm == 0.0 {
        return;
    }
    for x in v.values_mut() {
        *x /= norm;
    }
}

/// Dot product of two sparse vectors; equals cosine similarity when both are L2-normalised.
pub fn dot(a: &SparseVector, b: &SparseVector) -> f32 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let mut sum = 0.0f32;
    for (term, x) in small {
        if let Some(y) = large.get(term) {
            sum += x * y;
        }
    }
    sum
}
