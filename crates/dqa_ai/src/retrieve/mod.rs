use std::collections::BTreeMap;

use dqa_core::domain::{Fragment, RetrievalRequest};
use dqa_core::error::AppError;
use tracing::debug;

use crate::fragments::FragmentStore;

mod similarity;

pub use similarity::tokenize;
use similarity::SparseVector;

/// Source of fragments for a question.
///
/// Implementations must return at most `req.k` fragments, ordered by relevance, and only
/// fragments whose doc_type passes `req.allowed_doc_types`.
pub trait Retriever: Send + Sync {
    fn retrieve(&self, req: &RetrievalRequest) -> Result<Vec<Fragment>, AppError>;
}

/// In-memory TF-IDF ranking over a fixed fragment set.
#[derive(Debug, Clone)]
pub struct TfIdfRetriever {
    fragments: Vec<Fragment>,
    vectors: Vec<SparseVector>,
    idf: BTreeMap<String, f32>,
}

impl TfIdfRetriever {
    pub fn build(fragments: Vec<Fragment>) -> Self {
        let n = fragments.len() as f32;
        let docs: Vec<BTreeMap<String, u32>> = fragments
            .iter()
            .map(|f| similarity::term_counts(&tokenize(&f.text)))
            .collect();

        let mut df: BTreeMap<String, u32> = BTreeMap::new();
        for counts in &docs {
            for term in counts.keys() {
                *df.entry(term.clone()).or_insert(0) += 1;
            }
        }
        // Smoothed idf: ln((1 + n) / (1 + df)) + 1.
        let idf: BTreeMap<String, f32> = df
            .into_iter()
            .map(|(term, d)| (term, ((1.0 + n) / (1.0 + d as f32)).ln() + 1.0))
            .collect();

        let vectors = docs
            .iter()
            .map(|counts| weigh(counts, &idf))
            .collect();

        Self {
            fragments,
            vectors,
            idf,
        }
    }

    pub fn from_store(store: &FragmentStore) -> Result<Self, AppError> {
        Ok(Self::build(store.list_fragments(None)?))
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    fn query_vector(&self, question: &str) -> SparseVector {
        weigh(&similarity::term_counts(&tokenize(question)), &self.idf)
    }
}

fn weigh(counts: &BTreeMap<String, u32>, idf: &BTreeMap<String, f32>) -> SparseVector {
    let mut v = SparseVector::new();
    for (term, c) in counts {
        if let Some(w) = idf.get(term) {
            v.insert(term.clone(), *c as f32 * w);
        }
    }
    similarity::normalize(&mut v);
    v
}

impl Retriever for TfIdfRetriever {
    fn retrieve(&self, req: &RetrievalRequest) -> Result<Vec<Fragment>, AppError> {
        req.validate()?;

        let qv = self.query_vector(&req.question);
        if qv.is_empty() {
            debug!("query shares no terms with the corpus");
            return Ok(Vec::new());
        }

        let mut hits: Vec<(usize, f32)> = Vec::new();
        for (i, (fragment, v)) in self.fragments.iter().zip(self.vectors.iter()).enumerate() {
            if !req.allows_doc_type(&fragment.doc_type) {
                continue;
            }
            let score = similarity::dot(&qv, v);
            if score > 0.0 {
                hits.push((i, score));
            }
        }

        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(self.fragments[a.0].id.cmp(&self.fragments[b.0].id))
        });
        hits.truncate(req.k);

        for (i, score) in &hits {
            debug!(chunk_id = self.fragments[*i].id, score, "retrieval hit");
        }

        Ok(hits
            .into_iter()
            .map(|(i, _)| self.fragments[i].clone())
            .collect())
    }
}
