use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use dqa_core::domain::Fragment;
use dqa_core::error::AppError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::chunking::{chunk_text_by_paragraphs, MAX_FRAGMENT_CHARS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddDocumentInput {
    pub source: String,
    pub doc_type: String,
    pub year: i32,
    pub text: String,
    pub ingested_at: String,
}

/// Registry record for one ingested document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FragmentDocument {
    pub source: String,
    pub doc_type: String,
    pub year: i32,
    pub text_sha256: String,
    pub fragment_ids: Vec<u32>,
    pub ingested_at: String, // RFC3339
}

/// File-backed fragment corpus.
///
/// Layout under `root`:
/// - `fragments.json`: every fragment, ascending by id
/// - `documents.json`: one registry record per source document, ascending by source
#[derive(Debug, Clone)]
pub struct FragmentStore {
    root: PathBuf,
}

impl FragmentStore {
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    fn fragments_path(&self) -> PathBuf {
        self.root.join("fragments.json")
    }

    fn documents_path(&self) -> PathBuf {
        self.root.join("documents.json")
    }

    pub fn ensure_dirs(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.root.as_path()).map_err(|e| {
            AppError::new(
                "AI_FRAGMENT_STORE_FAILED",
                "Failed to create fragment store directory",
            )
            .with_details(format!("path={}; err={}", self.root.display(), e))
        })
    }

    fn read_fragments(&self) -> Result<Vec<Fragment>, AppError> {
        read_json_or_default(&self.fragments_path(), "fragments")
    }

    fn read_documents(&self) -> Result<Vec<FragmentDocument>, AppError> {
        read_json_or_default(&self.documents_path(), "documents")
    }

    pub fn add_document(&self, input: AddDocumentInput) -> Result<FragmentDocument, AppError> {
        self.ensure_dirs()?;

        let source = input.source.trim();
        let doc_type = input.doc_type.trim();
        if source.is_empty() {
            return Err(AppError::new(
                "AI_FRAGMENT_SOURCE_INVALID",
                "Document source name is required",
            ));
        }
        if doc_type.is_empty() {
            return Err(AppError::new(
                "AI_FRAGMENT_SOURCE_INVALID",
                "Document doc_type is required",
            )
            .with_details(format!("source={source}")));
        }

        let text = normalize_text(&input.text);
        let bodies = chunk_text_by_paragraphs(&text, MAX_FRAGMENT_CHARS);
        if bodies.is_empty() {
            return Err(AppError::new(
                "AI_FRAGMENT_SOURCE_INVALID",
                "Document text is empty",
            )
            .with_details(format!("source={source}")));
        }

        // Hash the chunked content so whitespace-only edits do not count as a change.
        let text_sha256 = sha256_hex(bodies.join("\n\n").as_bytes());
        let mut documents = self.read_documents()?;
        if let Some(existing) = documents.iter().find(|d| d.source == source) {
            if existing.text_sha256 == text_sha256
                && existing.doc_type == doc_type
                && existing.year == input.year
            {
                debug!(source, "document unchanged; skipping re-ingest");
                return Ok(existing.clone());
            }
        }

        // Re-ingesting a source replaces its fragments. Ids are never reused.
        let mut fragments = self.read_fragments()?;
        let mut next_id = match fragments.iter().map(|f| f.id).max() {
            Some(max) => max.checked_add(1),
            None => Some(0),
        };
        fragments.retain(|f| f.source != source);

        let mut fragment_ids = Vec::with_capacity(bodies.len());
        for body in bodies {
            let id = next_id.ok_or_else(|| {
                AppError::new("AI_FRAGMENT_STORE_FAILED", "Fragment id space exhausted")
                    .with_details(format!("source={source}; max_id={}", u32::MAX))
            })?;
            fragments.push(Fragment {
                id,
                source: source.to_string(),
                doc_type: doc_type.to_string(),
                year: input.year,
                text: body,
            });
            fragment_ids.push(id);
            next_id = id.checked_add(1);
        }
        fragments.sort_by_key(|f| f.id);

        let doc = FragmentDocument {
            source: source.to_string(),
            doc_type: doc_type.to_string(),
            year: input.year,
            text_sha256,
            fragment_ids,
            ingested_at: input.ingested_at,
        };
        documents.retain(|d| d.source != source);
        documents.push(doc.clone());
        documents.sort_by(|a, b| a.source.cmp(&b.source));

        // Stage both files before replacing either so a failed write leaves the store untouched.
        let fragments_tmp = stage_json(&self.fragments_path(), &fragments, "fragments")?;
        let documents_tmp = match stage_json(&self.documents_path(), &documents, "documents") {
            Ok(tmp) => tmp,
            Err(e) => {
                let _ = fs::remove_file(&fragments_tmp);
                return Err(e);
            }
        };
        commit_json(&fragments_tmp, &self.fragments_path(), "fragments")?;
        commit_json(&documents_tmp, &self.documents_path(), "documents")?;

        info!(
            source,
            doc_type,
            year = doc.year,
            fragments = doc.fragment_ids.len(),
            "document ingested"
        );
        Ok(doc)
    }

    pub fn list_documents(&self) -> Result<Vec<FragmentDocument>, AppError> {
        self.read_documents()
    }

    /// All fragments ascending by id, optionally restricted to a set of doc types.
    pub fn list_fragments(
        &self,
        doc_types: Option<&BTreeSet<String>>,
    ) -> Result<Vec<Fragment>, AppError> {
        let mut fragments = self.read_fragments()?;
        if let Some(allowed) = doc_types {
            fragments.retain(|f| allowed.contains(&f.doc_type));
        }
        fragments.sort_by_key(|f| f.id);
        Ok(fragments)
    }

    pub fn get_fragment(&self, id: u32) -> Result<Fragment, AppError> {
        self.read_fragments()?
            .into_iter()
            .find(|f| f.id == id)
            .ok_or_else(|| {
                AppError::new("AI_FRAGMENT_NOT_FOUND", "Fragment not found")
                    .with_details(format!("id={id}"))
            })
    }

    pub fn fragment_ids(&self) -> Result<BTreeSet<u32>, AppError> {
        Ok(self.read_fragments()?.into_iter().map(|f| f.id).collect())
    }
}

pub(crate) fn normalize_text(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

fn read_json_or_default<T: DeserializeOwned + Default>(
    path: &Path,
    what: &str,
) -> Result<T, AppError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let bytes = fs::read(path).map_err(|e| {
        AppError::new("AI_FRAGMENT_STORE_FAILED", format!("Failed to read {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new("AI_FRAGMENT_STORE_FAILED", format!("Failed to decode {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

/// Write `value` next to `path` as `<name>.tmp`; [`commit_json`] moves it into place.
fn stage_json<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    what: &str,
) -> Result<PathBuf, AppError> {
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new("AI_FRAGMENT_STORE_FAILED", format!("Failed to encode {what}"))
            .with_details(e.to_string())
    })?;
    fs::write(&tmp, json.as_bytes()).map_err(|e| {
        AppError::new("AI_FRAGMENT_STORE_FAILED", format!("Failed to write {what}"))
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    Ok(tmp)
}

fn commit_json(tmp: &Path, path: &Path, what: &str) -> Result<(), AppError> {
    fs::rename(tmp, path).map_err(|e| {
        AppError::new(
            "AI_FRAGMENT_STORE_FAILED",
            format!("Failed to finalize {what} write"),
        )
        .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), path.display(), e))
    })
}
