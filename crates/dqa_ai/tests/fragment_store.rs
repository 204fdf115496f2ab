use std::collections::BTreeSet;

use dqa_ai::fragments::{AddDocumentInput, FragmentStore};
use dqa_core::domain::Fragment;
use dqa_core::error::AppError;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn input(source: &str, doc_type: &str, year: i32, text: &str) -> AddDocumentInput {
    AddDocumentInput {
        source: source.to_string(),
        doc_type: doc_type.to_string(),
        year,
        text: text.to_string(),
        ingested_at: "2026-10-01T00:00:00Z".to_string(),
    }
}

#[test]
fn ingest_assigns_sequential_ids_across_documents() {
    let dir = tempdir().unwrap();
    let store = FragmentStore::open(dir.path().join("corpus"));

    let big_a = "a".repeat(1000);
    let big_b = "b".repeat(1000);
    let esg = store
        .add_document(input("esg.txt", "esg", 2024, &format!("{big_a}\n\n{big_b}")))
        .unwrap();
    assert_eq!(esg.fragment_ids, vec![0, 1]);

    let fin = store
        .add_document(input("fin.txt", "financial", 2023, "Revenue: 25.4 € bn"))
        .unwrap();
    assert_eq!(fin.fragment_ids, vec![2]);

    let all = store.list_fragments(None).unwrap();
    assert_eq!(all.iter().map(|f| f.id).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(all[0].text, big_a);
    assert_eq!(all[2].year, 2023);

    let docs = store.list_documents().unwrap();
    assert_eq!(
        docs.iter().map(|d| d.source.as_str()).collect::<Vec<_>>(),
        vec!["esg.txt", "fin.txt"]
    );
}

#[test]
fn reingesting_same_content_is_a_no_op() {
    let dir = tempdir().unwrap();
    let store = FragmentStore::open(dir.path().to_path_buf());
    let first = store
        .add_document(input("esg.txt", "esg", 2024, "Scope 1: 116,092 tCO2e"))
        .unwrap();
    let second = store
        .add_document(AddDocumentInput {
            ingested_at: "2026-10-02T00:00:00Z".to_string(),
            ..input("esg.txt", "esg", 2024, "Scope 1: 116,092 tCO2e\r\n")
        })
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(store.fragment_ids().unwrap(), BTreeSet::from([0]));
}

#[test]
fn reingesting_changed_content_replaces_fragments_with_fresh_ids() {
    let dir = tempdir().unwrap();
    let store = FragmentStore::open(dir.path().to_path_buf());
    store
        .add_document(input("esg.txt", "esg", 2024, "Scope 1: 116,092 tCO2e"))
        .unwrap();
    store
        .add_document(input("fin.txt", "financial", 2024, "EBITDA: n/a"))
        .unwrap();

    let updated = store
        .add_document(input("esg.txt", "esg", 2024, "Scope 1: 116,100 tCO2e"))
        .unwrap();
    assert_eq!(updated.fragment_ids, vec![2]);
    assert_eq!(store.fragment_ids().unwrap(), BTreeSet::from([1, 2]));

    let err = store.get_fragment(0).unwrap_err();
    assert_eq!(err.code, "AI_FRAGMENT_NOT_FOUND");
    assert_eq!(store.get_fragment(2).unwrap().text, "Scope 1: 116,100 tCO2e");
}

#[test]
fn list_fragments_filters_by_doc_type() {
    let dir = tempdir().unwrap();
    let store = FragmentStore::open(dir.path().to_path_buf());
    store.add_document(input("esg.txt", "esg", 2024, "one")).unwrap();
    store.add_document(input("fin.txt", "financial", 2024, "two")).unwrap();

    let allowed = BTreeSet::from(["financial".to_string()]);
    let only_fin = store.list_fragments(Some(&allowed)).unwrap();
    assert_eq!(only_fin.len(), 1);
    assert_eq!(only_fin[0].source, "fin.txt");
}

#[test]
fn rejects_invalid_documents() {
    let dir = tempdir().unwrap();
    let store = FragmentStore::open(dir.path().to_path_buf());

    let cases = [
        input(" ", "esg", 2024, "text"),
        input("esg.txt", "", 2024, "text"),
        input("esg.txt", "esg", 2024, "\n\n  \n"),
    ];
    for case in cases {
        let err: AppError = store.add_document(case).unwrap_err();
        assert_eq!(err.code, "AI_FRAGMENT_SOURCE_INVALID");
    }
    assert!(store.list_fragments(None).unwrap().is_empty());
}

#[test]
fn corrupt_store_file_is_reported() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("fragments.json"), "{not json").unwrap();
    let store = FragmentStore::open(dir.path().to_path_buf());
    let err = store.list_fragments(None).unwrap_err();
    assert_eq!(err.code, "AI_FRAGMENT_STORE_FAILED");
}

#[test]
fn failed_registry_write_leaves_fragments_untouched() {
    let dir = tempdir().unwrap();
    let store = FragmentStore::open(dir.path().to_path_buf());
    store
        .add_document(input("esg.txt", "esg", 2024, "Scope 1: 116,092 tCO2e"))
        .unwrap();
    let fragments_before = store.list_fragments(None).unwrap();
    let documents_before = store.list_documents().unwrap();

    // A directory where the registry's temp file belongs makes staging it fail.
    std::fs::create_dir(dir.path().join("documents.tmp")).unwrap();
    let err = store
        .add_document(input("fin.txt", "financial", 2024, "Revenue: 25.4 € bn"))
        .unwrap_err();
    assert_eq!(err.code, "AI_FRAGMENT_STORE_FAILED");

    assert_eq!(store.list_fragments(None).unwrap(), fragments_before);
    assert_eq!(store.list_documents().unwrap(), documents_before);
    assert!(!dir.path().join("fragments.tmp").exists());
}

fn seed_fragment(dir: &std::path::Path, id: u32) {
    let seeded = vec![Fragment {
        id,
        source: "seed.txt".to_string(),
        doc_type: "other".to_string(),
        year: 2020,
        text: "seed".to_string(),
    }];
    std::fs::write(
        dir.join("fragments.json"),
        serde_json::to_string(&seeded).unwrap(),
    )
    .unwrap();
}

#[test]
fn last_fragment_id_is_usable() {
    let dir = tempdir().unwrap();
    seed_fragment(dir.path(), u32::MAX - 1);
    let store = FragmentStore::open(dir.path().to_path_buf());

    let doc = store
        .add_document(input("esg.txt", "esg", 2024, "Scope 1: 116,092 tCO2e"))
        .unwrap();
    assert_eq!(doc.fragment_ids, vec![u32::MAX]);
}

#[test]
fn exhausted_id_space_is_an_error() {
    let dir = tempdir().unwrap();
    seed_fragment(dir.path(), u32::MAX);
    let store = FragmentStore::open(dir.path().to_path_buf());

    let err = store
        .add_document(input("esg.txt", "esg", 2024, "Scope 1: 116,092 tCO2e"))
        .unwrap_err();
    assert_eq!(err.code, "AI_FRAGMENT_STORE_FAILED");
    assert_eq!(store.fragment_ids().unwrap(), BTreeSet::from([u32::MAX]));
}
