//! Common test utilities and helpers

#![allow(dead_code)]

use appraise_core::{
    DraftStore, FormInput, KeyValueBackend, MemoryBackend, RecordStore, SpiritualChecklist,
    SqliteBackend,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;

/// Ratings keyed `skill1..skill5`
pub fn ratings(values: [i64; 5]) -> BTreeMap<String, Value> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| (format!("skill{}", i + 1), json!(v)))
        .collect()
}

/// A form that passes validation
pub fn complete_form(name: &str, recommendation: &str) -> FormInput {
    FormInput {
        full_name: Some(name.to_string()),
        date: "2024-05-14".to_string(),
        interviewer: "Pastor Kim".to_string(),
        spiritual: SpiritualChecklist::all_confirmed(),
        administrative: ratings([8, 7, 9, 6, 10]),
        financial: ratings([5, 5, 5, 5, 5]),
        ethics_response: "I would report it to my supervisor.".to_string(),
        recommendation: recommendation.to_string(),
        ..Default::default()
    }
}

/// Record and draft stores over one shared in-memory backend
pub fn memory_stores() -> (Arc<MemoryBackend>, RecordStore, DraftStore) {
    let backend = Arc::new(MemoryBackend::new());
    let records = RecordStore::new(backend.clone());
    let drafts = DraftStore::new(backend.clone());
    (backend, records, drafts)
}

/// SQLite backend in a fresh temporary directory
///
/// Keep the returned `TempDir` alive for the duration of the test.
pub fn sqlite_backend() -> (TempDir, Arc<dyn KeyValueBackend>) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let backend = SqliteBackend::open(temp_dir.path().join("appraise.db"))
        .expect("Failed to open test database");
    (temp_dir, Arc::new(backend))
}
