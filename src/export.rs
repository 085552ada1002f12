//! JSON export of committed records
//!
//! Read-only: exporters take records from [`RecordStore::list_all`] and
//! never write back. Each exported record includes its derived `scores`.
//!
//! [`RecordStore::list_all`]: crate::records::RecordStore::list_all

use chrono::{DateTime, NaiveDate, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{AppraiseError, Result};
use crate::types::{Assessment, ScoredAssessment};

/// Replace whitespace runs with `_` for use in file names
fn file_token(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Pretty JSON of one record
pub fn record_json(record: &Assessment) -> Result<String> {
    Ok(serde_json::to_string_pretty(&record.with_scores())?)
}

/// Pretty JSON array of all records; an empty list is refused
pub fn all_records_json(records: &[Assessment]) -> Result<String> {
    if records.is_empty() {
        return Err(AppraiseError::NothingToExport);
    }
    let scored: Vec<ScoredAssessment<'_>> = records.iter().map(Assessment::with_scores).collect();
    Ok(serde_json::to_string_pretty(&scored)?)
}

/// `interview_<name>_<id>.json`
pub fn record_file_name(record: &Assessment) -> String {
    let id = record
        .id
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "draft".to_string());
    format!("interview_{}_{}.json", file_token(&record.canonical_name()), id)
}

/// `all_interviews_<YYYY-MM-DD>.json`
pub fn all_records_file_name(date: NaiveDate) -> String {
    format!("all_interviews_{}.json", date.format("%Y-%m-%d"))
}

/// `assessment_<name>_<epoch ms>.json`, the copy written on submit
pub fn submission_file_name(record: &Assessment, at: DateTime<Utc>) -> String {
    format!(
        "assessment_{}_{}.json",
        file_token(&record.canonical_name()),
        at.timestamp_millis()
    )
}

/// Write one record into `dir`, returning the file path
pub fn write_record(dir: &Path, record: &Assessment) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(record_file_name(record));
    std::fs::write(&path, record_json(record)?)?;
    info!("Exported interview to {}", path.display());
    Ok(path)
}

/// Write every record as one array into `dir`
pub fn write_all_records(dir: &Path, records: &[Assessment], date: NaiveDate) -> Result<PathBuf> {
    let json = all_records_json(records)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(all_records_file_name(date));
    std::fs::write(&path, json)?;
    info!("Exported {} interviews to {}", records.len(), path.display());
    Ok(path)
}
