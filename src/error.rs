//! Error types for Appraise
//!
//! This module provides structured error definitions using thiserror. The
//! library distinguishes three families that callers treat differently:
//! validation failures (user-fixable, never persisted), parse failures
//! (corrupt stored data, recovered as an empty collection) and storage
//! failures (the backend rejected a write, surfaced and not retried).

use thiserror::Error;

/// Reasons an assessment fails the submit gate
///
/// Variants are listed in the order the validator checks them; only the
/// first failure is reported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Applicant name is required")]
    MissingApplicantName,

    #[error("Interview date is required")]
    MissingDate,

    #[error("Interviewer name is required")]
    MissingInterviewer,

    /// Named checklist item that is not confirmed
    #[error("Spiritual checklist item not confirmed: {0}")]
    ChecklistIncomplete(&'static str),

    #[error("Ethics response is required")]
    MissingEthicsResponse,

    #[error("A recommendation must be selected")]
    MissingRecommendation,
}

/// Main error type for Appraise operations
#[derive(Error, Debug)]
pub enum AppraiseError {
    /// Assessment failed the submit gate
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Persisted value under a key is not valid JSON for its schema
    #[error("Corrupt data under '{key}': {message}")]
    Parse { key: String, message: String },

    /// Backend rejected a read or write (quota exceeded, access blocked)
    #[error("Storage error: {0}")]
    Storage(String),

    /// A record with this id already exists
    #[error("Duplicate record id: {0}")]
    DuplicateId(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Export requested on an empty store
    #[error("No interviews to export")]
    NothingToExport,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl AppraiseError {
    /// Whether the error is something the user can fix by editing the form
    pub fn is_user_fixable(&self) -> bool {
        matches!(self, AppraiseError::Validation(_))
    }
}

/// Result type alias for Appraise operations
pub type Result<T> = std::result::Result<T, AppraiseError>;

impl From<rusqlite::Error> for AppraiseError {
    fn from(err: rusqlite::Error) -> Self {
        AppraiseError::Storage(err.to_string())
    }
}
