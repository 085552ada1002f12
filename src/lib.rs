//! Appraise - Interview Assessment Records
//!
//! Capture, score and review structured interview assessments:
//! - Form input normalized into assessments with derived scores
//! - Fail-fast validation before a record is committed
//! - Durable record collection and a single-slot draft with debounced autosave
//! - Admin dashboard with filtering, sorting and statistics
//!
//! # Architecture
//!
//! - **Types**: Core data structures (Assessment, RatingGroup, Recommendation, etc.)
//! - **Storage**: Key-value backends (in-memory, SQLite)
//! - **Records / Draft**: Stores layered over a backend key
//! - **Dashboard / Export**: Read-only projections of the records
//!
//! # Example
//!
//! ```ignore
//! use appraise_core::{assessment, DraftStore, FormInput, RecordStore, SqliteBackend};
//! use std::sync::Arc;
//!
//! fn main() -> appraise_core::Result<()> {
//!     let backend = Arc::new(SqliteBackend::open("appraise.db".as_ref())?);
//!     let records = RecordStore::new(backend.clone());
//!     let drafts = DraftStore::new(backend);
//!
//!     let input: FormInput = serde_json::from_str(&std::fs::read_to_string("form.json")?)?;
//!     let saved = assessment::submit(&input, &records, &drafts)?;
//!     println!("Saved {} with total {}", saved.canonical_name(), saved.scores().total);
//!
//!     Ok(())
//! }
//! ```

pub mod assessment;
pub mod config;
pub mod dashboard;
pub mod draft;
pub mod error;
pub mod export;
pub mod records;
pub mod schedule;
pub mod scoring;
pub mod session;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use assessment::FormInput;
pub use config::AppraiseConfig;
pub use dashboard::{Dashboard, DashboardView};
pub use draft::{Autosaver, DraftStore};
pub use error::{AppraiseError, Result, ValidationError};
pub use records::{RecordFilter, RecordStore, SortOrder, Statistics};
pub use session::SessionStore;
pub use storage::{KeyValueBackend, MemoryBackend, SqliteBackend};
pub use types::{
    ApplicantName, Assessment, BasicInfo, FinalDecision, InterviewId, RatingGroup,
    Recommendation, Scores, SpiritualChecklist,
};
