//! Storage layer for Appraise
//!
//! Everything persisted lives in a flat key-value space holding JSON text,
//! one value per key. Writes replace the whole value for a key in one step,
//! so a failed write leaves the previous value untouched.

pub mod memory;
pub mod sqlite;

use crate::error::Result;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// Default key holding the JSON array of committed records
pub const RECORDS_KEY: &str = "interviews";

/// Default key holding the single autosaved draft
pub const DRAFT_KEY: &str = "interviewDraft";

/// Synchronous key-value backend
///
/// String keys and string values. A write either fully succeeds or is
/// rejected with the previous value kept.
pub trait KeyValueBackend: Send + Sync {
    /// Read the value under `key`, if any
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value under `key`
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`; deleting a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;

    /// Whether `key` currently holds a value
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}
