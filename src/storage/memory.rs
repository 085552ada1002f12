//! In-memory key-value backend
//!
//! Used by tests and for ephemeral sessions. An optional byte quota rejects
//! writes once the stored total would exceed it.

use std::collections::HashMap;
use std::sync::Mutex;
use tracing::warn;

use crate::error::{AppraiseError, Result};
use crate::storage::KeyValueBackend;

/// HashMap-backed storage with an optional total size limit
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes that would push keys plus values past `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|e| AppraiseError::Storage(format!("storage lock poisoned: {}", e)))
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.lock()?;

        if let Some(quota) = self.quota_bytes {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                warn!("Write to '{}' rejected: {} bytes exceeds quota of {}", key, needed, quota);
                return Err(AppraiseError::Storage(format!(
                    "quota exceeded writing '{}' ({} of {} bytes)",
                    key, needed, quota
                )));
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("k").unwrap(), None);

        backend.set("k", "v1").unwrap();
        backend.set("k", "v2").unwrap();
        assert_eq!(backend.get("k").unwrap().as_deref(), Some("v2"));
        assert!(backend.contains("k").unwrap());

        backend.remove("k").unwrap();
        backend.remove("k").unwrap();
        assert!(!backend.contains("k").unwrap());
    }

    #[test]
    fn test_quota_rejects_and_keeps_previous_value() {
        let backend = MemoryBackend::with_quota(16);
        backend.set("k", "small").unwrap();

        let err = backend.set("k", "this value is far too large").unwrap_err();
        assert!(matches!(err, AppraiseError::Storage(_)));
        assert_eq!(backend.get("k").unwrap().as_deref(), Some("small"));

        // Replacing a value only counts the new size
        backend.set("k", "0123456789abcde").unwrap();
    }
}
