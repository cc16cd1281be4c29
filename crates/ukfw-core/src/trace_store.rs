//! Trace persistence: Sled-backed, one JSON record per task id.
//!
//! Writes are keyed uniquely by task id, so concurrent tasks never contend on
//! a record. Persistence failures are the caller's to swallow; the pipeline
//! logs them and still returns the in-memory trace.

use crate::trace::ReasoningTrace;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceStoreError {
    #[error("trace store: {0}")]
    Db(#[from] sled::Error),
    #[error("trace encode/decode: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Durable trace archive keyed by task id.
pub struct TraceStore {
    db: sled::Db,
}

impl TraceStore {
    /// Open or create the trace database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TraceStoreError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Persist one trace under its task id.
    pub fn save(&self, trace: &ReasoningTrace) -> Result<(), TraceStoreError> {
        let payload = serde_json::to_vec(trace)?;
        self.db.insert(trace.task_id.as_bytes(), payload)?;
        self.db.flush()?;
        Ok(())
    }

    /// Load a persisted trace by task id.
    pub fn load(&self, task_id: &str) -> Result<Option<ReasoningTrace>, TraceStoreError> {
        match self.db.get(task_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All persisted task ids, in key order (for audit listings).
    pub fn task_ids(&self) -> Result<Vec<String>, TraceStoreError> {
        Ok(self
            .db
            .iter()
            .keys()
            .filter_map(|k| k.ok())
            .filter_map(|k| String::from_utf8(k.to_vec()).ok())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::QueryContext;
    use chrono::Utc;

    fn trace(task_id: &str) -> ReasoningTrace {
        ReasoningTrace::assemble(
            task_id.to_string(),
            Utc::now(),
            QueryContext {
                query: "q".to_string(),
                provision_id: None,
                provision_title: None,
            },
            Vec::new(),
            "done".to_string(),
            Vec::new(),
            Vec::new(),
        )
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TraceStore::open(dir.path()).unwrap();
        store.save(&trace("task_a")).unwrap();
        let back = store.load("task_a").unwrap().unwrap();
        assert_eq!(back.task_id, "task_a");
        assert_eq!(back.final_response_summary, "done");
        assert!(store.load("task_b").unwrap().is_none());
    }

    #[test]
    fn task_ids_lists_saved_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = TraceStore::open(dir.path()).unwrap();
        store.save(&trace("task_b")).unwrap();
        store.save(&trace("task_a")).unwrap();
        assert_eq!(store.task_ids().unwrap(), vec!["task_a", "task_b"]);
    }
}
