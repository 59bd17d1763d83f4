//! Time-based pruning of action records.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use actionlog_core::error::ActionLogError;

use crate::store::ActionRecordStore;

/// Records untouched for this many days are deleted.
pub const RETENTION_DAYS: i64 = 7;

/// Deletes action records older than the retention window.
#[derive(Debug, Clone, Copy)]
pub struct GarbageCollector {
    retention: Duration,
}

impl Default for GarbageCollector {
    fn default() -> Self {
        Self {
            retention: Duration::days(RETENTION_DAYS),
        }
    }
}

impl GarbageCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Delete every record whose `modified_at` is older than now minus the
    /// retention window. Returns the number of records removed.
    pub fn sweep(&self, store: &dyn ActionRecordStore) -> Result<usize, ActionLogError> {
        self.sweep_at(store, Utc::now())
    }

    /// `sweep` with an explicit notion of "now".
    pub fn sweep_at(
        &self,
        store: &dyn ActionRecordStore,
        now: DateTime<Utc>,
    ) -> Result<usize, ActionLogError> {
        let cutoff = now - self.retention;
        let deleted = store.delete_modified_before(cutoff)?;
        if deleted > 0 {
            info!(deleted, cutoff = %cutoff, "Pruned stale action records");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use actionlog_core::types::{ActionType, NodeId, StreamType};

    use crate::db::Database;
    use crate::dedup::DedupKey;
    use crate::repository::ActionRecordRepository;
    use crate::store::NewActionRecord;

    fn make_repo() -> ActionRecordRepository {
        ActionRecordRepository::new(Arc::new(Database::in_memory().unwrap()))
    }

    fn insert_aged(repo: &ActionRecordRepository, node_id: u64, age: Duration) {
        repo.insert(&NewActionRecord {
            key: DedupKey::new(&NodeId::from(node_id), "post", StreamType::Content),
            title: format!("Node {}", node_id),
            action_type: ActionType::Update,
            now: Utc::now() - age,
        })
        .unwrap();
    }

    #[test]
    fn test_sweep_boundary() {
        let repo = make_repo();
        insert_aged(&repo, 1, Duration::days(8));
        insert_aged(&repo, 2, Duration::days(6));

        let deleted = GarbageCollector::new().sweep(&repo).unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(repo.count().unwrap(), 1);

        let remaining = repo
            .find_by_key(&DedupKey::new(&NodeId::from(2u64), "post", StreamType::Content))
            .unwrap();
        assert!(remaining.is_some());
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let repo = make_repo();
        insert_aged(&repo, 1, Duration::days(30));

        let gc = GarbageCollector::new();
        assert_eq!(gc.sweep(&repo).unwrap(), 1);
        assert_eq!(gc.sweep(&repo).unwrap(), 0);
    }

    #[test]
    fn test_sweep_at_explicit_now() {
        let repo = make_repo();
        insert_aged(&repo, 1, Duration::days(1));

        let gc = GarbageCollector::new();
        assert_eq!(gc.sweep_at(&repo, Utc::now()).unwrap(), 0);
        let later = Utc::now() + Duration::days(7);
        assert_eq!(gc.sweep_at(&repo, later).unwrap(), 1);
    }

    #[test]
    fn test_default_retention() {
        assert_eq!(GarbageCollector::default().retention(), Duration::days(7));
    }
}
