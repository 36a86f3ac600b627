//! Game-night notification queue
//!
//! The queue record is the notification: delivered tasks are deleted, not
//! marked done. Failed batches are demoted to `error` and retried by a
//! sweep that runs on its own cadence.

use chrono::{DateTime, Utc};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{debug, info};

use super::store::Result;

const PARTITION: &str = "notifications";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyStatus {
    Pending,
    InProgress,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationTask {
    pub game_id: i64,
    pub status: NotifyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Fjall-backed notification queue, keyed by game id (big-endian i64 so
/// iteration order follows the id).
pub struct NotificationStore {
    keyspace: Keyspace,
    notifications: PartitionHandle,
    write_lock: Mutex<()>,
}

impl NotificationStore {
    pub fn open(keyspace: &Keyspace) -> Result<Self> {
        let notifications =
            keyspace.open_partition(PARTITION, PartitionCreateOptions::default())?;
        Ok(Self {
            keyspace: keyspace.clone(),
            notifications,
            write_lock: Mutex::new(()),
        })
    }

    /// Flush all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Register a pending notification (schedule ingestion writes these)
    pub fn insert(&self, game_id: i64) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        let task = NotificationTask {
            game_id,
            status: NotifyStatus::Pending,
            last_updated: None,
        };
        self.notifications
            .insert(game_id.to_be_bytes(), serde_json::to_vec(&task)?)?;
        debug!(game_id, "Notification queued");
        Ok(())
    }

    pub fn get(&self, game_id: i64) -> Result<Option<NotificationTask>> {
        match self.notifications.get(game_id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Claim everything not already in-progress or failed: the whole
    /// batch is marked in-progress in one locked pass and returned for a
    /// single batched delivery call.
    pub fn claim_pending(&self, now: DateTime<Utc>) -> Result<Vec<i64>> {
        let _guard = self.write_lock.lock().unwrap();

        // Scan first, write after: the iterator must not observe its own
        // writes. The lock spans both halves, so the claim stays atomic.
        let mut claimable = Vec::new();
        for item in self.notifications.iter() {
            let (_key, value) = item?;
            let task: NotificationTask = serde_json::from_slice(&value)?;
            if !matches!(task.status, NotifyStatus::InProgress | NotifyStatus::Error) {
                claimable.push(task);
            }
        }

        let mut batch = Vec::with_capacity(claimable.len());
        for mut task in claimable {
            task.status = NotifyStatus::InProgress;
            task.last_updated = Some(now);
            self.notifications
                .insert(task.game_id.to_be_bytes(), serde_json::to_vec(&task)?)?;
            batch.push(task.game_id);
        }

        Ok(batch)
    }

    /// Delivered notifications are deleted; the record itself was the
    /// notification.
    pub fn delete_batch(&self, game_ids: &[i64]) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        for game_id in game_ids {
            self.notifications.remove(game_id.to_be_bytes())?;
        }
        info!(count = game_ids.len(), "Delivered notifications removed");
        Ok(())
    }

    /// Demote a failed batch to error state for the recovery sweep
    pub fn mark_error(&self, game_ids: &[i64], now: DateTime<Utc>) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        for game_id in game_ids {
            let key = game_id.to_be_bytes();
            let Some(bytes) = self.notifications.get(key)? else {
                continue;
            };
            let mut task: NotificationTask = serde_json::from_slice(&bytes)?;
            task.status = NotifyStatus::Error;
            task.last_updated = Some(now);
            self.notifications.insert(key, serde_json::to_vec(&task)?)?;
        }
        info!(count = game_ids.len(), "Notifications marked error");
        Ok(())
    }

    /// Ids currently in error state, for the retry sweep
    pub fn error_batch(&self) -> Result<Vec<i64>> {
        let mut batch = Vec::new();
        for item in self.notifications.iter() {
            let (_key, value) = item?;
            let task: NotificationTask = serde_json::from_slice(&value)?;
            if task.status == NotifyStatus::Error {
                batch.push(task.game_id);
            }
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn open_store() -> (NotificationStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let keyspace = fjall::Config::new(temp_dir.path().join("store"))
            .open()
            .unwrap();
        (NotificationStore::open(&keyspace).unwrap(), temp_dir)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 18, 0, 0).unwrap()
    }

    #[test]
    fn claim_pending_skips_in_progress_and_error() {
        let (store, _temp) = open_store();
        store.insert(1).unwrap();
        store.insert(2).unwrap();
        store.insert(3).unwrap();

        let first = store.claim_pending(now()).unwrap();
        assert_eq!(first, vec![1, 2, 3]);

        // Everything is now in progress; a second scan claims nothing
        assert!(store.claim_pending(now()).unwrap().is_empty());

        store.mark_error(&[2], now()).unwrap();
        assert!(store.claim_pending(now()).unwrap().is_empty());
    }

    #[test]
    fn delete_batch_removes_records() {
        let (store, _temp) = open_store();
        store.insert(7).unwrap();
        store.insert(8).unwrap();

        store.delete_batch(&[7, 8]).unwrap();
        assert!(store.get(7).unwrap().is_none());
        assert!(store.get(8).unwrap().is_none());
    }

    #[test]
    fn error_batch_lists_only_failures() {
        let (store, _temp) = open_store();
        store.insert(1).unwrap();
        store.insert(2).unwrap();
        store.claim_pending(now()).unwrap();
        store.mark_error(&[1], now()).unwrap();

        assert_eq!(store.error_batch().unwrap(), vec![1]);
        assert_eq!(store.get(1).unwrap().unwrap().status, NotifyStatus::Error);
        assert_eq!(store.get(2).unwrap().unwrap().status, NotifyStatus::InProgress);
    }
}
