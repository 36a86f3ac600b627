use chrono::{DateTime, Utc};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

const PARTITION: &str = "download_tasks";

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("task record malformed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("task status changed concurrently: {0}")]
    WriteConflict(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// Download task lifecycle. `Done` and `DeletedInZoom` are terminal;
/// `InProgress` returns to `Pending` via staleness reclaim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
    DeletedInZoom,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::DeletedInZoom)
    }
}

/// A deferred recording-download job, one per meeting id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTask {
    pub task_id: Uuid,
    pub email: String,
    pub meeting_id: String,
    /// When the task becomes claimable; set to the meeting's end time
    pub execute_time: DateTime<Utc>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Fjall-backed download-task queue, keyed by meeting id.
///
/// All mutations run under the internal lock and re-check the expected
/// prior state before writing, so claims and status transitions behave as
/// atomic filtered updates rather than read-then-write. Staleness reclaim
/// is the liveness guarantee for claims that never complete; nothing here
/// is a distributed lock.
pub struct TaskStore {
    keyspace: Keyspace,
    tasks: PartitionHandle,
    write_lock: Mutex<()>,
}

impl TaskStore {
    pub fn open(keyspace: &Keyspace) -> Result<Self> {
        let tasks = keyspace.open_partition(PARTITION, PartitionCreateOptions::default())?;
        Ok(Self {
            keyspace: keyspace.clone(),
            tasks,
            write_lock: Mutex::new(()),
        })
    }

    /// Flush all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Insert a pending task. Re-enqueueing a meeting replaces its record.
    pub fn enqueue(
        &self,
        email: &str,
        meeting_id: &str,
        execute_time: DateTime<Utc>,
    ) -> Result<DownloadTask> {
        let _guard = self.write_lock.lock().unwrap();
        let task = DownloadTask {
            task_id: Uuid::now_v7(),
            email: email.to_string(),
            meeting_id: meeting_id.to_string(),
            execute_time,
            status: TaskStatus::Pending,
            last_updated: None,
        };
        let value = serde_json::to_vec(&task)?;
        self.tasks.insert(meeting_id.as_bytes(), value)?;
        info!(meeting_id, email, %execute_time, "Download task enqueued");
        Ok(task)
    }

    /// Cancellation is deletion: the worker re-validates existence at
    /// claim time, so no separate signal is needed.
    pub fn cancel(&self, meeting_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().unwrap();
        let existed = self.tasks.get(meeting_id.as_bytes())?.is_some();
        if existed {
            self.tasks.remove(meeting_id.as_bytes())?;
            info!(meeting_id, "Download task cancelled");
        }
        Ok(existed)
    }

    pub fn get(&self, meeting_id: &str) -> Result<Option<DownloadTask>> {
        match self.tasks.get(meeting_id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Atomically claim every pending task whose execute time has passed:
    /// each claimed task is flipped to in-progress with `last_updated =
    /// now` before it is returned, so no two callers ever receive the
    /// same task.
    pub fn claim_due(&self, now: DateTime<Utc>) -> Result<Vec<DownloadTask>> {
        let _guard = self.write_lock.lock().unwrap();

        // Scan first, write after: the iterator must not observe its own
        // writes. The lock spans both halves, so the flip stays atomic.
        let mut due = Vec::new();
        for item in self.tasks.iter() {
            let (_key, value) = item?;
            let task: DownloadTask = serde_json::from_slice(&value)?;
            if task.status == TaskStatus::Pending && task.execute_time <= now {
                due.push(task);
            }
        }

        let mut claimed = Vec::with_capacity(due.len());
        for mut task in due {
            task.status = TaskStatus::InProgress;
            task.last_updated = Some(now);
            self.tasks
                .insert(task.meeting_id.as_bytes(), serde_json::to_vec(&task)?)?;
            debug!(meeting_id = %task.meeting_id, "Task claimed");
            claimed.push(task);
        }

        Ok(claimed)
    }

    /// Hand back tasks stuck in-progress past the staleness window,
    /// clearing `last_updated`. Recovers from a worker that crashed
    /// mid-task; a best-effort heuristic, not proof of ownership.
    pub fn reclaim_stale(&self, now: DateTime<Utc>, stale_after: Duration) -> Result<u32> {
        let _guard = self.write_lock.lock().unwrap();
        let threshold = now
            - chrono::Duration::from_std(stale_after).unwrap_or_else(|_| chrono::Duration::zero());

        let mut stale = Vec::new();
        for item in self.tasks.iter() {
            let (_key, value) = item?;
            let task: DownloadTask = serde_json::from_slice(&value)?;
            let past_window = task
                .last_updated
                .is_some_and(|last_updated| last_updated <= threshold);
            if task.status == TaskStatus::InProgress && past_window {
                stale.push(task);
            }
        }

        let reclaimed = stale.len() as u32;
        for mut task in stale {
            task.status = TaskStatus::Pending;
            task.last_updated = None;
            self.tasks
                .insert(task.meeting_id.as_bytes(), serde_json::to_vec(&task)?)?;
            info!(meeting_id = %task.meeting_id, "Stale task reset to pending");
        }

        Ok(reclaimed)
    }

    /// Unconditional status write, used by the pipeline for terminal
    /// transitions. Returns whether a record was updated; a vanished task
    /// (cancelled meeting) is not an error.
    pub fn set_status(&self, meeting_id: &str, status: TaskStatus) -> Result<bool> {
        let _guard = self.write_lock.lock().unwrap();
        let Some(bytes) = self.tasks.get(meeting_id.as_bytes())? else {
            debug!(meeting_id, ?status, "No task record to update");
            return Ok(false);
        };
        let mut task: DownloadTask = serde_json::from_slice(&bytes)?;
        task.status = status;
        self.tasks
            .insert(meeting_id.as_bytes(), serde_json::to_vec(&task)?)?;
        info!(meeting_id, ?status, "Task status updated");
        Ok(true)
    }

    /// Compare-and-set status transition. A filter mismatch surfaces as
    /// `WriteConflict` so lost updates are never silent.
    pub fn update_status_if(
        &self,
        meeting_id: &str,
        expected: TaskStatus,
        new: TaskStatus,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        let Some(bytes) = self.tasks.get(meeting_id.as_bytes())? else {
            return Err(QueueError::TaskNotFound(meeting_id.to_string()));
        };
        let mut task: DownloadTask = serde_json::from_slice(&bytes)?;
        if task.status != expected {
            return Err(QueueError::WriteConflict(meeting_id.to_string()));
        }
        task.status = new;
        self.tasks
            .insert(meeting_id.as_bytes(), serde_json::to_vec(&task)?)?;
        Ok(())
    }
}
