//! Perpetual queue loops
//!
//! One single-threaded loop per queue, each sleeping a fixed interval
//! between scans. The interval trades claim latency for operational
//! simplicity; there is no wait/notify. Loop bodies catch everything at
//! the iteration boundary: one bad task or a store hiccup is logged and
//! the loop resumes on schedule.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::observability::Metrics;

use super::dispatch::{Dispatcher, NotificationSender};
use super::notify::NotificationStore;
use super::store::{QueueError, TaskStore};

/// Scans the download-task queue: reclaims stale claims, then claims due
/// tasks and hands each to the worker endpoint fire-and-forget.
pub struct DownloadQueueWorker {
    tasks: Arc<TaskStore>,
    dispatcher: Arc<dyn Dispatcher>,
    clock: Arc<dyn Clock>,
    scan_interval: Duration,
    stale_after: Duration,
    metrics: Arc<Metrics>,
}

impl DownloadQueueWorker {
    pub fn new(
        tasks: Arc<TaskStore>,
        dispatcher: Arc<dyn Dispatcher>,
        clock: Arc<dyn Clock>,
        scan_interval: Duration,
        stale_after: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            tasks,
            dispatcher,
            clock,
            scan_interval,
            stale_after,
            metrics,
        }
    }

    pub async fn run(self) {
        info!(
            scan_interval_secs = self.scan_interval.as_secs(),
            stale_after_secs = self.stale_after.as_secs(),
            "Download queue loop started"
        );
        loop {
            if let Err(e) = self.tick().await {
                error!(error = %e, "Download queue scan failed, will retry on schedule");
            }
            self.clock.sleep(self.scan_interval).await;
        }
    }

    /// One scan. Public so tests can drive the loop body directly.
    pub async fn tick(&self) -> Result<(), QueueError> {
        let now = self.clock.now();

        let reclaimed = self.tasks.reclaim_stale(now, self.stale_after)?;
        for _ in 0..reclaimed {
            self.metrics.task_reclaimed();
        }

        let claimed = self.tasks.claim_due(now)?;
        for task in claimed {
            self.metrics.task_claimed();
            info!(
                meeting_id = %task.meeting_id,
                email = %task.email,
                execute_time = %task.execute_time,
                "Dispatching claimed task"
            );
            // Fire-and-forget: the pipeline writes terminal states to the
            // task record itself. A failed dispatch leaves the task
            // in-progress for staleness reclaim to hand back.
            if let Err(e) = self.dispatcher.dispatch(&task.email, &task.meeting_id).await {
                warn!(meeting_id = %task.meeting_id, error = %e, "Dispatch failed");
            }
        }

        Ok(())
    }
}

/// Scans the notification queue and delivers one batched call per scan.
/// A separate error sweep retries failed batches on its own cadence so
/// failures do not starve new deliveries.
pub struct NotificationWorker {
    store: Arc<NotificationStore>,
    sender: Arc<dyn NotificationSender>,
    clock: Arc<dyn Clock>,
    scan_interval: Duration,
    error_retry_interval: Duration,
    metrics: Arc<Metrics>,
}

impl NotificationWorker {
    pub fn new(
        store: Arc<NotificationStore>,
        sender: Arc<dyn NotificationSender>,
        clock: Arc<dyn Clock>,
        scan_interval: Duration,
        error_retry_interval: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            sender,
            clock,
            scan_interval,
            error_retry_interval,
            metrics,
        }
    }

    pub async fn run_main(self: Arc<Self>) {
        info!(
            scan_interval_secs = self.scan_interval.as_secs(),
            "Notification loop started"
        );
        loop {
            if let Err(e) = self.tick().await {
                error!(error = %e, "Notification scan failed, will retry on schedule");
            }
            self.clock.sleep(self.scan_interval).await;
        }
    }

    pub async fn run_error_sweep(self: Arc<Self>) {
        info!(
            retry_interval_secs = self.error_retry_interval.as_secs(),
            "Notification error sweep started"
        );
        loop {
            if let Err(e) = self.error_tick().await {
                error!(error = %e, "Notification error sweep failed, will retry on schedule");
            }
            self.clock.sleep(self.error_retry_interval).await;
        }
    }

    /// One main-loop scan: claim everything pending, deliver as one batch.
    pub async fn tick(&self) -> Result<(), QueueError> {
        let now = self.clock.now();
        let batch = self.store.claim_pending(now)?;
        if batch.is_empty() {
            debug!("No notifications to deliver");
            return Ok(());
        }

        info!(count = batch.len(), "Delivering notification batch");
        match self.sender.send(&batch).await {
            Ok(()) => {
                // Delivery confirmed: the records were the notification
                self.store.delete_batch(&batch)?;
                self.metrics.notifications_sent(batch.len() as u64);
            }
            Err(e) => {
                warn!(count = batch.len(), error = %e, "Notification batch failed");
                self.store.mark_error(&batch, now)?;
                self.metrics.notifications_failed(batch.len() as u64);
            }
        }

        Ok(())
    }

    /// One error-sweep pass: re-attempt every failed id as a new batch.
    /// Failed-again tasks simply stay in error state for the next pass.
    pub async fn error_tick(&self) -> Result<(), QueueError> {
        let batch = self.store.error_batch()?;
        if batch.is_empty() {
            debug!("No failed notifications to retry");
            return Ok(());
        }

        info!(count = batch.len(), "Retrying failed notification batch");
        match self.sender.send(&batch).await {
            Ok(()) => {
                self.store.delete_batch(&batch)?;
                self.metrics.notifications_sent(batch.len() as u64);
            }
            Err(e) => {
                warn!(count = batch.len(), error = %e, "Notification retry failed");
                self.metrics.notifications_failed(batch.len() as u64);
            }
        }

        Ok(())
    }
}
