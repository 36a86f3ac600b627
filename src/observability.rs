//! Process-local counters for the queue and pipeline loops

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters
#[derive(Debug, Default)]
pub struct Metrics {
    tasks_enqueued: AtomicU64,
    tasks_claimed: AtomicU64,
    tasks_reclaimed: AtomicU64,
    tasks_completed: AtomicU64,
    poll_iterations: AtomicU64,
    recordings_downloaded: AtomicU64,
    notifications_sent: AtomicU64,
    notifications_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_enqueued(&self) {
        self.tasks_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_claimed(&self) {
        self.tasks_claimed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_reclaimed(&self) {
        self.tasks_reclaimed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn task_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn poll_iteration(&self) {
        self.poll_iterations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn recording_downloaded(&self) {
        self.recordings_downloaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn notifications_sent(&self, count: u64) {
        self.notifications_sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn notifications_failed(&self, count: u64) {
        self.notifications_failed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_enqueued: self.tasks_enqueued.load(Ordering::Relaxed),
            tasks_claimed: self.tasks_claimed.load(Ordering::Relaxed),
            tasks_reclaimed: self.tasks_reclaimed.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            poll_iterations: self.poll_iterations.load(Ordering::Relaxed),
            recordings_downloaded: self.recordings_downloaded.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub tasks_enqueued: u64,
    pub tasks_claimed: u64,
    pub tasks_reclaimed: u64,
    pub tasks_completed: u64,
    pub poll_iterations: u64,
    pub recordings_downloaded: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_increments() {
        let metrics = Metrics::new();
        metrics.task_enqueued();
        metrics.task_claimed();
        metrics.task_claimed();
        metrics.notifications_sent(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_enqueued, 1);
        assert_eq!(snapshot.tasks_claimed, 2);
        assert_eq!(snapshot.notifications_sent, 3);
        assert_eq!(snapshot.tasks_reclaimed, 0);
    }
}
