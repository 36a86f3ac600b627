//! Recording discovery and download
//!
//! Walks every historical instance of a meeting, classifies each as
//! success / processing / deleted, probes artifact availability, and
//! downloads what is ready. Instances still processing are retried as a
//! whole batch on a short delay, up to a configurable ceiling.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::observability::Metrics;
use crate::provider::{MeetingProvider, ProviderError, RecordingFile};
use crate::queue::{QueueError, TaskStatus, TaskStore};
use crate::storage::{StorageClient, StorageError};

use super::store::{
    DownloadStatus, InstanceStatus, RecordingRecord, RecordingStore, RecordingStoreError,
};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Store(#[from] RecordingStoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("provider: {0}")]
    Provider(#[from] ProviderError),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// Whole-batch retry policy for instances whose recordings are not ready
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            retry_delay: Duration::from_secs(10),
        }
    }
}

/// Classification of one instance after a fetch pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceOutcome {
    /// Artifacts discovered and all available
    Success,
    /// Not ready yet; retried on the next pass
    Processing,
    /// Meeting deleted at the provider; terminal for the owning task
    Deleted,
}

/// Result of a full collection run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectOutcome {
    /// Every instance reached success or deleted
    Completed,
    /// Attempt ceiling reached with instances still processing. The task
    /// stays non-terminal; an operational alert case, not a crash.
    GaveUp,
}

pub struct RecordingFetcher {
    provider: Arc<dyn MeetingProvider>,
    clock: Arc<dyn Clock>,
    recordings: Arc<RecordingStore>,
    tasks: Arc<TaskStore>,
    storage: Arc<StorageClient>,
    policy: FetchPolicy,
    metrics: Arc<Metrics>,
}

impl RecordingFetcher {
    pub fn new(
        provider: Arc<dyn MeetingProvider>,
        clock: Arc<dyn Clock>,
        recordings: Arc<RecordingStore>,
        tasks: Arc<TaskStore>,
        storage: Arc<StorageClient>,
        policy: FetchPolicy,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            provider,
            clock,
            recordings,
            tasks,
            storage,
            policy,
            metrics,
        }
    }

    /// Fetch recordings for every instance of a meeting, retrying the
    /// not-yet-ready subset as a whole batch until done or the attempt
    /// ceiling is reached.
    pub async fn collect_all(&self, email: &str, meeting_id: &str) -> Result<CollectOutcome> {
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let instances = match self.provider.past_instances(email, meeting_id).await {
                Ok(instances) => instances,
                Err(e) => {
                    warn!(meeting_id, attempt = attempts, error = %e, "Past instances unavailable");
                    if attempts >= self.policy.max_attempts {
                        warn!(meeting_id, "Attempt ceiling reached without instance list");
                        return Ok(CollectOutcome::GaveUp);
                    }
                    self.clock.sleep(self.policy.retry_delay).await;
                    continue;
                }
            };

            let mut still_processing = 0usize;
            for instance in &instances {
                match self.fetch_instance(email, meeting_id, &instance.uuid).await? {
                    InstanceOutcome::Success => {
                        self.download_instance(email, meeting_id, &instance.uuid).await?;
                    }
                    InstanceOutcome::Processing => still_processing += 1,
                    InstanceOutcome::Deleted => {}
                }
            }

            if still_processing == 0 {
                info!(meeting_id, attempts, "All instances processed");
                return Ok(CollectOutcome::Completed);
            }

            if attempts >= self.policy.max_attempts {
                warn!(
                    meeting_id,
                    still_processing,
                    attempts,
                    "Giving up with instances still processing"
                );
                return Ok(CollectOutcome::GaveUp);
            }

            debug!(meeting_id, still_processing, attempts, "Retrying batch");
            self.clock.sleep(self.policy.retry_delay).await;
        }
    }

    /// Fetch and classify one instance, persisting what was learned.
    pub async fn fetch_instance(
        &self,
        email: &str,
        meeting_id: &str,
        uuid: &str,
    ) -> Result<InstanceOutcome> {
        match self.provider.instance_recordings(email, uuid).await {
            Ok(payload) => {
                let mut all_available = true;
                for file in &payload.recording_files {
                    if self.provider.probe(&file.download_url).await {
                        debug!(recording_id = %file.id, "Artifact available");
                    } else {
                        debug!(recording_id = %file.id, "Artifact still processing");
                        all_available = false;
                    }
                }

                let status = if all_available {
                    InstanceStatus::Success
                } else {
                    InstanceStatus::Processing
                };

                self.recordings
                    .upsert_instance(meeting_id, &payload.uuid, status, &payload.topic)?;
                for file in &payload.recording_files {
                    self.recordings
                        .insert_recording_if_absent(&to_record(&payload.uuid, file))?;
                }

                Ok(match status {
                    InstanceStatus::Success => InstanceOutcome::Success,
                    _ => InstanceOutcome::Processing,
                })
            }
            Err(ProviderError::MeetingDeleted(message)) => {
                warn!(meeting_id, uuid, message, "Meeting deleted at provider");
                self.recordings
                    .upsert_instance(meeting_id, uuid, InstanceStatus::Deleted, "Unknown Topic")?;
                self.tasks.set_status(meeting_id, TaskStatus::DeletedInZoom)?;
                Ok(InstanceOutcome::Deleted)
            }
            Err(ProviderError::RecordingsNotReady) => {
                debug!(meeting_id, uuid, "Recordings not ready yet");
                self.recordings.upsert_instance(
                    meeting_id,
                    uuid,
                    InstanceStatus::Processing,
                    "Unknown Topic",
                )?;
                Ok(InstanceOutcome::Processing)
            }
            Err(e) => {
                // Transport/auth trouble is retryable like processing
                warn!(meeting_id, uuid, error = %e, "Instance fetch failed, will retry");
                Ok(InstanceOutcome::Processing)
            }
        }
    }

    /// Download every known recording of one instance
    async fn download_instance(&self, email: &str, meeting_id: &str, uuid: &str) -> Result<()> {
        for record in self.recordings.recordings_for_instance(uuid)? {
            if let Err(e) = self.download(email, meeting_id, &record).await {
                warn!(
                    recording_id = %record.recording_id,
                    uuid,
                    error = %e,
                    "Recording download failed"
                );
            }
        }
        Ok(())
    }

    /// Download one artifact unless it is already stored. Idempotent:
    /// keyed by recording id, so a second call can never produce a second
    /// stored artifact.
    pub async fn download(
        &self,
        email: &str,
        meeting_id: &str,
        record: &RecordingRecord,
    ) -> Result<()> {
        if record.download_status == DownloadStatus::Downloaded {
            debug!(recording_id = %record.recording_id, "Recording already downloaded, skipping");
            return Ok(());
        }

        let key = record.storage_key();
        let ext = record.file_extension.as_deref().unwrap_or("mp4");
        let filename = format!("recording_{}.{}", record.recording_id, ext);

        if self.storage.exists(&key).await? {
            debug!(recording_id = %record.recording_id, "Artifact already stored, skipping");
            self.recordings
                .mark_downloaded(&record.meeting_uuid, &record.recording_id, &filename, &key)?;
            self.finish_task(meeting_id)?;
            return Ok(());
        }

        let bytes = self.provider.fetch(email, &record.download_url).await?;
        self.storage.upload(&key, bytes).await?;

        self.recordings
            .mark_downloaded(&record.meeting_uuid, &record.recording_id, &filename, &key)?;
        self.metrics.recording_downloaded();
        info!(recording_id = %record.recording_id, key, "Recording archived");

        self.finish_task(meeting_id)?;
        Ok(())
    }

    fn finish_task(&self, meeting_id: &str) -> Result<()> {
        if self.tasks.set_status(meeting_id, TaskStatus::Done)? {
            self.metrics.task_completed();
        }
        Ok(())
    }
}

fn to_record(uuid: &str, file: &RecordingFile) -> RecordingRecord {
    RecordingRecord {
        recording_id: file.id.clone(),
        meeting_uuid: uuid.to_string(),
        recording_type: file.recording_type.clone(),
        download_url: file.download_url.clone(),
        file_size: file.file_size,
        file_extension: file.file_extension.clone(),
        download_status: DownloadStatus::NotDownloaded,
        filename: None,
        storage_path: None,
        trim: false,
        trim_markers: None,
        trimming_in_progress: false,
    }
}
