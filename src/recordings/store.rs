use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

const INSTANCES_PARTITION: &str = "instances";
const RECORDINGS_PARTITION: &str = "recordings";

/// Suffix of the derived artifact id produced by a trim
pub const TRIMMED_SUFFIX: &str = "_trimmed";

#[derive(Debug, Error)]
pub enum RecordingStoreError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("record malformed: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RecordingStoreError>;

#[derive(Debug, Error)]
pub enum TrimError {
    #[error("trimming already in progress for {0}")]
    Conflict(String),

    #[error("recording not found: {0}")]
    NotFound(String),

    #[error("encoder failed: {0}")]
    Encoder(String),

    #[error(transparent)]
    Store(#[from] RecordingStoreError),
}

/// Status of one meeting instance's recordings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    /// All artifacts discovered and available
    Success,
    /// Recordings still being prepared by the provider
    Processing,
    /// Meeting deleted at the provider; terminal
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    NotDownloaded,
    Downloaded,
}

/// Trim boundaries chosen by a moderator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimMarkers {
    pub start: String,
    pub end: String,
}

/// One meeting instance (uuid) under its stable meeting id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub meeting_id: String,
    pub uuid: String,
    pub status: InstanceStatus,
    pub topic: String,
}

/// One recording artifact. Immutable once downloaded except for trim
/// metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingRecord {
    pub recording_id: String,
    pub meeting_uuid: String,
    pub recording_type: String,
    pub download_url: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub file_extension: Option<String>,
    pub download_status: DownloadStatus,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub storage_path: Option<String>,
    #[serde(default)]
    pub trim: bool,
    #[serde(default)]
    pub trim_markers: Option<TrimMarkers>,
    #[serde(default)]
    pub trimming_in_progress: bool,
}

impl RecordingRecord {
    /// Storage key the artifact is archived under, addressed by recording
    /// id rather than content hash.
    pub fn storage_key(&self) -> String {
        let ext = self.file_extension.as_deref().unwrap_or("mp4");
        format!(
            "recordings/{}/{}.{}",
            self.recording_type, self.recording_id, ext
        )
    }

    pub fn derived_recording_id(&self) -> String {
        format!("{}{}", self.recording_id, TRIMMED_SUFFIX)
    }
}

// The null byte cannot appear in meeting ids or uuids, so it is a safe
// key separator even for uuids containing '/'.
fn instance_key(meeting_id: &str, uuid: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(meeting_id.len() + uuid.len() + 1);
    key.extend_from_slice(meeting_id.as_bytes());
    key.push(0);
    key.extend_from_slice(uuid.as_bytes());
    key
}

fn recording_key(uuid: &str, recording_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(uuid.len() + recording_id.len() + 1);
    key.extend_from_slice(uuid.as_bytes());
    key.push(0);
    key.extend_from_slice(recording_id.as_bytes());
    key
}

fn recording_prefix(uuid: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(uuid.len() + 1);
    prefix.extend_from_slice(uuid.as_bytes());
    prefix.push(0);
    prefix
}

/// Fjall-backed store for instance status and recording metadata.
///
/// Every read-modify-write goes through the internal lock and re-checks
/// the expected prior state before writing, so each mutation behaves as an
/// atomic filtered update. The trim guard in particular is a
/// compare-and-set, never a read-then-write.
pub struct RecordingStore {
    keyspace: Keyspace,
    instances: PartitionHandle,
    recordings: PartitionHandle,
    write_lock: Mutex<()>,
}

impl RecordingStore {
    pub fn open(keyspace: &Keyspace) -> Result<Self> {
        let instances =
            keyspace.open_partition(INSTANCES_PARTITION, PartitionCreateOptions::default())?;
        let recordings =
            keyspace.open_partition(RECORDINGS_PARTITION, PartitionCreateOptions::default())?;
        Ok(Self {
            keyspace: keyspace.clone(),
            instances,
            recordings,
            write_lock: Mutex::new(()),
        })
    }

    /// Flush all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Store or update the status/topic of one meeting instance
    pub fn upsert_instance(
        &self,
        meeting_id: &str,
        uuid: &str,
        status: InstanceStatus,
        topic: &str,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        let record = InstanceRecord {
            meeting_id: meeting_id.to_string(),
            uuid: uuid.to_string(),
            status,
            topic: topic.to_string(),
        };
        let value = serde_json::to_vec(&record)?;
        self.instances.insert(instance_key(meeting_id, uuid), value)?;
        debug!(meeting_id, uuid, ?status, "Instance upserted");
        Ok(())
    }

    pub fn get_instance(&self, meeting_id: &str, uuid: &str) -> Result<Option<InstanceRecord>> {
        match self.instances.get(instance_key(meeting_id, uuid))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Insert a discovered recording unless one with the same id already
    /// exists for that uuid. Returns whether an insert happened.
    pub fn insert_recording_if_absent(&self, record: &RecordingRecord) -> Result<bool> {
        let _guard = self.write_lock.lock().unwrap();
        let key = recording_key(&record.meeting_uuid, &record.recording_id);
        if self.recordings.get(&key)?.is_some() {
            debug!(
                recording_id = %record.recording_id,
                uuid = %record.meeting_uuid,
                "Recording already known, skipping"
            );
            return Ok(false);
        }
        let value = serde_json::to_vec(record)?;
        self.recordings.insert(key, value)?;
        debug!(
            recording_id = %record.recording_id,
            uuid = %record.meeting_uuid,
            "Recording registered"
        );
        Ok(true)
    }

    pub fn get_recording(&self, uuid: &str, recording_id: &str) -> Result<Option<RecordingRecord>> {
        match self.recordings.get(recording_key(uuid, recording_id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All recordings known for one instance uuid
    pub fn recordings_for_instance(&self, uuid: &str) -> Result<Vec<RecordingRecord>> {
        let mut records = Vec::new();
        for item in self.recordings.prefix(recording_prefix(uuid)) {
            let (_key, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }

    /// Record a completed download: flips the status and attaches the
    /// stored filename/path.
    pub fn mark_downloaded(
        &self,
        uuid: &str,
        recording_id: &str,
        filename: &str,
        storage_path: &str,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().unwrap();
        let key = recording_key(uuid, recording_id);
        let Some(bytes) = self.recordings.get(&key)? else {
            return Ok(false);
        };
        let mut record: RecordingRecord = serde_json::from_slice(&bytes)?;
        record.download_status = DownloadStatus::Downloaded;
        record.filename = Some(filename.to_string());
        record.storage_path = Some(storage_path.to_string());
        self.recordings.insert(key, serde_json::to_vec(&record)?)?;
        info!(recording_id, uuid, storage_path, "Recording marked downloaded");
        Ok(true)
    }

    /// Claim the trim guard for a recording. Compare-and-set: fails with
    /// `Conflict` when another trim already holds the guard.
    pub fn begin_trim(&self, uuid: &str, recording_id: &str) -> std::result::Result<(), TrimError> {
        let _guard = self.write_lock.lock().unwrap();
        let key = recording_key(uuid, recording_id);
        let Some(bytes) = self
            .recordings
            .get(&key)
            .map_err(RecordingStoreError::from)?
        else {
            return Err(TrimError::NotFound(recording_id.to_string()));
        };
        let mut record: RecordingRecord =
            serde_json::from_slice(&bytes).map_err(RecordingStoreError::from)?;
        if record.trimming_in_progress {
            return Err(TrimError::Conflict(recording_id.to_string()));
        }
        record.trimming_in_progress = true;
        self.recordings
            .insert(key, serde_json::to_vec(&record).map_err(RecordingStoreError::from)?)
            .map_err(RecordingStoreError::from)?;
        debug!(recording_id, uuid, "Trim guard claimed");
        Ok(())
    }

    /// Record a finished trim: markers, the trim flag, a derived artifact
    /// entry, and the guard released, all in one locked update.
    pub fn complete_trim(
        &self,
        uuid: &str,
        recording_id: &str,
        markers: TrimMarkers,
        derived_filename: &str,
        derived_storage_path: &str,
    ) -> std::result::Result<(), TrimError> {
        let _guard = self.write_lock.lock().unwrap();
        let key = recording_key(uuid, recording_id);
        let Some(bytes) = self
            .recordings
            .get(&key)
            .map_err(RecordingStoreError::from)?
        else {
            return Err(TrimError::NotFound(recording_id.to_string()));
        };
        let mut record: RecordingRecord =
            serde_json::from_slice(&bytes).map_err(RecordingStoreError::from)?;

        let derived = RecordingRecord {
            recording_id: record.derived_recording_id(),
            meeting_uuid: uuid.to_string(),
            recording_type: record.recording_type.clone(),
            download_url: String::new(),
            file_size: 0,
            file_extension: record.file_extension.clone(),
            download_status: DownloadStatus::Downloaded,
            filename: Some(derived_filename.to_string()),
            storage_path: Some(derived_storage_path.to_string()),
            trim: false,
            trim_markers: None,
            trimming_in_progress: false,
        };

        record.trim = true;
        record.trim_markers = Some(markers);
        record.trimming_in_progress = false;

        self.recordings
            .insert(
                recording_key(uuid, &derived.recording_id),
                serde_json::to_vec(&derived).map_err(RecordingStoreError::from)?,
            )
            .map_err(RecordingStoreError::from)?;
        self.recordings
            .insert(key, serde_json::to_vec(&record).map_err(RecordingStoreError::from)?)
            .map_err(RecordingStoreError::from)?;

        info!(recording_id, uuid, "Trim recorded, guard released");
        Ok(())
    }

    /// Release the guard without recording a trim. Every error exit path
    /// of a trim must come through here.
    pub fn abort_trim(&self, uuid: &str, recording_id: &str) -> std::result::Result<(), TrimError> {
        let _guard = self.write_lock.lock().unwrap();
        let key = recording_key(uuid, recording_id);
        let Some(bytes) = self
            .recordings
            .get(&key)
            .map_err(RecordingStoreError::from)?
        else {
            return Err(TrimError::NotFound(recording_id.to_string()));
        };
        let mut record: RecordingRecord =
            serde_json::from_slice(&bytes).map_err(RecordingStoreError::from)?;
        record.trimming_in_progress = false;
        self.recordings
            .insert(key, serde_json::to_vec(&record).map_err(RecordingStoreError::from)?)
            .map_err(RecordingStoreError::from)?;
        debug!(recording_id, uuid, "Trim guard released without result");
        Ok(())
    }

    /// Undo a recorded trim. Rejected while a trim is running. Returns the
    /// storage path of the derived artifact so the caller can delete the
    /// object.
    pub fn cancel_trim(
        &self,
        uuid: &str,
        recording_id: &str,
    ) -> std::result::Result<Option<String>, TrimError> {
        let _guard = self.write_lock.lock().unwrap();
        let key = recording_key(uuid, recording_id);
        let Some(bytes) = self
            .recordings
            .get(&key)
            .map_err(RecordingStoreError::from)?
        else {
            return Err(TrimError::NotFound(recording_id.to_string()));
        };
        let mut record: RecordingRecord =
            serde_json::from_slice(&bytes).map_err(RecordingStoreError::from)?;
        if record.trimming_in_progress {
            return Err(TrimError::Conflict(recording_id.to_string()));
        }

        record.trim = false;
        record.trim_markers = None;

        let derived_id = record.derived_recording_id();
        let derived_key = recording_key(uuid, &derived_id);
        let derived_path = match self
            .recordings
            .get(&derived_key)
            .map_err(RecordingStoreError::from)?
        {
            Some(derived_bytes) => {
                let derived: RecordingRecord =
                    serde_json::from_slice(&derived_bytes).map_err(RecordingStoreError::from)?;
                self.recordings
                    .remove(derived_key)
                    .map_err(RecordingStoreError::from)?;
                derived.storage_path
            }
            None => None,
        };

        self.recordings
            .insert(key, serde_json::to_vec(&record).map_err(RecordingStoreError::from)?)
            .map_err(RecordingStoreError::from)?;

        info!(recording_id, uuid, "Trim cancelled, derived artifact dropped");
        Ok(derived_path)
    }
}
