use serde::{Deserialize, Serialize};

/// Live status of a meeting as reported by the provider. Anything the
/// provider invents later decodes to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    Started,
    Waiting,
    Ended,
    #[serde(other)]
    Unknown,
}

/// Response of the meeting-status endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct MeetingInfo {
    pub uuid: String,
    #[serde(default = "unknown_status")]
    pub status: MeetingStatus,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

fn unknown_status() -> MeetingStatus {
    MeetingStatus::Unknown
}

/// One historical occurrence of a recurring/re-created meeting
#[derive(Debug, Clone, Deserialize)]
pub struct PastInstance {
    pub uuid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PastInstancesResponse {
    #[serde(default)]
    pub meetings: Vec<PastInstance>,
}

/// One downloadable artifact inside a recordings payload
#[derive(Debug, Clone, Deserialize)]
pub struct RecordingFile {
    pub id: String,
    #[serde(default = "unknown_recording_type")]
    pub recording_type: String,
    pub download_url: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub recording_start: Option<String>,
    #[serde(default)]
    pub recording_end: Option<String>,
    #[serde(default)]
    pub file_extension: Option<String>,
}

fn unknown_recording_type() -> String {
    "unknown".to_string()
}

/// Response of the recordings-by-uuid endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct RecordingsPayload {
    pub uuid: String,
    #[serde(default = "unknown_topic")]
    pub topic: String,
    #[serde(default)]
    pub recording_files: Vec<RecordingFile>,
}

fn unknown_topic() -> String {
    "Unknown Topic".to_string()
}

/// Error body the provider attaches to 404 responses
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ProviderErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: String,
}
