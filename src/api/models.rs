use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::queue::TaskStatus;

/// Body of POST /api/downloads
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleDownloadRequest {
    pub email: String,
    pub meeting_id: String,
    /// When the task becomes claimable, normally the meeting's end time
    pub execute_time: DateTime<Utc>,
}

/// 202 response confirming an enqueue. Eventual outcomes are observable
/// only through the status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAcceptedResponse {
    pub task_id: Uuid,
    pub meeting_id: String,
    pub status: TaskStatus,
}

/// Body of the internal worker endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct StartDownloadRequest {
    pub email: String,
    pub meeting_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartDownloadResponse {
    pub status: &'static str,
}

/// Body of POST /api/recordings/trim
#[derive(Debug, Clone, Deserialize)]
pub struct TrimRequest {
    pub uuid: String,
    pub recording_id: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrimResponse {
    pub recording_id: String,
    pub output_file: String,
}

/// Body of POST /api/recordings/cancel-trim
#[derive(Debug, Clone, Deserialize)]
pub struct CancelTrimRequest {
    pub uuid: String,
    pub recording_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
}
