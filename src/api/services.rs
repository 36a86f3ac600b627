use axum::{Json, extract::Path, extract::State, http::StatusCode, response::IntoResponse};
use tracing::info;

use super::error::ApiError;
use super::models::{
    CancelTrimRequest, HealthResponse, ScheduleDownloadRequest, StartDownloadRequest,
    StartDownloadResponse, TaskAcceptedResponse, TrimRequest, TrimResponse,
};
use super::state::AppState;
use crate::pipeline::run_download_pipeline;
use crate::recordings::{TrimMarkers, TrimSpec};

/// Schedule a recording download (POST /api/downloads)
///
/// Inserts a pending task keyed by meeting id with the given execute
/// time. Returns 202 immediately; the eventual outcome is visible only
/// through the status endpoint.
pub async fn schedule_download(
    State(state): State<AppState>,
    Json(request): Json<ScheduleDownloadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.email.trim().is_empty() || request.meeting_id.trim().is_empty() {
        return Err(ApiError::InvalidPayload(
            "email and meeting_id are required".to_string(),
        ));
    }

    let task = state
        .tasks
        .enqueue(&request.email, &request.meeting_id, request.execute_time)?;
    state.metrics.task_enqueued();

    let response = TaskAcceptedResponse {
        task_id: task.task_id,
        meeting_id: task.meeting_id,
        status: task.status,
    };

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Task status read (GET /api/downloads/:meeting_id)
pub async fn get_download(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state
        .tasks
        .get(&meeting_id)?
        .ok_or_else(|| ApiError::NotFound(format!("task {meeting_id}")))?;

    Ok((StatusCode::OK, Json(task)))
}

/// Cancel a scheduled download (DELETE /api/downloads/:meeting_id)
///
/// Cancellation is deletion: the queue loop re-validates existence at
/// claim time, so no further signal is needed.
pub async fn cancel_download(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.tasks.cancel(&meeting_id)? {
        return Err(ApiError::NotFound(format!("task {meeting_id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Internal worker endpoint the queue loop dispatches claimed tasks to
/// (POST /api/worker/start_download)
///
/// Returns 200 as soon as the pipeline is spawned; the pipeline writes
/// terminal states to the task record itself.
pub async fn start_download(
    State(state): State<AppState>,
    Json(request): Json<StartDownloadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(
        meeting_id = %request.meeting_id,
        email = %request.email,
        "Starting download pipeline"
    );

    let deps = state.pipeline.clone();
    tokio::spawn(run_download_pipeline(
        deps,
        request.email,
        request.meeting_id,
    ));

    Ok((StatusCode::OK, Json(StartDownloadResponse { status: "started" })))
}

/// Trim a recording (POST /api/recordings/trim)
///
/// Claims the trim guard first; a concurrent trim of the same recording
/// gets 409. The guard is released on every exit path.
pub async fn trim_recording(
    State(state): State<AppState>,
    Json(request): Json<TrimRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.recording_id.trim().is_empty() || request.uuid.trim().is_empty() {
        return Err(ApiError::InvalidPayload(
            "recording_id and uuid are required".to_string(),
        ));
    }

    let source_path = state
        .recordings
        .get_recording(&request.uuid, &request.recording_id)
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .and_then(|record| record.storage_path);

    state.recordings.begin_trim(&request.uuid, &request.recording_id)?;

    let spec = TrimSpec {
        uuid: request.uuid.clone(),
        recording_id: request.recording_id.clone(),
        start_time: request.start_time.clone(),
        end_time: request.end_time.clone(),
        source_path,
    };

    let artifact = match state.trimmer.trim(&spec).await {
        Ok(artifact) => artifact,
        Err(e) => {
            // Release the guard before surfacing the failure
            let _ = state
                .recordings
                .abort_trim(&request.uuid, &request.recording_id);
            return Err(e.into());
        }
    };

    if let Err(e) = state.recordings.complete_trim(
        &request.uuid,
        &request.recording_id,
        TrimMarkers {
            start: request.start_time,
            end: request.end_time,
        },
        &artifact.filename,
        &artifact.storage_path,
    ) {
        let _ = state
            .recordings
            .abort_trim(&request.uuid, &request.recording_id);
        return Err(e.into());
    }

    Ok((
        StatusCode::OK,
        Json(TrimResponse {
            recording_id: request.recording_id,
            output_file: artifact.storage_path,
        }),
    ))
}

/// Undo a trim (POST /api/recordings/cancel-trim)
///
/// Rejected with 409 while a trim is running; otherwise clears the trim
/// state and removes the derived artifact from storage.
pub async fn cancel_trim(
    State(state): State<AppState>,
    Json(request): Json<CancelTrimRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let derived_path = state
        .recordings
        .cancel_trim(&request.uuid, &request.recording_id)?;

    if let Some(path) = derived_path {
        state
            .storage
            .delete(&path)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;
    }

    Ok(StatusCode::OK)
}

/// Health check endpoint (GET /health)
pub async fn health(State(_state): State<AppState>) -> impl IntoResponse {
    use std::collections::HashMap;

    let mut components = HashMap::new();
    components.insert("api".to_string(), "healthy".to_string());
    components.insert("task_store".to_string(), "healthy".to_string());
    components.insert("recording_store".to_string(), "healthy".to_string());
    components.insert("storage".to_string(), "healthy".to_string());

    let response = HealthResponse {
        status: "healthy".to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (StatusCode::OK, Json(response))
}
