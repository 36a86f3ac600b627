//! Meeting provider surface
//!
//! The pipeline never talks HTTP directly; it goes through the
//! `MeetingProvider` trait so tests can script provider behavior. The
//! production implementation is `HttpMeetingProvider`.

mod client;
mod models;

pub use client::{HttpMeetingProvider, ProviderHttpConfig};
pub use models::{MeetingInfo, MeetingStatus, PastInstance, RecordingFile, RecordingsPayload};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::accounts::AuthError;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("auth: {0}")]
    Auth(#[from] AuthError),

    #[error("meeting deleted in provider: {0}")]
    MeetingDeleted(String),

    #[error("recordings not ready")]
    RecordingsNotReady,

    #[error("past instances unavailable: HTTP {status}")]
    MeetingsUnavailable { status: u16 },

    #[error("provider returned HTTP {status}: {body}")]
    Unavailable { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(value: reqwest::Error) -> Self {
        ProviderError::Network(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Everything the pipeline needs from the meeting provider
#[async_trait]
pub trait MeetingProvider: Send + Sync {
    /// Current status of a meeting
    async fn meeting_info(&self, email: &str, meeting_id: &str) -> Result<MeetingInfo>;

    /// Historical instances (uuids) of a meeting id
    async fn past_instances(&self, email: &str, meeting_id: &str) -> Result<Vec<PastInstance>>;

    /// Recording artifacts for one instance uuid
    async fn instance_recordings(&self, email: &str, uuid: &str) -> Result<RecordingsPayload>;

    /// HEAD availability check for a download URL
    async fn probe(&self, url: &str) -> bool;

    /// Download one artifact
    async fn fetch(&self, email: &str, url: &str) -> Result<Bytes>;
}
