//! Shared fakes and fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use lectoria::provider::{
    MeetingInfo, MeetingProvider, MeetingStatus, PastInstance, RecordingsPayload,
};
use lectoria::provider::ProviderError;
use lectoria::queue::{DeliveryError, DispatchError, Dispatcher, NotificationSender};
use lectoria::recordings::{TrimError, TrimSpec, TrimmedArtifact, Trimmer};

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

/// One scripted answer of the meeting-status endpoint
#[derive(Debug, Clone)]
pub enum StatusStep {
    Status(MeetingStatus),
    Fail,
}

/// Behavior of the recordings-by-uuid endpoint for one uuid
#[derive(Debug, Clone)]
pub enum RecordingsBehavior {
    Payload(RecordingsPayload),
    Deleted(String),
    NotReady,
}

/// Scriptable provider fake. Unscripted calls fall back to benign
/// defaults so tests only describe what they care about.
#[derive(Default)]
pub struct FakeProvider {
    pub status_script: Mutex<VecDeque<StatusStep>>,
    pub status_calls: AtomicU32,
    pub instances: Mutex<Vec<PastInstance>>,
    pub recordings: Mutex<HashMap<String, RecordingsBehavior>>,
    pub probe_available: Mutex<HashMap<String, bool>>,
    pub fetch_calls: AtomicU32,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_statuses(&self, steps: impl IntoIterator<Item = StatusStep>) {
        self.status_script.lock().unwrap().extend(steps);
    }

    pub fn set_instances(&self, uuids: &[&str]) {
        *self.instances.lock().unwrap() = uuids
            .iter()
            .map(|uuid| PastInstance {
                uuid: uuid.to_string(),
            })
            .collect();
    }

    pub fn set_recordings(&self, uuid: &str, behavior: RecordingsBehavior) {
        self.recordings
            .lock()
            .unwrap()
            .insert(uuid.to_string(), behavior);
    }

    pub fn status_call_count(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_call_count(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MeetingProvider for FakeProvider {
    async fn meeting_info(
        &self,
        _email: &str,
        meeting_id: &str,
    ) -> Result<MeetingInfo, ProviderError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .status_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(StatusStep::Status(MeetingStatus::Ended));
        match step {
            StatusStep::Status(status) => Ok(MeetingInfo {
                uuid: format!("uuid-{meeting_id}"),
                status,
                start_time: None,
                end_time: None,
            }),
            StatusStep::Fail => Err(ProviderError::Unavailable {
                status: 500,
                body: "scripted failure".to_string(),
            }),
        }
    }

    async fn past_instances(
        &self,
        _email: &str,
        _meeting_id: &str,
    ) -> Result<Vec<PastInstance>, ProviderError> {
        Ok(self.instances.lock().unwrap().clone())
    }

    async fn instance_recordings(
        &self,
        _email: &str,
        uuid: &str,
    ) -> Result<RecordingsPayload, ProviderError> {
        match self.recordings.lock().unwrap().get(uuid) {
            Some(RecordingsBehavior::Payload(payload)) => Ok(payload.clone()),
            Some(RecordingsBehavior::Deleted(message)) => {
                Err(ProviderError::MeetingDeleted(message.clone()))
            }
            Some(RecordingsBehavior::NotReady) | None => Err(ProviderError::RecordingsNotReady),
        }
    }

    async fn probe(&self, url: &str) -> bool {
        *self
            .probe_available
            .lock()
            .unwrap()
            .get(url)
            .unwrap_or(&true)
    }

    async fn fetch(&self, _email: &str, _url: &str) -> Result<Bytes, ProviderError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from_static(b"recording bytes"))
    }
}

/// Trimmer fake that always succeeds, recording the specs it saw
#[derive(Default)]
pub struct FakeTrimmer {
    pub specs: Mutex<Vec<TrimSpec>>,
}

#[async_trait]
impl Trimmer for FakeTrimmer {
    async fn trim(&self, spec: &TrimSpec) -> Result<TrimmedArtifact, TrimError> {
        self.specs.lock().unwrap().push(spec.clone());
        Ok(TrimmedArtifact {
            filename: format!("recording_{}_trimmed.mp4", spec.recording_id),
            storage_path: format!("recordings/trimmed/{}_trimmed.mp4", spec.recording_id),
        })
    }
}

/// Notification sender fake with scripted per-call results
#[derive(Default)]
pub struct FakeSender {
    pub results: Mutex<VecDeque<Result<(), ()>>>,
    pub batches: Mutex<Vec<Vec<i64>>>,
}

impl FakeSender {
    pub fn script(&self, results: impl IntoIterator<Item = Result<(), ()>>) {
        self.results.lock().unwrap().extend(results);
    }

    pub fn sent_batches(&self) -> Vec<Vec<i64>> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for FakeSender {
    async fn send(&self, game_ids: &[i64]) -> Result<(), DeliveryError> {
        self.batches.lock().unwrap().push(game_ids.to_vec());
        match self.results.lock().unwrap().pop_front() {
            Some(Ok(())) | None => Ok(()),
            Some(Err(())) => Err(DeliveryError("scripted failure".to_string())),
        }
    }
}

/// Dispatcher fake that records every dispatched (email, meeting id)
#[derive(Default)]
pub struct FakeDispatcher {
    pub dispatched: Mutex<Vec<(String, String)>>,
}

impl FakeDispatcher {
    pub fn dispatched(&self) -> Vec<(String, String)> {
        self.dispatched.lock().unwrap().clone()
    }
}

#[async_trait]
impl Dispatcher for FakeDispatcher {
    async fn dispatch(&self, email: &str, meeting_id: &str) -> Result<(), DispatchError> {
        self.dispatched
            .lock()
            .unwrap()
            .push((email.to_string(), meeting_id.to_string()));
        Ok(())
    }
}
