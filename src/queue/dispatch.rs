//! Outbound calls made by the queue loops
//!
//! Both are trait seams so the loops can be tested without a network:
//! claimed download tasks are handed to a worker endpoint fire-and-forget,
//! and notification batches go to the delivery endpoint in one call.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
#[error("dispatch failed: {0}")]
pub struct DispatchError(pub String);

#[derive(Debug, Error)]
#[error("delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Hands a claimed download task to the pipeline worker endpoint. The
/// call returns as soon as the worker has accepted the job; completion is
/// written to the task record by the pipeline, never returned here.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, email: &str, meeting_id: &str) -> Result<(), DispatchError>;
}

/// Delivers one batched notification call. Full-batch semantics: a non-2xx
/// response fails every id in the batch.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, game_ids: &[i64]) -> Result<(), DeliveryError>;
}

#[derive(Serialize)]
struct StartDownloadBody<'a> {
    email: &'a str,
    meeting_id: &'a str,
}

pub struct HttpDispatcher {
    http: reqwest::Client,
    url: String,
}

impl HttpDispatcher {
    pub fn new(http: reqwest::Client, url: String) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn dispatch(&self, email: &str, meeting_id: &str) -> Result<(), DispatchError> {
        let response = self
            .http
            .post(&self.url)
            .json(&StartDownloadBody { email, meeting_id })
            .send()
            .await
            .map_err(|e| DispatchError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError(format!("HTTP {status}: {body}")));
        }

        debug!(email, meeting_id, "Download dispatched to worker endpoint");
        Ok(())
    }
}

#[derive(Serialize)]
struct NotificationBody<'a> {
    game_ids: &'a [i64],
}

pub struct HttpNotificationSender {
    http: reqwest::Client,
    url: String,
}

impl HttpNotificationSender {
    pub fn new(http: reqwest::Client, url: String) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl NotificationSender for HttpNotificationSender {
    async fn send(&self, game_ids: &[i64]) -> Result<(), DeliveryError> {
        let response = self
            .http
            .post(&self.url)
            .json(&NotificationBody { game_ids })
            .send()
            .await
            .map_err(|e| DeliveryError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError(format!("HTTP {status}: {body}")));
        }

        debug!(count = game_ids.len(), "Notification batch delivered");
        Ok(())
    }
}
