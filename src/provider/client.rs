//! HTTP implementation of the meeting-provider surface

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::accounts::AccountStore;
use crate::clock::Clock;

use super::models::{
    MeetingInfo, PastInstance, PastInstancesResponse, ProviderErrorBody, RecordingsPayload,
};
use super::{MeetingProvider, ProviderError, Result};

/// Markers the provider puts in a 404 body when the meeting itself has
/// been deleted (as opposed to recordings still being processed). The
/// provider localizes the message, so both spellings are recognized.
const DELETED_MARKERS: [&str; 2] = ["does not exist", "не существует"];

/// Provider HTTP client configuration
#[derive(Debug, Clone)]
pub struct ProviderHttpConfig {
    pub api_base: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

/// Meeting provider over reqwest, taking bearer tokens from the account
/// store (refreshing expired ones on the way).
pub struct HttpMeetingProvider {
    http: reqwest::Client,
    api_base: String,
    accounts: Arc<AccountStore>,
    clock: Arc<dyn Clock>,
}

impl HttpMeetingProvider {
    pub fn new(
        config: ProviderHttpConfig,
        accounts: Arc<AccountStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            accounts,
            clock,
        })
    }

    async fn bearer(&self, email: &str) -> Result<String> {
        Ok(self.accounts.bearer(email, self.clock.now()).await?)
    }

    fn is_deleted_message(message: &str) -> bool {
        DELETED_MARKERS.iter().any(|m| message.contains(m))
    }
}

#[async_trait]
impl MeetingProvider for HttpMeetingProvider {
    async fn meeting_info(&self, email: &str, meeting_id: &str) -> Result<MeetingInfo> {
        let token = self.bearer(email).await?;
        let url = format!("{}/meetings/{}", self.api_base, meeting_id);

        let response = self.http.get(&url).bearer_auth(token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unavailable {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    async fn past_instances(&self, email: &str, meeting_id: &str) -> Result<Vec<PastInstance>> {
        let token = self.bearer(email).await?;
        let url = format!("{}/past_meetings/{}/instances", self.api_base, meeting_id);

        let response = self.http.get(&url).bearer_auth(token).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!(meeting_id, %status, "Past instances unavailable");
            return Err(ProviderError::MeetingsUnavailable {
                status: status.as_u16(),
            });
        }

        let payload: PastInstancesResponse = response.json().await?;
        Ok(payload.meetings)
    }

    async fn instance_recordings(&self, email: &str, uuid: &str) -> Result<RecordingsPayload> {
        let token = self.bearer(email).await?;
        let url = format!("{}/meetings/{}/recordings", self.api_base, uuid);

        let response = self.http.get(&url).bearer_auth(token).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            let body: ProviderErrorBody = response.json().await.unwrap_or(ProviderErrorBody {
                code: None,
                message: String::new(),
            });
            debug!(uuid, code = ?body.code, message = %body.message, "Recordings endpoint returned 404");
            if Self::is_deleted_message(&body.message) {
                return Err(ProviderError::MeetingDeleted(body.message));
            }
            return Err(ProviderError::RecordingsNotReady);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unavailable {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }

    async fn probe(&self, url: &str) -> bool {
        match self.http.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url, error = %e, "HEAD probe failed");
                false
            }
        }
    }

    async fn fetch(&self, email: &str, url: &str) -> Result<Bytes> {
        let token = self.bearer(email).await?;

        let response = self.http.get(url).bearer_auth(token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unavailable {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleted_marker_matches_both_localizations() {
        assert!(HttpMeetingProvider::is_deleted_message(
            "Meeting does not exist: 1234."
        ));
        assert!(HttpMeetingProvider::is_deleted_message(
            "Собрание не существует: 1234."
        ));
        assert!(!HttpMeetingProvider::is_deleted_message(
            "Recording is still processing."
        ));
    }
}
