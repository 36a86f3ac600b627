//! External encoder seam for trim requests
//!
//! The crate owns guard discipline and marker bookkeeping; the actual
//! media cut happens in an external encoder process reached over HTTP.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::store::TrimError;

/// One trim request, as handed to the encoder
#[derive(Debug, Clone, Serialize)]
pub struct TrimSpec {
    pub uuid: String,
    pub recording_id: String,
    pub start_time: String,
    pub end_time: String,
    /// Storage path of the source artifact, when known
    pub source_path: Option<String>,
}

/// Where the encoder put the cut artifact
#[derive(Debug, Clone)]
pub struct TrimmedArtifact {
    pub filename: String,
    pub storage_path: String,
}

#[async_trait]
pub trait Trimmer: Send + Sync {
    async fn trim(&self, spec: &TrimSpec) -> Result<TrimmedArtifact, TrimError>;
}

#[derive(Debug, Deserialize)]
struct EncoderResponse {
    output_file: String,
}

pub struct HttpTrimmer {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpTrimmer {
    pub fn new(http: reqwest::Client, endpoint: String) -> Self {
        Self { http, endpoint }
    }
}

#[async_trait]
impl Trimmer for HttpTrimmer {
    async fn trim(&self, spec: &TrimSpec) -> Result<TrimmedArtifact, TrimError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(spec)
            .send()
            .await
            .map_err(|e| TrimError::Encoder(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TrimError::Encoder(format!("HTTP {status}: {body}")));
        }

        let payload: EncoderResponse = response
            .json()
            .await
            .map_err(|e| TrimError::Encoder(format!("malformed encoder response: {e}")))?;

        let filename = payload
            .output_file
            .rsplit('/')
            .next()
            .unwrap_or(payload.output_file.as_str())
            .to_string();

        Ok(TrimmedArtifact {
            filename,
            storage_path: payload.output_file,
        })
    }
}
