use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::poller::PollPolicy;
use crate::recordings::FetchPolicy;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub poller: PollerSettings,
    #[serde(default)]
    pub fetcher: FetcherSettings,
    #[serde(default)]
    pub queue: QueueSettings,
    #[serde(default)]
    pub notifications: NotificationSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub encoder: EncoderConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Fjall keyspace holding accounts, tasks, notifications and
    /// recording metadata
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            store_path: default_store_path(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/store")
}

/// Meeting provider endpoints and client timeouts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_oauth_token_url")]
    pub oauth_token_url: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            oauth_token_url: default_oauth_token_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.zoom.us/v2".to_string()
}

fn default_oauth_token_url() -> String {
    "https://zoom.us/oauth/token".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Meeting status poll ceilings and waits. The values encode operational
/// judgment, not correctness requirements, so they are all configurable.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollerSettings {
    #[serde(default = "default_not_found_limit")]
    pub not_found_limit: u32,
    #[serde(default = "default_ongoing_limit")]
    pub ongoing_limit: u32,
    #[serde(default = "default_first_wait_secs")]
    pub first_wait_secs: u64,
    #[serde(default = "default_second_wait_secs")]
    pub second_wait_secs: u64,
    #[serde(default = "default_ceiling_wait_secs")]
    pub ceiling_wait_secs: u64,
    #[serde(default = "default_failure_wait_secs")]
    pub failure_wait_secs: u64,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            not_found_limit: default_not_found_limit(),
            ongoing_limit: default_ongoing_limit(),
            first_wait_secs: default_first_wait_secs(),
            second_wait_secs: default_second_wait_secs(),
            ceiling_wait_secs: default_ceiling_wait_secs(),
            failure_wait_secs: default_failure_wait_secs(),
        }
    }
}

impl PollerSettings {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            not_found_limit: self.not_found_limit,
            ongoing_limit: self.ongoing_limit,
            first_wait: Duration::from_secs(self.first_wait_secs),
            second_wait: Duration::from_secs(self.second_wait_secs),
            ceiling_wait: Duration::from_secs(self.ceiling_wait_secs),
            failure_wait: Duration::from_secs(self.failure_wait_secs),
        }
    }
}

fn default_not_found_limit() -> u32 {
    5
}

fn default_ongoing_limit() -> u32 {
    20
}

fn default_first_wait_secs() -> u64 {
    120
}

fn default_second_wait_secs() -> u64 {
    240
}

fn default_ceiling_wait_secs() -> u64 {
    480
}

fn default_failure_wait_secs() -> u64 {
    480
}

/// Recording-fetch batch retry policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetcherSettings {
    #[serde(default = "default_fetch_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_fetch_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_fetch_max_attempts(),
            retry_delay_secs: default_fetch_retry_delay_secs(),
        }
    }
}

impl FetcherSettings {
    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            max_attempts: self.max_attempts,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
        }
    }
}

fn default_fetch_max_attempts() -> u32 {
    20
}

fn default_fetch_retry_delay_secs() -> u64 {
    10
}

/// Download queue scan cadence and staleness recovery
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueSettings {
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    /// In-progress tasks older than this are handed back to pending.
    /// A liveness heuristic inherited from operations, not a lock.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    /// Worker endpoint that claimed tasks are dispatched to, fire-and-forget
    #[serde(default = "default_dispatch_url")]
    pub dispatch_url: String,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval_secs(),
            stale_after_secs: default_stale_after_secs(),
            dispatch_url: default_dispatch_url(),
        }
    }
}

fn default_scan_interval_secs() -> u64 {
    120
}

fn default_stale_after_secs() -> u64 {
    20 * 60
}

fn default_dispatch_url() -> String {
    "http://127.0.0.1:8080/api/worker/start_download".to_string()
}

/// Notification queue cadences and delivery endpoint. The error-retry
/// sweep runs on its own interval so failures do not starve new
/// deliveries.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationSettings {
    #[serde(default = "default_notify_scan_interval_secs")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_error_retry_interval_secs")]
    pub error_retry_interval_secs: u64,
    #[serde(default = "default_notify_endpoint")]
    pub endpoint: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_notify_scan_interval_secs(),
            error_retry_interval_secs: default_error_retry_interval_secs(),
            endpoint: default_notify_endpoint(),
        }
    }
}

fn default_notify_scan_interval_secs() -> u64 {
    120
}

fn default_error_retry_interval_secs() -> u64 {
    240
}

fn default_notify_endpoint() -> String {
    "http://127.0.0.1:8004/api/telegram/send_notification".to_string()
}

/// Artifact storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Local,
    Memory,
}

impl Default for StorageProvider {
    fn default() -> Self {
        StorageProvider::Local
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub provider: StorageProvider,
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            provider: StorageProvider::default(),
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/recordings")
}

/// External encoder used for trim requests
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EncoderConfig {
    #[serde(default = "default_encoder_endpoint")]
    pub endpoint: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_encoder_endpoint(),
        }
    }
}

fn default_encoder_endpoint() -> String {
    "http://127.0.0.1:8005/trim-video".to_string()
}
