//! Per-account OAuth credentials and token refresh
//!
//! Accounts live in their own Fjall partition keyed by email. There is no
//! cache in front of the partition: every `get` re-reads the stored
//! document, so a refresh performed by one pipeline is immediately visible
//! to every other reader.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Token lifetime assumed when the provider response omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

const PARTITION: &str = "accounts";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("account not found: {0}")]
    NotFound(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("store error: {0}")]
    Store(#[from] fjall::Error),

    #[error("account record malformed: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AuthError>;

/// OAuth credentials for one meeting-provider account. Mutated only by
/// `AccountStore::refresh`; never deleted during normal operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
    pub token_expiry: DateTime<Utc>,
    pub client_id: String,
    pub client_secret: String,
}

impl Account {
    /// Pure comparison against the supplied instant
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.token_expiry
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: Option<i64>,
}

/// Fjall-backed account store with refresh against the OAuth token endpoint
pub struct AccountStore {
    keyspace: Keyspace,
    accounts: PartitionHandle,
    http: reqwest::Client,
    token_url: String,
    // Serializes refresh read-modify-write so a failed exchange can never
    // clobber a concurrent successful one.
    write_lock: Mutex<()>,
}

impl AccountStore {
    pub fn open(keyspace: &Keyspace, http: reqwest::Client, token_url: String) -> Result<Self> {
        let accounts = keyspace.open_partition(PARTITION, PartitionCreateOptions::default())?;
        Ok(Self {
            keyspace: keyspace.clone(),
            accounts,
            http,
            token_url,
            write_lock: Mutex::new(()),
        })
    }

    /// Flush all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Look up an account by email. Fails with `NotFound` for unknown
    /// accounts; always re-reads the partition.
    pub fn get(&self, email: &str) -> Result<Account> {
        match self.accounts.get(email.as_bytes())? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Err(AuthError::NotFound(email.to_string())),
        }
    }

    /// Insert or replace an account record
    pub fn put(&self, account: &Account) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();
        let value = serde_json::to_vec(account)?;
        self.accounts.insert(account.email.as_bytes(), value)?;
        debug!(email = %account.email, "Account stored");
        Ok(())
    }

    /// Exchange the stored refresh token for a new access/refresh pair.
    ///
    /// On success the new pair and expiry are persisted atomically and the
    /// updated account is returned. On any failure the stored credentials
    /// are left untouched, so a transient provider outage does not corrupt
    /// local state.
    pub async fn refresh(&self, email: &str, now: DateTime<Utc>) -> Result<Account> {
        let account = self.get(email)?;

        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&account.client_id, Some(&account.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", account.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(email, %status, "Token refresh rejected by provider");
            return Err(AuthError::RefreshFailed(format!("HTTP {status}: {body}")));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::RefreshFailed(format!("malformed token response: {e}")))?;

        let lifetime = tokens.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        let refreshed = Account {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_expiry: now + ChronoDuration::seconds(lifetime),
            ..account
        };

        self.put(&refreshed)?;
        info!(email, expiry = %refreshed.token_expiry, "Access token refreshed");

        Ok(refreshed)
    }

    /// Return a bearer token for the account, refreshing first when the
    /// stored one has expired.
    pub async fn bearer(&self, email: &str, now: DateTime<Utc>) -> Result<String> {
        let account = self.get(email)?;
        if account.is_expired(now) {
            debug!(email, "Stored token expired, refreshing");
            let refreshed = self.refresh(email, now).await?;
            return Ok(refreshed.access_token);
        }
        Ok(account.access_token)
    }
}
