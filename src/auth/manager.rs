use anyhow::{Context, Result};
use chrono::Duration;
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::claims;
use super::refresh;
use super::types::{CredentialPair, SessionStatus};
use crate::error::{RefreshError, StoreError};
use crate::store::{
    TokenStore, ACCESS_TOKEN_KEY, CREDENTIAL_KEYS, REFRESH_TOKEN_KEY, TOKEN_TYPE_KEY,
};

/// Default renewal horizon: tokens expiring within this many minutes are refreshed
pub const DEFAULT_REFRESH_THRESHOLD_MINUTES: u64 = 2;

/// Largest accepted renewal horizon (one day)
pub const MAX_REFRESH_THRESHOLD_MINUTES: u64 = 24 * 60;

/// A renewal in progress, awaited by every caller that asks for one meanwhile
type PendingRefresh = Shared<BoxFuture<'static, Option<String>>>;

/// Session token manager.
/// Owns the credential store and renews the access token on demand,
/// with at most one renewal in flight per manager.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

struct Inner {
    /// Persistent credential storage
    store: Arc<dyn TokenStore>,

    /// HTTP client for refresh requests
    client: Client,

    /// Renewal endpoint
    refresh_url: String,

    /// Tokens expiring within this window are renewed before use
    refresh_threshold: Duration,

    /// Single-flight slot, cleared when the pending renewal settles
    in_flight: Mutex<Option<PendingRefresh>>,
}

impl TokenManager {
    /// Create a new TokenManager with its own HTTP client
    pub fn new(
        store: Arc<dyn TokenStore>,
        api_base_url: &str,
        refresh_threshold_minutes: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Self::with_client(client, store, api_base_url, refresh_threshold_minutes)
    }

    /// Create a TokenManager that sends renewals through `client`
    pub fn with_client(
        client: Client,
        store: Arc<dyn TokenStore>,
        api_base_url: &str,
        refresh_threshold_minutes: u64,
    ) -> Result<Self> {
        let refresh_threshold = i64::try_from(refresh_threshold_minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .with_context(|| {
                format!(
                    "Refresh threshold out of range: {} minutes",
                    refresh_threshold_minutes
                )
            })?;

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                client,
                refresh_url: refresh::refresh_url(api_base_url),
                refresh_threshold,
                in_flight: Mutex::new(None),
            }),
        })
    }

    /// Get a usable access token, refreshing it first if it is expired,
    /// expiring within the threshold, or undecodable.
    /// Returns `None` when no token is stored or the renewal failed.
    pub async fn get_valid_access_token(&self) -> Option<String> {
        let token = self.inner.read(ACCESS_TOKEN_KEY)?;

        if claims::is_expiring_soon(&token, self.inner.refresh_threshold) {
            tracing::debug!("Access token expired or expiring soon, refreshing");
            return self.refresh().await;
        }

        Some(token)
    }

    /// Renew the access token regardless of its expiry.
    /// Concurrent callers share one renewal request and its outcome.
    pub async fn refresh(&self) -> Option<String> {
        let pending = {
            let mut slot = self.inner.in_flight.lock().await;
            match slot.as_ref() {
                Some(pending) => {
                    tracing::debug!("Joining in-flight token refresh");
                    pending.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let pending = async move {
                        let outcome = inner.refresh_once().await;
                        inner.in_flight.lock().await.take();
                        outcome
                    }
                    .boxed()
                    .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// Persist credentials obtained from a login
    pub fn store_credentials(&self, pair: &CredentialPair) -> Result<(), StoreError> {
        let mut entries = vec![
            (ACCESS_TOKEN_KEY, pair.access_token.as_str()),
            (REFRESH_TOKEN_KEY, pair.refresh_token.as_str()),
        ];
        if let Some(token_type) = pair.token_type.as_deref() {
            entries.push((TOKEN_TYPE_KEY, token_type));
        }
        self.inner.store.set_many(&entries)?;

        // Only drop the previous type once the new pair is in place
        if pair.token_type.is_none() {
            self.inner.store.remove_many(&[TOKEN_TYPE_KEY])?;
        }

        tracing::info!("Stored session credentials");
        Ok(())
    }

    /// Remove all stored credentials (sign-out)
    pub fn clear(&self) -> Result<(), StoreError> {
        self.inner.store.remove_many(&CREDENTIAL_KEYS)?;
        tracing::info!("Cleared session credentials");
        Ok(())
    }

    /// Describe the stored session without touching the network
    pub fn status(&self) -> SessionStatus {
        let access_token = self.inner.read(ACCESS_TOKEN_KEY);

        SessionStatus {
            has_access_token: access_token.is_some(),
            has_refresh_token: self.inner.read(REFRESH_TOKEN_KEY).is_some(),
            token_type: self.inner.read(TOKEN_TYPE_KEY),
            access_token_expires_at: access_token
                .as_deref()
                .and_then(|token| claims::decode_claims(token).ok())
                .and_then(|claims| claims.expires_at()),
        }
    }
}

impl Inner {
    /// Read an entry; storage faults count as a missing credential
    fn read(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to read {} from token store: {}", key, e);
                None
            }
        }
    }

    async fn refresh_once(&self) -> Option<String> {
        match self.try_refresh().await {
            Ok(token) => Some(token),
            Err(RefreshError::NoRefreshToken) => {
                tracing::debug!("No refresh token stored, cannot refresh");
                None
            }
            Err(e) => {
                tracing::error!("Token refresh failed: {}", e);
                None
            }
        }
    }

    async fn try_refresh(&self) -> Result<String, RefreshError> {
        let refresh_token = self
            .store
            .get(REFRESH_TOKEN_KEY)?
            .ok_or(RefreshError::NoRefreshToken)?;

        let token_data =
            refresh::request_refresh(&self.client, &self.refresh_url, &refresh_token).await?;

        // Write everything in one batch so a failure leaves the old pair intact
        let mut entries = vec![(ACCESS_TOKEN_KEY, token_data.access_token.as_str())];
        if let Some(ref new_refresh_token) = token_data.refresh_token {
            entries.push((REFRESH_TOKEN_KEY, new_refresh_token.as_str()));
        }
        if let Some(ref token_type) = token_data.token_type {
            entries.push((TOKEN_TYPE_KEY, token_type.as_str()));
        }
        self.store.set_many(&entries)?;

        Ok(token_data.access_token)
    }
}
