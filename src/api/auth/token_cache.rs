use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use super::{Credential, CredentialProvider, TokenSource};
use crate::api::constants::TOKEN_EXPIRY_MARGIN_SECS;
use crate::api::error::ApiError;

/// Caches a bearer credential and refreshes it through a [`TokenSource`].
///
/// Reads of a valid credential are lock-free. Refreshes go through a single
/// gate, so concurrent callers on a stale cache cause one provider call.
pub struct TokenCache {
    source: Box<dyn TokenSource>,
    current: ArcSwapOption<Credential>,
    refresh_gate: Mutex<()>,
}

impl TokenCache {
    pub fn new(source: impl TokenSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            current: ArcSwapOption::empty(),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Drop the cached credential; the next `acquire()` refreshes
    pub fn invalidate(&self) {
        self.current.store(None);
    }

    fn valid_credential(&self) -> Option<Arc<Credential>> {
        self.current
            .load_full()
            .filter(|credential| credential.is_valid_at(Utc::now()))
    }
}

#[async_trait]
impl CredentialProvider for TokenCache {
    async fn acquire(&self) -> Result<Credential, ApiError> {
        if let Some(credential) = self.valid_credential() {
            return Ok(credential.as_ref().clone());
        }

        let _gate = self.refresh_gate.lock().await;

        // Another caller may have refreshed while we waited on the gate
        if let Some(credential) = self.valid_credential() {
            log::trace!("Token refreshed by a concurrent caller");
            return Ok(credential.as_ref().clone());
        }

        log::debug!("Cached token absent or expired, requesting a new one");
        let token = self
            .source
            .fetch_token()
            .await
            .map_err(ApiError::Authentication)?;

        let credential = Credential::bearer(
            token.access_token,
            token.expires_at - Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS),
        );
        self.current.store(Some(Arc::new(credential.clone())));

        log::info!("Acquired new access token, valid until {:?}", credential.expires_at);
        Ok(credential)
    }
}
