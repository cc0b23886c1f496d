use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::fmt;

use crate::api::constants::DEFAULT_AUTHORITY;

/// Token as declared by the identity provider, before any safety margin
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// External identity provider exchange
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self) -> anyhow::Result<AccessToken>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

/// OAuth2 client-credentials grant against Azure AD / Entra ID
#[derive(Clone)]
pub struct AzureAdTokenSource {
    http_client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
}

impl AzureAdTokenSource {
    pub fn new(
        tenant_id: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self::with_authority(DEFAULT_AUTHORITY, tenant_id, client_id, client_secret, scope)
    }

    /// Same as [`AzureAdTokenSource::new`] against a different authority host
    pub fn with_authority(
        authority: &str,
        tenant_id: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                authority.trim_end_matches('/'),
                tenant_id
            ),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: scope.into(),
        }
    }

    pub fn with_http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = http_client;
        self
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

impl fmt::Debug for AzureAdTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureAdTokenSource")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scope", &self.scope)
            .finish()
    }
}

#[async_trait]
impl TokenSource for AzureAdTokenSource {
    async fn fetch_token(&self) -> anyhow::Result<AccessToken> {
        log::debug!("Requesting token from {} for client {}", self.token_url, self.client_id);

        let response = self
            .http_client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        log::debug!("Token request status: {}", status);

        let body = response.text().await?;
        if !status.is_success() {
            anyhow::bail!("Token request failed with status {}: {}", status, body);
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| anyhow::anyhow!("Invalid token response: {}", e))?;

        Ok(AccessToken {
            access_token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }
}
