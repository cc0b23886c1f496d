//! Credential providers for the Web API pipeline
//!
//! The client never reads a token directly; it asks a [`CredentialProvider`]
//! for a [`Credential`] before every transport call. Two providers exist:
//! [`TokenCache`], which refreshes OAuth tokens through a [`TokenSource`], and
//! [`BasicCredentials`], which hands out a constant `Basic` header.

mod basic;
mod token_cache;
mod token_source;

pub use basic::BasicCredentials;
pub use token_cache::TokenCache;
pub use token_source::{AccessToken, AzureAdTokenSource, TokenSource};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

use super::error::ApiError;

/// Authorization scheme of a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Bearer,
    Basic,
}

/// A credential ready to be put in an `Authorization` header.
///
/// Credentials are immutable; a refresh installs a new one.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    /// Already includes the safety margin. `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub scheme: Scheme,
}

impl Credential {
    pub fn bearer(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(expires_at),
            scheme: Scheme::Bearer,
        }
    }

    pub fn basic(encoded: impl Into<String>) -> Self {
        Self {
            token: encoded.into(),
            expires_at: None,
            scheme: Scheme::Basic,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now < expires_at,
            None => true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Value for the `Authorization` header
    pub fn header_value(&self) -> String {
        match self.scheme {
            Scheme::Bearer => format!("Bearer {}", self.token),
            Scheme::Basic => format!("Basic {}", self.token),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("scheme", &self.scheme)
            .finish()
    }
}

/// Supplies a valid credential to the request pipeline
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Get a credential that is valid right now.
    ///
    /// Implementations refresh if needed; failures surface as [`ApiError::Authentication`].
    async fn acquire(&self) -> Result<Credential, ApiError>;
}
