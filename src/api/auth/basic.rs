use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::{Credential, CredentialProvider};
use crate::api::error::ApiError;

/// Static `Basic` credentials, encoded once at construction
#[derive(Debug, Clone)]
pub struct BasicCredentials {
    credential: Credential,
}

impl BasicCredentials {
    pub fn new(username: &str, password: &str) -> Self {
        let encoded = STANDARD.encode(format!("{}:{}", username, password));
        Self {
            credential: Credential::basic(encoded),
        }
    }
}

#[async_trait]
impl CredentialProvider for BasicCredentials {
    async fn acquire(&self) -> Result<Credential, ApiError> {
        Ok(self.credential.clone())
    }
}
