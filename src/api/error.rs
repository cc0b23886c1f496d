//! Error taxonomy for Web API calls

use serde_json::Value;
use thiserror::Error;

/// A non-2xx answer from the endpoint.
///
/// `raw_body` is kept exactly as the server sent it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Dynamics 365 request failed with status {status_code}: {raw_body}")]
pub struct ClientError {
    pub status_code: u16,
    pub raw_body: String,
}

/// Error payload returned by Dataverse: `{"error":{"code":"...","message":"..."}}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ODataError {
    pub code: String,
    pub message: String,
}

impl ClientError {
    pub fn new(status_code: u16, raw_body: impl Into<String>) -> Self {
        Self {
            status_code,
            raw_body: raw_body.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code == 404
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status_code == 401 || self.status_code == 403
    }

    /// Extract the structured OData error from the body, if it has one
    pub fn odata_error(&self) -> Option<ODataError> {
        let json: Value = serde_json::from_str(&self.raw_body).ok()?;
        let error = json.get("error")?;
        let message = error.get("message").and_then(|m| m.as_str())?;
        let code = error.get("code").and_then(|c| c.as_str()).unwrap_or("Unknown");

        Some(ODataError {
            code: code.to_string(),
            message: message.to_string(),
        })
    }
}

/// Every failure a Web API call can surface
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network or timeout failure, passed through untouched
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Authentication failed: {0:#}")]
    Authentication(#[source] anyhow::Error),

    /// 2xx body that does not have the declared shape
    #[error("Failed to parse response: {source}")]
    Parse {
        #[source]
        source: anyhow::Error,
        body: String,
    },

    #[error("Failed to serialize request body: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub(crate) fn parse(source: impl Into<anyhow::Error>, body: impl Into<String>) -> Self {
        Self::Parse {
            source: source.into(),
            body: body.into(),
        }
    }

    /// The HTTP status of a [`ClientError`], if this is one
    pub fn status_code(&self) -> Option<u16> {
        self.client_error().map(|e| e.status_code)
    }

    pub fn client_error(&self) -> Option<&ClientError> {
        match self {
            Self::Client(error) => Some(error),
            _ => None,
        }
    }
}
