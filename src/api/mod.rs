//! Dynamics 365 Web API Module
//!
//! Typed, authenticated access to a Dynamics 365 / Dataverse OData v4
//! endpoint: single-record CRUD, relationship management and `$batch`.

pub mod auth;
pub mod client;
pub mod constants;
pub mod context;
pub mod error;
pub mod logging;
pub mod models;
pub mod operations;
pub mod payload;

pub use auth::{
    AccessToken, AzureAdTokenSource, BasicCredentials, Credential, CredentialProvider, Scheme,
    TokenCache, TokenSource,
};
pub use client::{Directives, DynamicsClient};
pub use context::entity_set_name;
pub use error::{ApiError, ApiResult, ClientError, ODataError};
pub use logging::{ApiLogger, LogConfig, LogLevel};
pub use models::EntityCollection;
pub use operations::{
    BatchOperation, BatchRequest, BatchRequestBuilder, BatchResponseParser, BatchResult,
};
