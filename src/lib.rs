//! Client library for the Dynamics 365 / Dataverse Web API (OData v4).

pub mod api;
pub mod config;

pub use api::{ApiError, ApiResult, BatchOperation, BatchResult, ClientError, DynamicsClient};
pub use config::{AuthSettings, ClientConfig};
