//! Integration tests for the Web API client, run against a mock server
//!
//! - auth: credential providers wired into the client
//! - queries: reads, paging and error mapping
//! - operations: writes, relationships and $batch

mod auth;
mod queries;

use dynamics_odata::api::{BasicCredentials, DynamicsClient};
use std::sync::Arc;
use wiremock::MockServer;

/// `Basic` header for admin:pw
pub const BASIC_HEADER: &str = "Basic YWRtaW46cHc=";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn client_for(server: &MockServer) -> DynamicsClient {
    init_logging();
    DynamicsClient::with_http_client(
        server.uri(),
        reqwest::Client::new(),
        Arc::new(BasicCredentials::new("admin", "pw")),
    )
}

pub fn api_path(path: &str) -> String {
    format!("/api/data/v9.2/{}", path)
}
