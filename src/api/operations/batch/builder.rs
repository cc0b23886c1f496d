//! Dynamics 365 $batch request builder
//!
//! Builds the multipart/mixed body for Web API batch requests following
//! the OData v4.0 batch format. Every operation becomes one
//! `application/http` part carrying an absolute request URL.

use crate::api::constants::{self, headers};
use crate::api::operations::BatchOperation;
use crate::api::payload;
use reqwest::Method;
use uuid::Uuid;

const CRLF: &str = "\r\n";

/// Builder for creating Dynamics 365 $batch requests
pub struct BatchRequestBuilder {
    batch_id: String,
    base_url: String,
    api_suffix: String,
    operations: Vec<BatchOperation>,
}

impl BatchRequestBuilder {
    /// Create a new batch request builder with a fresh boundary
    pub fn new(base_url: impl Into<String>, api_suffix: impl Into<String>) -> Self {
        Self {
            batch_id: format!("batch_{}", Uuid::new_v4()),
            base_url: base_url.into(),
            api_suffix: api_suffix.into(),
            operations: Vec::new(),
        }
    }

    pub fn add_operation(mut self, operation: BatchOperation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn add_operations<'a>(
        mut self,
        operations: impl IntoIterator<Item = &'a BatchOperation>,
    ) -> Self {
        self.operations.extend(operations.into_iter().cloned());
        self
    }

    /// Get the batch boundary ID (for testing)
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    /// Build the complete batch request body
    pub fn build(self) -> BatchRequest {
        let mut body = String::new();

        for operation in &self.operations {
            body.push_str(&format!("--{}{}", self.batch_id, CRLF));
            body.push_str(&format!("Content-Type: {}{}", constants::PART_CONTENT_TYPE, CRLF));
            body.push_str(&format!("{}: binary{}", headers::CONTENT_TRANSFER_ENCODING, CRLF));
            if let Some(content_id) = operation.content_id() {
                body.push_str(&format!("{}: {}{}", headers::CONTENT_ID, content_id, CRLF));
            }
            body.push_str(CRLF);

            // HTTP request line
            let url = constants::absolute_url(&self.base_url, &self.api_suffix, operation.path());
            body.push_str(&format!("{} {} HTTP/1.1{}", operation.method(), url, CRLF));

            // Headers
            for (name, value) in Self::part_headers(operation) {
                body.push_str(&format!("{}: {}{}", name, value, CRLF));
            }
            body.push_str(CRLF);

            if let Some(data) = operation.body() {
                body.push_str(&payload::compact(data).to_string());
                body.push_str(CRLF);
            }
        }

        // End batch
        body.push_str(&format!("--{}--{}", self.batch_id, CRLF));

        BatchRequest {
            content_type: format!("{}; boundary={}", constants::BATCH_CONTENT_TYPE, self.batch_id),
            boundary: self.batch_id,
            body,
        }
    }

    /// Headers of the embedded request, chosen by its method and body
    fn part_headers(operation: &BatchOperation) -> Vec<(&'static str, &'static str)> {
        let mut part_headers = vec![
            ("Accept", headers::CONTENT_TYPE_JSON),
            (headers::ODATA_MAX_VERSION_HEADER, headers::ODATA_VERSION),
            (headers::ODATA_VERSION_HEADER, headers::ODATA_VERSION),
        ];
        if *operation.method() == Method::GET {
            part_headers.push((headers::PREFER, headers::PREFER_INCLUDE_ANNOTATIONS));
        }
        if operation.body().is_some() {
            part_headers.push(("Content-Type", headers::CONTENT_TYPE_JSON));
        }
        part_headers
    }
}

/// Complete batch request ready to send
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub content_type: String,
    pub boundary: String,
    pub body: String,
}

impl BatchRequest {
    /// Get the Content-Type header value
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Get the request body
    pub fn body(&self) -> &str {
        &self.body
    }
}
