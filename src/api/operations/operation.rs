//! Operations that can be sent together in a `$batch` request

use crate::api::constants;
use reqwest::Method;
use serde_json::{json, Value};

/// One unit of work destined for a batch.
///
/// Paths are relative to the Web API root (`accounts(<id>)`, `contacts`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOperation {
    method: Method,
    path: String,
    body: Option<Value>,
    content_id: Option<String>,
}

impl BatchOperation {
    pub fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
            content_id: None,
        }
    }

    /// Read a record or collection
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path, None)
    }

    pub fn create(entity_set: impl Into<String>, data: Value) -> Self {
        Self::new(Method::POST, entity_set, Some(data))
    }

    pub fn update(entity_set: &str, id: &str, data: Value) -> Self {
        Self::new(Method::PATCH, constants::record_path(entity_set, id), Some(data))
    }

    pub fn delete(entity_set: &str, id: &str) -> Self {
        Self::new(Method::DELETE, constants::record_path(entity_set, id), None)
    }

    /// Link `related_url` (absolute) to `parent` through `navigation_property`
    pub fn associate(parent: &str, navigation_property: &str, related_url: &str) -> Self {
        Self::new(
            Method::POST,
            constants::reference_path(parent, navigation_property),
            Some(json!({ "@odata.id": related_url })),
        )
    }

    /// Unlink a record; pass `related_key` for collection-valued navigation properties
    pub fn disassociate(
        parent: &str,
        navigation_property: &str,
        related_key: Option<&str>,
    ) -> Self {
        Self::new(
            Method::DELETE,
            constants::disassociate_path(parent, navigation_property, related_key),
            None,
        )
    }

    /// Tag the operation so its result can be correlated
    pub fn with_content_id(mut self, content_id: impl ToString) -> Self {
        self.content_id = Some(content_id.to_string());
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }
}

/// Outcome of one recognised part of a batch response
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub content_id: Option<String>,
    pub success: bool,
    pub status_code: u16,
    pub entity_set: Option<String>,
    pub records: Option<Vec<Value>>,
    pub error_body: Option<String>,
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn is_error(&self) -> bool {
        !self.success
    }
}
