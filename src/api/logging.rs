//! Structured logging with correlation tracking for Web API calls
//!
//! Every pipeline call gets a correlation ID and emits JSON payloads through
//! the `log` facade when it starts, completes, or fails. Where the records end
//! up is decided by whichever logger the host installs.

use super::error::ApiError;
use log::{debug, info, trace, warn};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Logging configuration for the pipeline
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub request_logging: bool,
    pub log_level: LogLevel,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            request_logging: true,
            log_level: LogLevel::Info,
        }
    }
}

/// Structured logger for API operations
#[derive(Debug, Clone, Default)]
pub struct ApiLogger {
    config: LogConfig,
}

/// Context for a single API operation
#[derive(Debug, Clone)]
pub struct OperationContext {
    /// Unique correlation ID for this operation
    pub correlation_id: String,
    pub method: String,
    pub path: String,
    /// Start time for performance tracking
    pub start_time: Instant,
}

impl ApiLogger {
    pub fn new(config: LogConfig) -> Self {
        Self { config }
    }

    /// Start tracking a new operation
    pub fn start_operation(&self, method: &str, path: &str) -> OperationContext {
        let context = OperationContext {
            correlation_id: uuid::Uuid::new_v4().to_string(),
            method: method.to_string(),
            path: path.to_string(),
            start_time: Instant::now(),
        };

        if self.config.request_logging && self.should_log(LogLevel::Debug) {
            let log_data = json!({
                "event": "operation_started",
                "correlation_id": context.correlation_id,
                "method": context.method,
                "path": context.path,
                "timestamp": chrono::Utc::now().to_rfc3339()
            });

            debug!("API Operation Started: {}", log_data);
        }

        context
    }

    /// Log a finished exchange with a 2xx status
    pub fn complete_operation(&self, context: &OperationContext, status_code: u16) {
        if !self.config.request_logging || !self.should_log(LogLevel::Debug) {
            return;
        }

        let log_data = json!({
            "event": "operation_completed",
            "correlation_id": context.correlation_id,
            "method": context.method,
            "path": context.path,
            "status_code": status_code,
            "duration_ms": context.elapsed().as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        debug!("API Operation Completed: {}", log_data);
    }

    /// Log a failed exchange
    pub fn fail_operation(&self, context: &OperationContext, error: &ApiError) {
        if !self.should_log(LogLevel::Warn) {
            return;
        }

        let log_data = json!({
            "event": "operation_failed",
            "correlation_id": context.correlation_id,
            "method": context.method,
            "path": context.path,
            "status_code": error.status_code(),
            "error_message": error.to_string(),
            "duration_ms": context.elapsed().as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        warn!("API Operation Failed: {}", log_data);
    }

    /// Log batch operation details
    pub fn log_batch_operation(
        &self,
        operation_count: usize,
        result_count: usize,
        failure_count: usize,
        duration: Duration,
    ) {
        if !self.should_log(LogLevel::Info) {
            return;
        }

        let log_data = json!({
            "event": "batch_operation_completed",
            "operation_count": operation_count,
            "result_count": result_count,
            "failure_count": failure_count,
            "duration_ms": duration.as_millis(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        info!("Batch Operation Completed: {}", log_data);
    }

    /// Log request headers at trace level, with secrets redacted
    pub fn log_headers(&self, context: &OperationContext, headers: &HashMap<String, String>) {
        if self.config.request_logging && self.should_log(LogLevel::Trace) {
            trace!(
                "Request headers for {}: {:?}",
                context.correlation_id,
                Self::sanitize_headers(headers)
            );
        }
    }

    /// Check if we should log at the given level
    fn should_log(&self, level: LogLevel) -> bool {
        match (self.config.log_level, level) {
            (LogLevel::Error, LogLevel::Error) => true,
            (LogLevel::Warn, LogLevel::Error | LogLevel::Warn) => true,
            (LogLevel::Info, LogLevel::Error | LogLevel::Warn | LogLevel::Info) => true,
            (
                LogLevel::Debug,
                LogLevel::Error | LogLevel::Warn | LogLevel::Info | LogLevel::Debug,
            ) => true,
            (LogLevel::Trace, _) => true,
            _ => false,
        }
    }

    /// Sanitize headers to remove sensitive information
    fn sanitize_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
        headers
            .iter()
            .map(|(key, value)| {
                let key_lower = key.to_lowercase();
                if key_lower.contains("authorization")
                    || key_lower.contains("token")
                    || key_lower.contains("secret")
                {
                    (key.clone(), "[REDACTED]".to_string())
                } else {
                    (key.clone(), value.clone())
                }
            })
            .collect()
    }
}

impl OperationContext {
    /// Calculate elapsed time since operation started
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}
