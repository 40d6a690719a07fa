//! Error types for InYear

use crate::types::Metric;
use thiserror::Error;

/// Errors that can occur while talking to a health source or aggregating its samples
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("Health source unavailable: {0}")]
    Unavailable(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Health session is not initialized")]
    NotInitialized,

    #[error("Query for {metric} failed: {message}")]
    Query { metric: Metric, message: String },

    #[error("Failed to parse export payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl HealthError {
    /// Build a query failure for a single metric
    pub fn query(metric: Metric, message: impl Into<String>) -> Self {
        HealthError::Query {
            metric,
            message: message.into(),
        }
    }
}
