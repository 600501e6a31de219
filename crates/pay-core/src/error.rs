//! # Payment Error Types
//!
//! Typed error handling for the STK push adapter.
//! All payment operations return `Result<T, PaymentError>`.

use thiserror::Error;

/// Core error type for all payment operations
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Caller input rejected before any gateway call
    #[error("{0}")]
    Validation(String),

    /// Access token could not be obtained from the gateway
    #[error("Access token request failed: {message}")]
    UpstreamAuth { message: String },

    /// Push submission was rejected or never reached the gateway
    #[error("STK Push failed: {message}")]
    UpstreamPush {
        message: String,
        /// Upstream error body, attached verbatim when the gateway sent one
        details: Option<serde_json::Value>,
    },
}

impl PaymentError {
    /// Shorthand for a validation failure
    pub fn validation(message: impl Into<String>) -> Self {
        PaymentError::Validation(message.into())
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::Configuration(_) => 500,
            PaymentError::Validation(_) => 400,
            PaymentError::UpstreamAuth { .. } => 500,
            PaymentError::UpstreamPush { .. } => 500,
        }
    }

    /// Details to surface to API callers alongside the error message
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            PaymentError::UpstreamAuth { message } => {
                Some(serde_json::Value::String(message.clone()))
            }
            PaymentError::UpstreamPush { message, details } => Some(
                details
                    .clone()
                    .unwrap_or_else(|| serde_json::Value::String(message.clone())),
            ),
            _ => None,
        }
    }

    /// True for errors raised by the upstream gateway rather than by us or the caller
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            PaymentError::UpstreamAuth { .. } | PaymentError::UpstreamPush { .. }
        )
    }
}

/// Result type alias for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;
