//! # Request Handlers
//!
//! Axum request handlers for the STK push API.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    Json,
};
use pay_core::{PaymentError, PaymentRequest};
use pay_mpesa::{dispatch_callback_body, verify_callback_secret};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Successful STK push response
#[derive(Debug, Serialize)]
pub struct StkPushResponse {
    pub success: bool,
    pub message: String,
    /// Correlates this request with the later callback
    #[serde(rename = "checkoutRequestId", skip_serializing_if = "Option::is_none")]
    pub checkout_request_id: Option<String>,
    /// Gateway acknowledgement, verbatim
    pub data: serde_json::Value,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Query parameters accepted on the callback URL
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub secret: Option<String>,
}

fn payment_error_to_response(err: PaymentError) -> (StatusCode, Json<ErrorResponse>) {
    let code = err.status_code();
    let mut response = ErrorResponse::new(err.to_string(), code);
    if let Some(details) = err.details() {
        response = response.with_details(details);
    }
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

fn callback_ack() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(serde_json::json!({ "status": "OK" })))
}

// =============================================================================
// Handlers
// =============================================================================

/// Landing page
pub async fn landing() -> impl IntoResponse {
    Html(
        r#"<!DOCTYPE html>
<html>
<head><title>STK Push API</title></head>
<body style="font-family: system-ui; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background: #0b3d2e;">
    <div style="background: white; padding: 60px; border-radius: 16px; text-align: center;">
        <h1>STK Push API</h1>
        <p style="color: #666;">POST <code>/stkpush</code> with <code>{"phone": "2547XXXXXXXX", "amount": 100}</code></p>
    </div>
</body>
</html>
"#,
    )
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "stkpush",
        "provider": state.gateway.provider_name(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Initiate an STK push to the payer's phone
#[instrument(skip(state, payload))]
pub async fn stk_push(
    State(state): State<AppState>,
    payload: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<Json<StkPushResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected STK push body: {}", rejection.body_text());
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                format!("Invalid request body: {}", rejection.body_text()),
                400,
            )),
        )
    })?;

    let ack = state.gateway.initiate_push(&request).await.map_err(|e| {
        if e.is_upstream() {
            error!("STK push failed: {}", e);
        } else {
            warn!("STK push rejected: {}", e);
        }
        payment_error_to_response(e)
    })?;

    Ok(Json(StkPushResponse {
        success: true,
        message: "STK push sent".to_string(),
        checkout_request_id: ack.checkout_request_id,
        data: ack.raw,
    }))
}

/// Receive the asynchronous payment result.
///
/// Always acknowledged with 200; an unacknowledged callback is redelivered
/// by the gateway.
#[instrument(skip(state, params, body), fields(bytes = body.len()))]
pub async fn mpesa_callback(
    State(state): State<AppState>,
    params: Result<Query<CallbackParams>, QueryRejection>,
    body: Bytes,
) -> impl IntoResponse {
    if let Some(expected) = &state.config.callback_secret {
        let provided = params.as_ref().ok().and_then(|q| q.secret.as_deref());
        if !verify_callback_secret(expected, provided) {
            warn!("Ignoring callback with missing or wrong secret");
            return callback_ack();
        }
    }

    info!("M-Pesa callback received");
    dispatch_callback_body(state.callbacks.as_ref(), &body);

    callback_ack()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_response() {
        let err = ErrorResponse::new("Test error", 400);
        assert_eq!(err.error, "Test error");
        assert_eq!(err.code, 400);
        assert!(err.details.is_none());
    }

    #[test]
    fn test_validation_error_conversion() {
        let err = PaymentError::validation("Phone and amount are required");
        let (status, Json(body)) = payment_error_to_response(err);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Phone and amount are required");
        assert!(body.details.is_none());
    }

    #[test]
    fn test_upstream_error_conversion() {
        let err = PaymentError::UpstreamPush {
            message: "HTTP 400".to_string(),
            details: Some(json!({ "errorCode": "400.002.02" })),
        };
        let (status, Json(body)) = payment_error_to_response(err);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.code, 500);
        assert_eq!(body.details, Some(json!({ "errorCode": "400.002.02" })));
    }
}
