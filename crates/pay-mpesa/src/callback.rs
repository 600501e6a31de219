//! # STK Push Callbacks
//!
//! Handling of the asynchronous payment result the gateway posts to
//! `CallBackURL`. The payload format belongs to the gateway; it is recorded
//! as-is and, when it has the usual `Body.stkCallback` shape, also parsed so
//! handlers get typed access to the outcome.
//!
//! Dispatch never fails. The HTTP layer always acknowledges with 200,
//! otherwise the gateway keeps redelivering.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Parsed `Body.stkCallback` section of a callback
#[derive(Debug, Clone, PartialEq)]
pub struct StkCallback {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    /// `0` means the payer completed the payment
    pub result_code: i64,
    pub result_desc: String,
    /// `CallbackMetadata.Item` entries keyed by `Name`
    pub metadata: HashMap<String, Value>,
}

impl StkCallback {
    /// Parse from a callback body, `None` if it does not look like an STK callback
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let envelope = Envelope::deserialize(payload).ok()?;
        let raw = envelope.body.stk_callback;

        let result_code = match &raw.result_code {
            Value::Number(n) => n.as_i64()?,
            Value::String(s) => s.trim().parse().ok()?,
            _ => return None,
        };

        let metadata = raw
            .callback_metadata
            .map(|m| m.items.into_iter().map(|i| (i.name, i.value)).collect())
            .unwrap_or_default();

        Some(Self {
            merchant_request_id: raw.merchant_request_id,
            checkout_request_id: raw.checkout_request_id,
            result_code,
            result_desc: raw.result_desc,
            metadata,
        })
    }

    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }

    pub fn amount(&self) -> Option<f64> {
        self.metadata.get("Amount").and_then(Value::as_f64)
    }

    pub fn receipt_number(&self) -> Option<&str> {
        self.metadata.get("MpesaReceiptNumber").and_then(Value::as_str)
    }

    /// Payer phone number as the gateway reported it
    pub fn phone_number(&self) -> Option<String> {
        self.metadata.get("PhoneNumber").map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// `YYYYMMDDHHmmss` as sent by the gateway
    pub fn transaction_date(&self) -> Option<String> {
        self.metadata.get("TransactionDate").map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// Callback handler trait
///
/// Implement this trait to act on payment results. Every method has a
/// logging default.
pub trait CallbackHandler: Send + Sync {
    /// Called when the payer completed the payment
    fn on_payment_completed(&self, callback: &StkCallback) {
        info!(
            "Payment completed: checkout_request_id={}, receipt={:?}, amount={:?}",
            callback.checkout_request_id,
            callback.receipt_number(),
            callback.amount()
        );
    }

    /// Called when the payment was cancelled, timed out or declined
    fn on_payment_failed(&self, callback: &StkCallback) {
        warn!(
            "Payment failed: checkout_request_id={}, result_code={}, result_desc={}",
            callback.checkout_request_id, callback.result_code, callback.result_desc
        );
    }

    /// Called for JSON bodies without a recognizable `stkCallback`
    fn on_unrecognized(&self, payload: &Value) {
        warn!("Unrecognized callback payload: {}", payload);
    }

    /// Called for bodies that are not JSON at all
    fn on_malformed(&self, body: &str) {
        warn!("Malformed callback body: {:?}", body);
    }
}

/// Default handler (just logs callbacks)
pub struct LoggingCallbackHandler;

impl CallbackHandler for LoggingCallbackHandler {}

/// Record a parsed callback body and route it to the handler
pub fn dispatch_callback(handler: &dyn CallbackHandler, payload: &Value) {
    info!("M-Pesa callback received: {}", payload);

    match StkCallback::from_payload(payload) {
        Some(callback) if callback.is_success() => handler.on_payment_completed(&callback),
        Some(callback) => handler.on_payment_failed(&callback),
        None => handler.on_unrecognized(payload),
    }
}

/// Record a raw callback body, whatever it contains
pub fn dispatch_callback_body(handler: &dyn CallbackHandler, body: &[u8]) {
    match serde_json::from_slice::<Value>(body) {
        Ok(payload) => dispatch_callback(handler, &payload),
        Err(e) => {
            debug!("Callback body is not JSON: {}", e);
            handler.on_malformed(&String::from_utf8_lossy(body));
        }
    }
}

/// Check the shared secret a callback URL was registered with
pub fn verify_callback_secret(expected: &str, provided: Option<&str>) -> bool {
    provided.is_some_and(|p| constant_time_compare(p, expected))
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Body")]
    body: EnvelopeBody,
}

#[derive(Debug, Deserialize)]
struct EnvelopeBody {
    #[serde(rename = "stkCallback")]
    stk_callback: RawStkCallback,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawStkCallback {
    #[serde(rename = "MerchantRequestID")]
    merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    checkout_request_id: String,
    result_code: Value,
    #[serde(default)]
    result_desc: String,
    #[serde(default)]
    callback_metadata: Option<RawMetadata>,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(rename = "Item", default)]
    items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value", default)]
    value: Value,
}
