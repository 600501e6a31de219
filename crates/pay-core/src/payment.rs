//! # Payment Requests
//!
//! Inbound payment-initiation requests and their validated form.

use crate::error::{PaymentError, PaymentResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Longest account reference the gateway accepts
pub const MAX_ACCOUNT_REFERENCE_LEN: usize = 12;

/// Payment initiation request as sent by API callers.
///
/// Fields are kept loose so that a missing or falsy value surfaces as a
/// validation error instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentRequest {
    /// Payer phone number (string or number)
    #[serde(default)]
    pub phone: Option<Value>,
    /// Amount to charge (number or numeric string)
    #[serde(default)]
    pub amount: Option<Value>,
    /// Optional account reference shown to the payer
    #[serde(
        default,
        rename = "accountReference",
        alias = "account_reference",
        alias = "name"
    )]
    pub account_reference: Option<String>,
}

impl PaymentRequest {
    pub fn new(phone: impl Into<String>, amount: u64) -> Self {
        Self {
            phone: Some(Value::String(phone.into())),
            amount: Some(Value::from(amount)),
            account_reference: None,
        }
    }

    pub fn with_account_reference(mut self, reference: impl Into<String>) -> Self {
        self.account_reference = Some(reference.into());
        self
    }

    /// Validate caller input into a [`PushRequest`].
    pub fn validate(&self) -> PaymentResult<PushRequest> {
        let (phone, amount) = match (&self.phone, &self.amount) {
            (Some(p), Some(a)) if !is_falsy(p) && !is_falsy(a) => (p, a),
            _ => return Err(PaymentError::validation("Phone and amount are required")),
        };

        let phone = parse_phone(phone)?;
        let amount = parse_amount(amount)?;

        let account_reference = match self.account_reference.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(r) if r.chars().count() > MAX_ACCOUNT_REFERENCE_LEN => {
                return Err(PaymentError::validation(format!(
                    "accountReference must be at most {} characters",
                    MAX_ACCOUNT_REFERENCE_LEN
                )));
            }
            Some(r) => Some(r.to_string()),
        };

        Ok(PushRequest {
            phone,
            amount,
            account_reference,
        })
    }
}

/// A validated push request, ready to be signed and sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushRequest {
    /// Digits only, no leading `+`
    pub phone: String,
    /// Whole units of the gateway currency
    pub amount: u64,
    pub account_reference: Option<String>,
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn parse_phone(value: &Value) -> PaymentResult<String> {
    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return Err(PaymentError::validation("phone must be a string")),
    };

    let digits = raw.strip_prefix('+').unwrap_or(&raw);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(PaymentError::validation(format!(
            "phone must contain digits only: {}",
            raw
        )));
    }

    Ok(digits.to_string())
}

fn parse_amount(value: &Value) -> PaymentResult<u64> {
    let invalid = || PaymentError::validation("amount must be a positive whole number");

    let amount = match value {
        Value::Number(n) => match n.as_u64() {
            Some(a) => a,
            None => {
                let f = n.as_f64().ok_or_else(invalid)?;
                if f <= 0.0 || f.fract() != 0.0 || f > u64::MAX as f64 {
                    return Err(invalid());
                }
                f as u64
            }
        },
        Value::String(s) => s.trim().parse::<u64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };

    if amount == 0 {
        return Err(invalid());
    }
    Ok(amount)
}
