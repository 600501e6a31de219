//! # M-Pesa STK Push
//!
//! Implementation of the Daraja Lipa Na M-Pesa Online (STK Push) API.
//! This is the only payment flow the adapter offers.

use crate::auth::{transport_message, AccessTokenSource};
use crate::config::MpesaConfig;
use crate::password::{derive_password, format_timestamp};
use async_trait::async_trait;
use chrono::Utc;
use pay_core::{
    PaymentError, PaymentRequest, PaymentResult, PushAcknowledgement, PushGateway, PushRequest,
};
use reqwest::{header::AUTHORIZATION, Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// M-Pesa STK Push gateway
///
/// Each push fetches an access token (unless caching is enabled), signs the
/// request and submits it once. No retries.
pub struct MpesaStkPushGateway {
    config: Arc<MpesaConfig>,
    client: Client,
    tokens: AccessTokenSource,
}

impl MpesaStkPushGateway {
    /// Create a new gateway with its own connection pool
    pub fn new(config: MpesaConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                PaymentError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        let config = Arc::new(config);
        let tokens = AccessTokenSource::new(Arc::clone(&config), client.clone());

        Ok(Self {
            config,
            client,
            tokens,
        })
    }

    /// Create from environment variables
    pub fn from_env() -> PaymentResult<Self> {
        let config = MpesaConfig::from_env()?;
        Self::new(config)
    }

    /// Build the signed request body for a validated push
    pub fn build_payload(&self, request: &PushRequest, timestamp: &str) -> StkPushPayload {
        let account_reference = request
            .account_reference
            .as_ref()
            .filter(|_| self.config.allow_account_reference_override)
            .unwrap_or(&self.config.default_account_reference)
            .clone();

        StkPushPayload {
            business_short_code: self.config.shortcode.clone(),
            password: derive_password(&self.config.shortcode, &self.config.passkey, timestamp),
            timestamp: timestamp.to_string(),
            transaction_type: self.config.transaction_type.as_str().to_string(),
            amount: request.amount,
            party_a: request.phone.clone(),
            party_b: self.config.party_b.clone(),
            phone_number: request.phone.clone(),
            callback_url: self.config.callback_url.clone(),
            account_reference,
            transaction_desc: self.config.transaction_desc.clone(),
        }
    }
}

#[async_trait]
impl PushGateway for MpesaStkPushGateway {
    #[instrument(skip(self, request))]
    async fn initiate_push(&self, request: &PaymentRequest) -> PaymentResult<PushAcknowledgement> {
        let request = request.validate()?;

        let token = self.tokens.access_token().await?;

        let timestamp = format_timestamp(Utc::now());
        let payload = self.build_payload(&request, &timestamp);

        info!(
            "Sending STK push to {} for {} ({})",
            mask_phone(&request.phone),
            request.amount,
            payload.transaction_type
        );

        let response = self
            .client
            .post(self.config.stk_push_url())
            .header(AUTHORIZATION, token.bearer_header())
            .json(&payload)
            .send()
            .await
            .map_err(|e| PaymentError::UpstreamPush {
                message: transport_message(&e, self.config.timeout),
                details: None,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::UpstreamPush {
                message: transport_message(&e, self.config.timeout),
                details: None,
            })?;

        if !status.is_success() {
            error!("STK push rejected: status={}, body={}", status, body);

            if status == StatusCode::UNAUTHORIZED {
                self.tokens.invalidate().await;
            }

            let details = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
            let message = match details.get("errorMessage").and_then(Value::as_str) {
                Some(m) => format!("HTTP {}: {}", status, m),
                None => format!("HTTP {}", status),
            };

            return Err(PaymentError::UpstreamPush {
                message,
                details: Some(details),
            });
        }

        let raw = serde_json::from_str::<Value>(&body).unwrap_or(Value::String(body));
        let field = |name: &str| raw.get(name).and_then(Value::as_str).map(String::from);

        let ack = PushAcknowledgement {
            provider: self.provider_name().to_string(),
            checkout_request_id: field("CheckoutRequestID"),
            merchant_request_id: field("MerchantRequestID"),
            customer_message: field("CustomerMessage"),
            raw: raw.clone(),
        };

        debug!("STK push response code: {:?}", field("ResponseCode"));
        info!(
            "STK push accepted: checkout_request_id={:?}",
            ack.checkout_request_id
        );

        Ok(ack)
    }

    fn provider_name(&self) -> &'static str {
        "mpesa"
    }
}

// =============================================================================
// Daraja API Types
// =============================================================================

/// Signed STK push request body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StkPushPayload {
    pub business_short_code: String,
    pub password: String,
    pub timestamp: String,
    pub transaction_type: String,
    pub amount: u64,
    pub party_a: String,
    pub party_b: String,
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    pub account_reference: String,
    pub transaction_desc: String,
}

/// Keep the country prefix and the last three digits
fn mask_phone(phone: &str) -> String {
    if phone.len() <= 6 {
        return "*".repeat(phone.len());
    }
    let (head, rest) = phone.split_at(3);
    let tail = &rest[rest.len() - 3..];
    format!("{}{}{}", head, "*".repeat(rest.len() - 3), tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransactionType;
    use serde_json::json;

    const PASSKEY: &str = "bfb279f9aa9bdbcf158e97dd71a467cd2e0c893059b10f78e6b72ada1ed2c919";

    fn gateway(config: MpesaConfig) -> MpesaStkPushGateway {
        MpesaStkPushGateway::new(config).unwrap()
    }

    fn config() -> MpesaConfig {
        MpesaConfig::new(
            "key",
            "secret",
            "174379",
            PASSKEY,
            "https://example.com/mpesa/callback",
        )
    }

    fn push(reference: Option<&str>) -> PushRequest {
        PushRequest {
            phone: "254712345678".to_string(),
            amount: 100,
            account_reference: reference.map(String::from),
        }
    }

    #[test]
    fn test_payload_wire_format() {
        let payload = gateway(config()).build_payload(&push(None), "20240102030405");
        let body = serde_json::to_value(&payload).unwrap();

        assert_eq!(
            body,
            json!({
                "BusinessShortCode": "174379",
                "Password": derive_password("174379", PASSKEY, "20240102030405"),
                "Timestamp": "20240102030405",
                "TransactionType": "CustomerPayBillOnline",
                "Amount": 100,
                "PartyA": "254712345678",
                "PartyB": "174379",
                "PhoneNumber": "254712345678",
                "CallBackURL": "https://example.com/mpesa/callback",
                "AccountReference": "Payment",
                "TransactionDesc": "Payment"
            })
        );
    }

    #[test]
    fn test_buy_goods_uses_configured_party_b() {
        let config = config()
            .with_transaction_type(TransactionType::CustomerBuyGoodsOnline)
            .with_party_b("5551234");
        let payload = gateway(config).build_payload(&push(None), "20240102030405");

        assert_eq!(payload.transaction_type, "CustomerBuyGoodsOnline");
        assert_eq!(payload.party_b, "5551234");
        assert_eq!(payload.business_short_code, "174379");
    }

    #[test]
    fn test_account_reference_override() {
        let gw = gateway(config().with_default_account_reference("Quicktel"));
        assert_eq!(
            gw.build_payload(&push(Some("INV-7")), "20240102030405")
                .account_reference,
            "INV-7"
        );
        assert_eq!(
            gw.build_payload(&push(None), "20240102030405")
                .account_reference,
            "Quicktel"
        );

        let fixed = gateway(
            config()
                .with_default_account_reference("Quicktel")
                .with_account_reference_override(false),
        );
        assert_eq!(
            fixed
                .build_payload(&push(Some("INV-7")), "20240102030405")
                .account_reference,
            "Quicktel"
        );
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("254712345678"), "254******678");
        assert_eq!(mask_phone("12345"), "*****");
    }
}
