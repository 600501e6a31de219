//! # Push Gateway Trait
//!
//! Seam between the HTTP layer and a push-payment provider.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PushGateway (trait)                      │
//! │  ├── initiate_push()                                        │
//! │  └── provider_name()                                        │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                    ┌───────┴───────┐
//!                    │ MpesaStkPush  │
//!                    │    Gateway    │
//!                    └───────────────┘
//! ```

use crate::error::PaymentResult;
use crate::payment::PaymentRequest;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// A provider able to trigger a payment prompt on the payer's device.
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// Validate the request, then submit it to the provider.
    ///
    /// Validation failures must return before any outbound call is made.
    ///
    /// # Returns
    /// The provider's synchronous acknowledgement. This is not the final
    /// payment outcome, which arrives later through a callback.
    async fn initiate_push(&self, request: &PaymentRequest) -> PaymentResult<PushAcknowledgement>;

    /// Get the provider name (for logging and routing).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared gateway (dynamic dispatch)
pub type BoxedPushGateway = Arc<dyn PushGateway>;

/// Synchronous acknowledgement of an accepted push request
#[derive(Debug, Clone, Serialize)]
pub struct PushAcknowledgement {
    /// Provider name
    pub provider: String,
    /// Request ID assigned by the provider, used to correlate the callback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_request_id: Option<String>,
    /// Message the provider wants shown to the customer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_message: Option<String>,
    /// Response body exactly as the provider returned it
    pub raw: serde_json::Value,
}
