//! # pay-core
//!
//! Core types and traits for the stkpush-rs payment adapter.
//!
//! This crate provides:
//! - `PushGateway` trait for implementing push-payment providers
//! - `PaymentRequest` and its validated form `PushRequest`
//! - `PaymentError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use pay_core::{PaymentRequest, PushGateway};
//!
//! let request = PaymentRequest::new("254712345678", 100);
//! let ack = gateway.initiate_push(&request).await?;
//!
//! // The final outcome arrives later on the callback URL
//! println!("checkout request: {:?}", ack.checkout_request_id);
//! ```

pub mod error;
pub mod gateway;
pub mod payment;

// Re-exports for convenience
pub use error::{PaymentError, PaymentResult};
pub use gateway::{BoxedPushGateway, PushAcknowledgement, PushGateway};
pub use payment::{PaymentRequest, PushRequest, MAX_ACCOUNT_REFERENCE_LEN};
