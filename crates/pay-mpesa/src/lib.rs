//! # pay-mpesa
//!
//! M-Pesa (Safaricom Daraja) STK Push gateway for stkpush-rs.
//!
//! The gateway performs three steps per payment:
//!
//! 1. **Access token** - `GET /oauth/v1/generate` with Basic auth
//! 2. **Signed push** - `POST /mpesa/stkpush/v1/processrequest` with a
//!    password derived from shortcode, passkey and timestamp
//! 3. **Callback** - the gateway later posts the result to `CallBackURL`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pay_mpesa::MpesaStkPushGateway;
//! use pay_core::{PaymentRequest, PushGateway};
//!
//! // Create gateway from environment
//! let gateway = MpesaStkPushGateway::from_env()?;
//!
//! let ack = gateway
//!     .initiate_push(&PaymentRequest::new("254712345678", 100))
//!     .await?;
//! ```
//!
//! ## Callback Handling
//!
//! ```rust,ignore
//! use pay_mpesa::{dispatch_callback, CallbackHandler, StkCallback};
//!
//! struct MyHandler;
//!
//! impl CallbackHandler for MyHandler {
//!     fn on_payment_completed(&self, callback: &StkCallback) {
//!         println!("Paid: {:?}", callback.receipt_number());
//!     }
//! }
//!
//! // In your callback endpoint:
//! dispatch_callback(&MyHandler, &payload);
//! ```

pub mod auth;
pub mod callback;
pub mod config;
pub mod password;
pub mod stk_push;

// Re-exports
pub use auth::{AccessToken, AccessTokenSource};
pub use callback::{
    dispatch_callback, dispatch_callback_body, verify_callback_secret, CallbackHandler,
    LoggingCallbackHandler, StkCallback,
};
pub use config::{MpesaConfig, MpesaEnvironment, TransactionType};
pub use password::{derive_password, format_timestamp};
pub use stk_push::{MpesaStkPushGateway, StkPushPayload};
