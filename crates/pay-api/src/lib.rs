//! # pay-api
//!
//! HTTP API layer for stkpush-rs.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - STK push initiation endpoint
//! - Callback endpoint for payment results
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/` | Landing page |
//! | GET | `/health` | Health check |
//! | POST | `/stkpush` | Initiate STK push |
//! | POST | `/mpesa/callback` | M-Pesa result callback |

pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
