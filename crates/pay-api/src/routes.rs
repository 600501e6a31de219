//! # Routes
//!
//! Axum router configuration for the STK push API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - GET  / - Landing page
/// - GET  /health - Health check
/// - POST /stkpush - Initiate an STK push
/// - POST /mpesa/callback - Gateway result callback (always 200)
pub fn create_router(state: AppState) -> Router {
    // Browser clients call /stkpush directly
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/stkpush", post(handlers::stk_push))
        .layer(cors);

    // Gateway callbacks (no CORS, raw body)
    let callback_routes = Router::new().route("/callback", post(handlers::mpesa_callback));

    Router::new()
        .route("/", get(handlers::landing))
        .route("/health", get(handlers::health))
        .merge(api_routes)
        .nest("/mpesa", callback_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
