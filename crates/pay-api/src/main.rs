//! # stkpush
//!
//! M-Pesa STK Push payment API.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export CONSUMER_KEY=...
//! export CONSUMER_SECRET=...
//! export SHORTCODE=174379
//! export PASSKEY=...
//! export CALLBACK_URL=https://example.com/mpesa/callback
//!
//! # Run the server
//! stkpush
//! ```

use pay_api::{routes, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Fails fast on missing configuration
    let state = AppState::from_env()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Payment provider: {}", state.gateway.provider_name());
    if state.config.callback_secret.is_none() {
        info!("CALLBACK_SECRET not set, callbacks are accepted unauthenticated");
    }

    let app = routes::create_router(state);

    info!("STK Push API starting on http://{}", addr);

    if !is_prod {
        info!("Push: POST http://{}/stkpush", addr);
        info!("Callback: POST http://{}/mpesa/callback", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
