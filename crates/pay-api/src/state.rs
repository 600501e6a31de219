//! # Application State
//!
//! Shared state for the Axum application.
//! Contains the push gateway, the callback handler and configuration.

use anyhow::Context;
use pay_core::BoxedPushGateway;
use pay_mpesa::{CallbackHandler, LoggingCallbackHandler, MpesaStkPushGateway};
use std::sync::Arc;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Shared secret expected on `/mpesa/callback?secret=...`
    pub callback_secret: Option<String>,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT").filter(|p| !p.trim().is_empty()) {
            Some(p) => p
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got {}", p))?,
            None => 10000,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            callback_secret: lookup("CALLBACK_SECRET").filter(|s| !s.is_empty()),
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Payment gateway
    pub gateway: BoxedPushGateway,
    /// Receives gateway callbacks
    pub callbacks: Arc<dyn CallbackHandler>,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Build state from the environment, failing fast on missing settings
    pub fn from_env() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let gateway = MpesaStkPushGateway::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to initialize M-Pesa gateway: {}", e))?;

        Ok(Self::new(config, Arc::new(gateway)))
    }

    /// Create state around an existing gateway, logging callbacks
    pub fn new(config: AppConfig, gateway: BoxedPushGateway) -> Self {
        Self {
            gateway,
            callbacks: Arc::new(LoggingCallbackHandler),
            config,
        }
    }

    /// Builder: replace the callback handler
    pub fn with_callback_handler(mut self, handler: Arc<dyn CallbackHandler>) -> Self {
        self.callbacks = handler;
        self
    }
}
