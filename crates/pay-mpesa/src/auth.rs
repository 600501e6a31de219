//! # Access Tokens
//!
//! OAuth client-credentials tokens for the Daraja API.
//!
//! By default every push fetches a fresh token. With
//! [`MpesaConfig::cache_tokens`] enabled a single token is kept and reused
//! until shortly before the gateway says it expires.

use crate::config::MpesaConfig;
use chrono::{DateTime, Duration, Utc};
use pay_core::{PaymentError, PaymentResult};
use reqwest::{header::AUTHORIZATION, Client};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, instrument};

/// Lifetime assumed when the gateway omits or garbles `expires_in`
const DEFAULT_EXPIRES_IN_SECS: i64 = 3599;

/// Longest lifetime accepted from the gateway; larger values are clamped
const MAX_EXPIRES_IN_SECS: i64 = 24 * 60 * 60;

/// Cached tokens are treated as stale this long before they expire
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Bearer token issued by the gateway
#[derive(Clone)]
pub struct AccessToken {
    pub value: String,
    pub obtained_at: DateTime<Utc>,
    pub expires_in: Duration,
}

impl AccessToken {
    /// Falls back to `obtained_at` (already stale) if the sum overflows
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.obtained_at
            .checked_add_signed(self.expires_in)
            .unwrap_or(self.obtained_at)
    }

    /// Whether the token can still be used at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at()
    }

    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("obtained_at", &self.obtained_at)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Acquires access tokens, optionally caching one
pub struct AccessTokenSource {
    config: Arc<MpesaConfig>,
    client: Client,
    cache: Option<Mutex<Option<AccessToken>>>,
}

impl AccessTokenSource {
    pub fn new(config: Arc<MpesaConfig>, client: Client) -> Self {
        let cache = config.cache_tokens.then(|| Mutex::new(None));
        Self {
            config,
            client,
            cache,
        }
    }

    /// Get a usable access token, fetching one if needed.
    pub async fn access_token(&self) -> PaymentResult<AccessToken> {
        let Some(cache) = &self.cache else {
            return self.fetch().await;
        };

        // Held across the fetch so concurrent requests share one token call
        let mut slot = cache.lock().await;
        if let Some(token) = slot.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            debug!("Reusing cached access token");
            return Ok(token.clone());
        }

        let token = self.fetch().await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached token, if any
    pub async fn invalidate(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().await.take();
        }
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> PaymentResult<AccessToken> {
        let response = self
            .client
            .get(self.config.token_url())
            .header(AUTHORIZATION, self.config.basic_auth_header())
            .send()
            .await
            .map_err(|e| upstream_auth(transport_message(&e, self.config.timeout)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| upstream_auth(transport_message(&e, self.config.timeout)))?;

        if !status.is_success() {
            error!("Token request rejected: status={}, body={}", status, body);
            return Err(upstream_auth(format!("HTTP {}: {}", status, body)));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| upstream_auth(format!("Malformed token response: {}", e)))?;

        let value = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| upstream_auth("Token response has no access_token"))?;

        let expires_in = parsed
            .expires_in
            .as_ref()
            .and_then(parse_expires_in)
            .unwrap_or(DEFAULT_EXPIRES_IN_SECS);

        debug!("Obtained access token, expires_in={}s", expires_in);

        Ok(AccessToken {
            value,
            obtained_at: Utc::now(),
            expires_in: Duration::try_seconds(expires_in)
                .unwrap_or_else(|| Duration::seconds(DEFAULT_EXPIRES_IN_SECS)),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    /// Daraja sends this as a string
    #[serde(default)]
    expires_in: Option<Value>,
}

fn parse_expires_in(value: &Value) -> Option<i64> {
    let secs = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    secs.filter(|s| *s > 0).map(|s| s.min(MAX_EXPIRES_IN_SECS))
}

fn upstream_auth(message: impl Into<String>) -> PaymentError {
    PaymentError::UpstreamAuth {
        message: message.into(),
    }
}

/// Human-readable description of a failed outbound call
pub(crate) fn transport_message(err: &reqwest::Error, timeout: std::time::Duration) -> String {
    if err.is_timeout() {
        format!("Request timed out after {}s", timeout.as_secs())
    } else {
        err.to_string()
    }
}
