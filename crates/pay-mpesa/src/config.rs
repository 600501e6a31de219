//! # M-Pesa Configuration
//!
//! Configuration management for the Daraja integration.
//! All secrets are loaded from environment variables and validated once at
//! startup.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use pay_core::{PaymentError, PaymentResult, MAX_ACCOUNT_REFERENCE_LEN};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Longest transaction description the gateway accepts
pub const MAX_TRANSACTION_DESC_LEN: usize = 13;

const DEFAULT_ACCOUNT_REFERENCE: &str = "Payment";
const DEFAULT_TRANSACTION_DESC: &str = "Payment";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Daraja deployment the adapter talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpesaEnvironment {
    Sandbox,
    Production,
}

impl MpesaEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            MpesaEnvironment::Sandbox => "https://sandbox.safaricom.co.ke",
            MpesaEnvironment::Production => "https://api.safaricom.co.ke",
        }
    }
}

impl FromStr for MpesaEnvironment {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(MpesaEnvironment::Sandbox),
            "production" | "live" => Ok(MpesaEnvironment::Production),
            other => Err(PaymentError::Configuration(format!(
                "MPESA_ENVIRONMENT must be sandbox or production, got {}",
                other
            ))),
        }
    }
}

/// STK push transaction type, fixed per deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionType {
    /// Paybill number; the account reference is meaningful to the merchant
    #[default]
    CustomerPayBillOnline,
    /// Till number; `PartyB` is usually the till rather than the shortcode
    CustomerBuyGoodsOnline,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::CustomerPayBillOnline => "CustomerPayBillOnline",
            TransactionType::CustomerBuyGoodsOnline => "CustomerBuyGoodsOnline",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "CustomerPayBillOnline" => Ok(TransactionType::CustomerPayBillOnline),
            "CustomerBuyGoodsOnline" => Ok(TransactionType::CustomerBuyGoodsOnline),
            other => Err(PaymentError::Configuration(format!(
                "TRANSACTION_TYPE must be CustomerPayBillOnline or CustomerBuyGoodsOnline, got {}",
                other
            ))),
        }
    }
}

/// Daraja API configuration
#[derive(Clone)]
pub struct MpesaConfig {
    /// App consumer key
    pub consumer_key: String,

    /// App consumer secret
    pub consumer_secret: String,

    /// Business shortcode (paybill or store number)
    pub shortcode: String,

    /// Lipa Na M-Pesa passkey
    pub passkey: String,

    /// URL the gateway posts the payment result to
    pub callback_url: String,

    /// API base URL (for sandbox/testing/mocking)
    pub api_base_url: String,

    pub transaction_type: TransactionType,

    /// Receiving party; defaults to the shortcode
    pub party_b: String,

    /// Account reference used when the caller does not supply one
    pub default_account_reference: String,

    /// Whether callers may supply their own account reference
    pub allow_account_reference_override: bool,

    pub transaction_desc: String,

    /// Timeout applied to each outbound call
    pub timeout: Duration,

    /// Reuse access tokens until shortly before they expire
    pub cache_tokens: bool,
}

impl MpesaConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `CONSUMER_KEY`
    /// - `CONSUMER_SECRET`
    /// - `SHORTCODE`
    /// - `PASSKEY`
    /// - `CALLBACK_URL`
    pub fn from_env() -> PaymentResult<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> PaymentResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let optional = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &str| {
            optional(name).ok_or_else(|| PaymentError::Configuration(format!("{} not set", name)))
        };

        let consumer_key = required("CONSUMER_KEY")?;
        let consumer_secret = required("CONSUMER_SECRET")?;
        let shortcode = required("SHORTCODE")?;
        let passkey = required("PASSKEY")?;
        let callback_url = required("CALLBACK_URL")?;

        let environment = optional("MPESA_ENVIRONMENT")
            .map(|v| v.parse::<MpesaEnvironment>())
            .transpose()?
            .unwrap_or(MpesaEnvironment::Production);

        let api_base_url = optional("MPESA_API_BASE_URL")
            .unwrap_or_else(|| environment.base_url().to_string());

        let transaction_type = optional("TRANSACTION_TYPE")
            .map(|v| v.parse::<TransactionType>())
            .transpose()?
            .unwrap_or_default();

        let timeout_secs = match optional("MPESA_TIMEOUT_SECS") {
            Some(v) => v.parse::<u64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                PaymentError::Configuration(format!(
                    "MPESA_TIMEOUT_SECS must be a positive integer, got {}",
                    v
                ))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let allow_account_reference_override = optional("ACCOUNT_REFERENCE_OVERRIDE")
            .map(|v| parse_flag("ACCOUNT_REFERENCE_OVERRIDE", &v))
            .transpose()?
            .unwrap_or(true);

        let cache_tokens = optional("MPESA_TOKEN_CACHE")
            .map(|v| parse_flag("MPESA_TOKEN_CACHE", &v))
            .transpose()?
            .unwrap_or(false);

        let config = Self {
            party_b: optional("PARTY_B").unwrap_or_else(|| shortcode.clone()),
            consumer_key,
            consumer_secret,
            shortcode,
            passkey,
            callback_url,
            api_base_url,
            transaction_type,
            default_account_reference: optional("ACCOUNT_REFERENCE")
                .unwrap_or_else(|| DEFAULT_ACCOUNT_REFERENCE.to_string()),
            allow_account_reference_override,
            transaction_desc: optional("TRANSACTION_DESC")
                .unwrap_or_else(|| DEFAULT_TRANSACTION_DESC.to_string()),
            timeout: Duration::from_secs(timeout_secs),
            cache_tokens,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create config with explicit values (for testing)
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        shortcode: impl Into<String>,
        passkey: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> Self {
        let shortcode = shortcode.into();
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            party_b: shortcode.clone(),
            shortcode,
            passkey: passkey.into(),
            callback_url: callback_url.into(),
            api_base_url: MpesaEnvironment::Production.base_url().to_string(),
            transaction_type: TransactionType::default(),
            default_account_reference: DEFAULT_ACCOUNT_REFERENCE.to_string(),
            allow_account_reference_override: true,
            transaction_desc: DEFAULT_TRANSACTION_DESC.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cache_tokens: false,
        }
    }

    /// Check the values the gateway would otherwise reject at request time
    pub fn validate(&self) -> PaymentResult<()> {
        if !self.shortcode.chars().all(|c| c.is_ascii_digit()) {
            return Err(PaymentError::Configuration(
                "SHORTCODE must contain digits only".to_string(),
            ));
        }

        if !self.party_b.chars().all(|c| c.is_ascii_digit()) {
            return Err(PaymentError::Configuration(
                "PARTY_B must contain digits only".to_string(),
            ));
        }

        if !self.callback_url.starts_with("https://") && !self.callback_url.starts_with("http://")
        {
            return Err(PaymentError::Configuration(
                "CALLBACK_URL must start with http:// or https://".to_string(),
            ));
        }

        if self.default_account_reference.chars().count() > MAX_ACCOUNT_REFERENCE_LEN {
            return Err(PaymentError::Configuration(format!(
                "ACCOUNT_REFERENCE must be at most {} characters",
                MAX_ACCOUNT_REFERENCE_LEN
            )));
        }

        if self.transaction_desc.chars().count() > MAX_TRANSACTION_DESC_LEN {
            return Err(PaymentError::Configuration(format!(
                "TRANSACTION_DESC must be at most {} characters",
                MAX_TRANSACTION_DESC_LEN
            )));
        }

        Ok(())
    }

    /// Get the Basic authorization header value for the token endpoint
    pub fn basic_auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.consumer_key, self.consumer_secret);
        format!("Basic {}", STANDARD.encode(credentials))
    }

    pub fn token_url(&self) -> String {
        format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.api_base_url.trim_end_matches('/')
        )
    }

    pub fn stk_push_url(&self) -> String {
        format!(
            "{}/mpesa/stkpush/v1/processrequest",
            self.api_base_url.trim_end_matches('/')
        )
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_transaction_type(mut self, transaction_type: TransactionType) -> Self {
        self.transaction_type = transaction_type;
        self
    }

    pub fn with_party_b(mut self, party_b: impl Into<String>) -> Self {
        self.party_b = party_b.into();
        self
    }

    pub fn with_default_account_reference(mut self, reference: impl Into<String>) -> Self {
        self.default_account_reference = reference.into();
        self
    }

    pub fn with_account_reference_override(mut self, allow: bool) -> Self {
        self.allow_account_reference_override = allow;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_token_cache(mut self, enabled: bool) -> Self {
        self.cache_tokens = enabled;
        self
    }
}

impl fmt::Debug for MpesaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpesaConfig")
            .field("consumer_key", &"<redacted>")
            .field("consumer_secret", &"<redacted>")
            .field("shortcode", &self.shortcode)
            .field("passkey", &"<redacted>")
            .field("callback_url", &self.callback_url)
            .field("api_base_url", &self.api_base_url)
            .field("transaction_type", &self.transaction_type)
            .field("party_b", &self.party_b)
            .field("default_account_reference", &self.default_account_reference)
            .field(
                "allow_account_reference_override",
                &self.allow_account_reference_override,
            )
            .field("transaction_desc", &self.transaction_desc)
            .field("timeout", &self.timeout)
            .field("cache_tokens", &self.cache_tokens)
            .finish()
    }
}

fn parse_flag(name: &str, value: &str) -> PaymentResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(PaymentError::Configuration(format!(
            "{} must be true or false, got {}",
            name, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("CONSUMER_KEY", "key"),
            ("CONSUMER_SECRET", "secret"),
            ("SHORTCODE", "174379"),
            ("PASSKEY", "passkey"),
            ("CALLBACK_URL", "https://example.com/mpesa/callback"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> PaymentResult<MpesaConfig> {
        MpesaConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_vars()).unwrap();

        assert_eq!(config.api_base_url, "https://api.safaricom.co.ke");
        assert_eq!(config.transaction_type, TransactionType::CustomerPayBillOnline);
        assert_eq!(config.party_b, "174379");
        assert_eq!(config.default_account_reference, "Payment");
        assert!(config.allow_account_reference_override);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(!config.cache_tokens);
    }

    #[test]
    fn test_missing_required_fails_fast() {
        for name in ["CONSUMER_KEY", "CONSUMER_SECRET", "SHORTCODE", "PASSKEY", "CALLBACK_URL"] {
            let mut vars = base_vars();
            vars.remove(name);
            let err = load(&vars).unwrap_err();
            assert_eq!(err.to_string(), format!("Configuration error: {} not set", name));
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut vars = base_vars();
        vars.insert("PASSKEY", "   ");
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_buy_goods_deployment() {
        let mut vars = base_vars();
        vars.insert("TRANSACTION_TYPE", "CustomerBuyGoodsOnline");
        vars.insert("PARTY_B", "5551234");
        vars.insert("MPESA_ENVIRONMENT", "sandbox");
        vars.insert("MPESA_TOKEN_CACHE", "true");

        let config = load(&vars).unwrap();
        assert_eq!(config.transaction_type, TransactionType::CustomerBuyGoodsOnline);
        assert_eq!(config.party_b, "5551234");
        assert_eq!(config.api_base_url, "https://sandbox.safaricom.co.ke");
        assert!(config.cache_tokens);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cases = [
            ("TRANSACTION_TYPE", "PayBill"),
            ("MPESA_ENVIRONMENT", "staging"),
            ("MPESA_TIMEOUT_SECS", "0"),
            ("MPESA_TOKEN_CACHE", "maybe"),
            ("CALLBACK_URL", "example.com/callback"),
            ("SHORTCODE", "17A379"),
            ("ACCOUNT_REFERENCE", "ThisIsTooLongForMpesa"),
        ];

        for (name, value) in cases {
            let mut vars = base_vars();
            vars.insert(name, value);
            assert!(load(&vars).is_err(), "{}={} should be rejected", name, value);
        }
    }

    #[test]
    fn test_transaction_desc_length_limit() {
        let mut vars = base_vars();
        vars.insert("TRANSACTION_DESC", "Bundle Paymnt");
        assert_eq!(load(&vars).unwrap().transaction_desc, "Bundle Paymnt");

        vars.insert("TRANSACTION_DESC", "Bundle Payment");
        match load(&vars).unwrap_err() {
            PaymentError::Configuration(message) => {
                assert!(message.contains("TRANSACTION_DESC"), "message: {}", message);
                assert!(message.contains("13"));
            }
            other => panic!("expected Configuration, got {:?}", other),
        }
    }

    #[test]
    fn test_basic_auth_header() {
        let config = MpesaConfig::new("key", "secret", "174379", "passkey", "https://x.test/cb");
        // base64("key:secret")
        assert_eq!(config.basic_auth_header(), "Basic a2V5OnNlY3JldA==");
    }

    #[test]
    fn test_endpoint_urls() {
        let config = MpesaConfig::new("k", "s", "174379", "p", "https://x.test/cb")
            .with_api_base_url("http://127.0.0.1:9999/");

        assert_eq!(
            config.token_url(),
            "http://127.0.0.1:9999/oauth/v1/generate?grant_type=client_credentials"
        );
        assert_eq!(
            config.stk_push_url(),
            "http://127.0.0.1:9999/mpesa/stkpush/v1/processrequest"
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = MpesaConfig::new("key", "topsecret", "174379", "mypasskey", "https://x.test/cb");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("topsecret"));
        assert!(!debug.contains("mypasskey"));
        assert!(debug.contains("174379"));
    }
}
