//! STK push request signing: timestamp and password derivation.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};

/// `YYYYMMDDHHmmss`, always 14 digits
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Format an instant the way the gateway expects in `Timestamp`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// `base64(shortcode + passkey + timestamp)`
pub fn derive_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{}{}{}", shortcode, passkey, timestamp))
}
