//! HMAC-SHA256 webhook signature verification with replay protection.
//!
//! The signed material is `"{X-Timestamp}.{raw body}"`, so a captured
//! signature cannot be replayed under a fresh timestamp. Verification must
//! run on the exact bytes received, before any JSON parsing.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Tolerated clock skew for timestamps ahead of the server clock.
pub const MAX_FUTURE_SKEW_SECS: i64 = 5;
pub const DEFAULT_MAX_AGE_SECS: i64 = 300;

const SECURITY_CONTEXT: &str = "webhook_authentication";

#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Option<Vec<u8>>,
    max_age_secs: i64,
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("configured", &self.is_configured())
            .field("max_age_secs", &self.max_age_secs)
            .finish()
    }
}

impl SignatureVerifier {
    /// An empty secret counts as not configured.
    pub fn new(secret: Option<impl Into<Vec<u8>>>, max_age_secs: i64) -> Self {
        let secret = secret.map(Into::into).filter(|s: &Vec<u8>| !s.is_empty());
        Self {
            secret,
            max_age_secs,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    pub fn max_age_secs(&self) -> i64 {
        self.max_age_secs
    }

    /// `sha256=<hex>` for the given timestamp and body, or `None` when no
    /// secret is configured.
    pub fn sign(&self, timestamp: &str, raw_body: &[u8]) -> Option<String> {
        self.secret
            .as_deref()
            .map(|secret| sign(secret, timestamp, raw_body))
    }

    /// Verifies against the current wall clock.
    pub fn verify_now(
        &self,
        timestamp_header: Option<&str>,
        signature_header: Option<&str>,
        raw_body: &[u8],
    ) -> Result<(), AppError> {
        self.verify(
            timestamp_header,
            signature_header,
            raw_body,
            chrono::Utc::now().timestamp(),
        )
    }

    pub fn verify(
        &self,
        timestamp_header: Option<&str>,
        signature_header: Option<&str>,
        raw_body: &[u8],
        now: i64,
    ) -> Result<(), AppError> {
        verify(
            self.secret.as_deref(),
            self.max_age_secs,
            timestamp_header,
            signature_header,
            raw_body,
            now,
        )
    }
}

/// Checks authenticity and freshness of one webhook delivery.
pub fn verify(
    secret: Option<&[u8]>,
    max_age_secs: i64,
    timestamp_header: Option<&str>,
    signature_header: Option<&str>,
    raw_body: &[u8],
    now: i64,
) -> Result<(), AppError> {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        tracing::error!("HMAC secret is not configured; denying webhook request");
        return Err(rejected("Webhook verification not configured"));
    };

    let Some(signature) = signature_header.filter(|s| !s.is_empty()) else {
        tracing::warn!("missing signature header in webhook request");
        return Err(rejected("Missing signature header"));
    };

    let Some(timestamp_raw) = timestamp_header.filter(|s| !s.is_empty()) else {
        tracing::warn!("missing timestamp header in webhook request");
        return Err(rejected("Missing timestamp header"));
    };

    let timestamp: i64 = timestamp_raw
        .parse()
        .map_err(|_| rejected("Invalid timestamp format"))?;

    if timestamp > now.saturating_add(MAX_FUTURE_SKEW_SECS) {
        tracing::warn!(timestamp, now, "webhook timestamp is in the future");
        return Err(rejected("Request timestamp is in the future"));
    }

    let age = now.saturating_sub(timestamp);
    if age > max_age_secs {
        tracing::warn!(age, max_age_secs, "webhook request too old");
        return Err(rejected("Request timestamp expired"));
    }

    let provided = signature.strip_prefix(SIGNATURE_PREFIX).unwrap_or(signature);
    let Ok(provided) = hex::decode(provided) else {
        tracing::warn!("webhook signature is not valid hex");
        return Err(rejected("Invalid signature"));
    };

    // verify_slice compares in constant time.
    let mac = signed_mac(secret, timestamp_raw, raw_body);
    if mac.verify_slice(&provided).is_err() {
        tracing::warn!("invalid signature in webhook request");
        return Err(rejected("Invalid signature"));
    }

    Ok(())
}

/// Hex HMAC-SHA256 of `"{timestamp}.{body}"`, without the `sha256=` prefix.
pub fn compute_signature(secret: &[u8], timestamp: &str, raw_body: &[u8]) -> String {
    hex::encode(signed_mac(secret, timestamp, raw_body).finalize().into_bytes())
}

/// Header-ready signature: `sha256=<hex>`.
pub fn sign(secret: &[u8], timestamp: &str, raw_body: &[u8]) -> String {
    format!(
        "{}{}",
        SIGNATURE_PREFIX,
        compute_signature(secret, timestamp, raw_body)
    )
}

fn signed_mac(secret: &[u8], timestamp: &str, raw_body: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(raw_body);
    mac
}

fn rejected(message: &str) -> AppError {
    AppError::security(message, SECURITY_CONTEXT)
}
