use axum::http::HeaderMap;
use serde_json::Value;

pub const REDACTED: &str = "[REDACTED]";
const DEPTH_LIMIT_MARKER: &str = "[DEPTH_LIMIT]";
const MAX_DEPTH: usize = 10;

/// Keys whose values are never logged. Compared case-insensitively.
const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "pass",
    "token",
    "access_token",
    "refresh_token",
    "auth_token",
    "bearer",
    "secret",
    "secret_key",
    "client_secret",
    "key",
    "api_key",
    "apikey",
    "private_key",
    "authorization",
    "auth",
    "credit_card",
    "card_number",
    "cvv",
    "cvc",
    "expiry",
    "ssn",
    "social_security",
    "pin",
    "otp",
    "session_id",
    "session",
    "cookie",
    "hmac",
    "signature",
    "x_signature",
];

const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-signature",
    "x-api-key",
    "x-auth-token",
    "x-monitoring-key",
];

/// Sanitizes sensitive fields in JSON payloads for logging
pub fn sanitize_json(value: &Value) -> Value {
    sanitize_at_depth(value, 0)
}

fn sanitize_at_depth(value: &Value, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::String(DEPTH_LIMIT_MARKER.to_string());
    }

    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, val) in map {
                let sanitized_val = if is_sensitive_key(key) {
                    Value::String(REDACTED.to_string())
                } else {
                    sanitize_at_depth(val, depth + 1)
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(
            arr.iter()
                .map(|item| sanitize_at_depth(item, depth + 1))
                .collect(),
        ),
        _ => value.clone(),
    }
}

pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.contains(&key.as_str())
}

pub fn is_sensitive_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    SENSITIVE_HEADERS.contains(&name.as_str())
}

/// Header name/value pairs safe for logging.
pub fn sanitize_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let rendered = if is_sensitive_header(name.as_str()) {
                REDACTED.to_string()
            } else {
                value.to_str().unwrap_or("[non-ascii]").to_string()
            };
            (name.as_str().to_string(), rendered)
        })
        .collect()
}
