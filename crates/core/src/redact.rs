//! Scrubbing of credentials before payloads reach a log line

use serde_json::{Map, Value};

/// Placeholder written over sensitive values
pub const REDACTED: &str = "[REDACTED]";

/// Key fragments that mark a field as sensitive (matched case-insensitively)
pub const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "token",
    "access_token",
    "refresh_token",
    "session_id",
    "token_id",
    "secret",
    "api_key",
    "apikey",
    "authorization",
    "cookie",
    "csrf",
];

/// Whether a field name should never be logged
pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|sensitive| key.contains(sensitive))
}

/// Copy of `value` with every sensitive field replaced, at any depth
pub fn redact_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let redacted: Map<String, Value> = map
                .iter()
                .map(|(key, inner)| {
                    let inner = if is_sensitive_key(key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact_json(inner)
                    };
                    (key.clone(), inner)
                })
                .collect();
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_json).collect()),
        other => other.clone(),
    }
}

/// Redact a raw response body if it parses as JSON, otherwise summarise it
pub fn redact_body(body: &str) -> String {
    serde_json::from_str::<Value>(body).map_or_else(
        |_| format!("<{} bytes of non-JSON body>", body.len()),
        |value| redact_json(&value).to_string(),
    )
}
