//! Identity payloads and service result shapes shared by client and edge

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Field name to validation messages, as returned by the identity API
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Opaque user payload from the identity API.
///
/// The record is passed through untouched; only the handful of fields the
/// session layer needs are read.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecord(Value);

impl UserRecord {
    /// Wrap a raw JSON payload
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Borrow the raw payload
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume into the raw payload
    pub fn into_value(self) -> Value {
        self.0
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    /// Correlation token used to mint new access tokens
    pub fn token_id(&self) -> Option<&str> {
        self.str_field("token_id")
    }

    /// Session correlation id
    pub fn session_id(&self) -> Option<&str> {
        self.str_field("session_id")
    }

    /// Current balance, `"0"` when absent
    pub fn balance(&self) -> String {
        match self.0.get("balance") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => "0".to_string(),
        }
    }

    pub fn username(&self) -> &str {
        self.str_field("username").unwrap_or_default()
    }

    pub fn email(&self) -> &str {
        self.str_field("email").unwrap_or_default()
    }

    pub fn full_name(&self) -> &str {
        self.str_field("full_name").unwrap_or_default()
    }

    pub fn currency(&self) -> &str {
        self.str_field("currency").unwrap_or_default()
    }

    /// Copy of this record with a new balance
    #[must_use]
    pub fn with_balance(&self, balance: impl Into<String>) -> Self {
        let mut value = self.0.clone();
        if let Value::Object(map) = &mut value {
            map.insert("balance".to_string(), Value::String(balance.into()));
        }
        Self(value)
    }
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("username", &self.username())
            .field("currency", &self.currency())
            .finish_non_exhaustive()
    }
}

/// Token response from `auth/login` and `auth/refresh`.
///
/// Every field is optional so that a 200 missing credentials can be told
/// apart from a transport failure.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TokenGrant {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub user: Option<UserRecord>,
}

impl TokenGrant {
    /// Non-empty access token, if any
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Token type, defaulting to `Bearer`
    pub fn token_type(&self) -> &str {
        self.token_type.as_deref().unwrap_or("Bearer")
    }
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("has_access_token", &self.access_token().is_some())
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("user", &self.user)
            .finish()
    }
}

/// Credentials for `auth/login`
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for LoginPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginPayload")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Body for `auth/register`
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct RegistrationPayload {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub referral_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captcha: Option<String>,
    #[serde(default)]
    pub captcha_type: String,
    #[serde(default)]
    pub captcha_key: String,
}

impl RegistrationPayload {
    /// Copy without the captcha answer, for forwarding to the identity API
    #[must_use]
    pub fn for_upstream(&self) -> Self {
        Self {
            captcha: None,
            ..self.clone()
        }
    }
}

impl fmt::Debug for RegistrationPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationPayload")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("currency", &self.currency)
            .field("has_captcha", &self.captcha.is_some())
            .finish_non_exhaustive()
    }
}

/// Uniform result shape returned across the auth service boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthOutcome<T> {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

impl<T> AuthOutcome<T> {
    pub fn ok(message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            errors: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            errors: None,
        }
    }

    pub fn failed_with_errors(message: impl Into<String>, errors: Option<FieldErrors>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            errors,
        }
    }

    /// Drop the payload, keeping the outcome
    pub fn discard_data<U>(self) -> AuthOutcome<U> {
        AuthOutcome {
            success: self.success,
            message: self.message,
            data: None,
            errors: self.errors,
        }
    }
}
