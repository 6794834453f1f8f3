use chrono::{DateTime, TimeZone, Utc};
use identity_errors::{AuthError, AuthResult, ErrorCode};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::token::DecodedToken;

/// Application-focused view of a verified ID token or session cookie.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedToken {
    pub uid: String,
    pub issuer: String,
    pub audience: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub auth_time: Option<DateTime<Utc>>,
    pub tenant_id: Option<String>,
    pub sign_in_provider: Option<String>,
    pub claims: Map<String, Value>,
}

impl VerifiedToken {
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn has_claim(&self, name: &str) -> bool {
        self.claims.contains_key(name)
    }

    /// Built only after every claim check has passed, so the required
    /// claims are known to be present.
    pub(crate) fn from_decoded(decoded: &DecodedToken, audience: &str, code: ErrorCode) -> AuthResult<Self> {
        let uid = decoded.subject().unwrap_or_default().to_string();
        let issuer = decoded.issuer().unwrap_or_default().to_string();
        let issued_at = timestamp(decoded.issued_at(), "iat", code)?;
        let expires_at = timestamp(decoded.expires_at(), "exp", code)?;
        let auth_time = match decoded.numeric_claim("auth_time") {
            Some(seconds) => Some(timestamp(Some(seconds), "auth_time", code)?),
            None => None,
        };

        let firebase = decoded.payload.get("firebase");
        let nested = |name: &str| {
            firebase
                .and_then(|value| value.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Ok(Self {
            uid,
            issuer,
            audience: audience.to_string(),
            issued_at,
            expires_at,
            auth_time,
            tenant_id: nested("tenant"),
            sign_in_provider: nested("sign_in_provider"),
            claims: decoded.payload.clone(),
        })
    }
}

fn timestamp(value: Option<i64>, claim: &'static str, code: ErrorCode) -> AuthResult<DateTime<Utc>> {
    value
        .and_then(|seconds| Utc.timestamp_opt(seconds, 0).single())
        .ok_or_else(|| {
            AuthError::invalid_credential(code, format!("invalid \"{claim}\" claim: {value:?}"))
        })
}
