use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Duration;
use identity_auth::{Clock, CUSTOM_TOKEN_AUDIENCE};
use identity_errors::{AuthError, AuthResult, ErrorCode};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::signer::CryptoSigner;

pub const CUSTOM_TOKEN_TTL_SECONDS: i64 = 3600;
pub const MAX_UID_LENGTH: usize = 128;

/// Claim names the identity backend sets itself.
pub const RESERVED_CLAIMS: [&str; 16] = [
    "acr", "amr", "at_hash", "aud", "auth_time", "azp", "cnf", "c_hash", "exp", "firebase",
    "iat", "iss", "jti", "nbf", "nonce", "sub",
];

/// Mints custom tokens signed by the resolved service identity.
pub struct TokenFactory {
    signer: Arc<dyn CryptoSigner>,
    clock: Arc<dyn Clock>,
    tenant_id: Option<String>,
}

#[derive(Serialize)]
struct CustomTokenClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'static str,
    iat: i64,
    exp: i64,
    uid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    claims: Option<&'a Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_id: Option<&'a str>,
}

impl TokenFactory {
    pub fn new(signer: Arc<dyn CryptoSigner>, clock: Arc<dyn Clock>, tenant_id: Option<String>) -> Self {
        Self {
            signer,
            clock,
            tenant_id,
        }
    }

    pub fn create_custom_token(
        &self,
        uid: &str,
        developer_claims: Option<&Map<String, Value>>,
    ) -> AuthResult<String> {
        if uid.is_empty() || uid.chars().count() > MAX_UID_LENGTH {
            return Err(AuthError::InvalidArgument(format!(
                "uid must be a non-empty string with no more than {MAX_UID_LENGTH} characters"
            )));
        }
        if let Some(claims) = developer_claims {
            if let Some(reserved) = claims.keys().find(|key| RESERVED_CLAIMS.contains(&key.as_str())) {
                return Err(AuthError::InvalidArgument(format!(
                    "claim '{reserved}' is reserved and cannot be specified"
                )));
            }
        }

        let account = self.signer.account();
        let issued_at = self.clock.now();
        let expires_at = issued_at + Duration::seconds(CUSTOM_TOKEN_TTL_SECONDS);
        let payload = CustomTokenClaims {
            iss: account,
            sub: account,
            aud: CUSTOM_TOKEN_AUDIENCE,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            uid,
            claims: developer_claims.filter(|claims| !claims.is_empty()),
            tenant_id: self.tenant_id.as_deref(),
        };

        let header = json!({"alg": "RS256", "typ": "JWT"});
        let payload = serde_json::to_vec(&payload).map_err(|err| {
            AuthError::runtime(ErrorCode::Internal, format!("failed to encode custom token claims: {err}"))
        })?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(payload)
        );

        let signature = self.signer.sign(signing_input.as_bytes())?;
        debug!(uid, account, "minted custom token");
        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature)))
    }
}
