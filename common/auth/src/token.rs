//! Structural decoding of compact JWS tokens.
//!
//! Nothing here checks claims or signatures; it only splits the compact form,
//! decodes the header and payload, and keeps the signing input around for
//! the signature check.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenParseError {
    #[error("token must have three dot-separated segments")]
    Segments,
    #[error("token {0} is not valid base64url")]
    Base64(&'static str),
    #[error("token {0} is not valid JSON: {1}")]
    Json(&'static str, String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub typ: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DecodedToken {
    pub header: TokenHeader,
    pub payload: Map<String, Value>,
    signing_input: String,
    signature: String,
}

impl DecodedToken {
    pub fn parse(token: &str) -> Result<Self, TokenParseError> {
        let mut segments = token.split('.');
        let (header, payload, signature) =
            match (segments.next(), segments.next(), segments.next(), segments.next()) {
                (Some(header), Some(payload), Some(signature), None) => {
                    (header, payload, signature)
                }
                _ => return Err(TokenParseError::Segments),
            };

        let header: TokenHeader = decode_segment(header, "header")?;
        let payload: Map<String, Value> = decode_segment(payload, "payload")?;
        URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenParseError::Base64("signature"))?;

        let signing_input_len = token.len() - signature.len() - 1;
        Ok(Self {
            header,
            payload,
            signing_input: token[..signing_input_len].to_string(),
            signature: signature.to_string(),
        })
    }

    /// `base64url(header) "." base64url(payload)`, the bytes covered by the signature.
    pub fn signing_input(&self) -> &[u8] {
        self.signing_input.as_bytes()
    }

    /// Base64url-encoded signature segment.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn key_id(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    pub fn issuer(&self) -> Option<&str> {
        self.payload.get("iss").and_then(Value::as_str)
    }

    pub fn subject(&self) -> Option<&str> {
        self.payload.get("sub").and_then(Value::as_str)
    }

    /// `aud` as a list, accepting both the single-string and array forms.
    pub fn audience(&self) -> Vec<&str> {
        match self.payload.get("aud") {
            Some(Value::String(item)) => vec![item.as_str()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn issued_at(&self) -> Option<i64> {
        self.numeric_claim("iat")
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.numeric_claim("exp")
    }

    pub fn numeric_claim(&self, name: &str) -> Option<i64> {
        let value = self.payload.get(name)?;
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|seconds| seconds as i64))
    }
}

fn decode_segment<T>(segment: &str, part: &'static str) -> Result<T, TokenParseError>
where
    T: for<'de> Deserialize<'de>,
{
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenParseError::Base64(part))?;
    serde_json::from_slice(&bytes).map_err(|err| TokenParseError::Json(part, err.to_string()))
}
