use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use identity_errors::{AuthError, AuthResult, ErrorCode};
use jsonwebtoken::{crypto, Algorithm, EncodingKey};
use serde::Deserialize;

/// Signing primitive owned by a credential, local key or platform-managed.
pub trait NativeSigner: Send + Sync {
    fn account(&self) -> &str;
    fn sign(&self, payload: &[u8]) -> AuthResult<Vec<u8>>;
}

/// Supplier of OAuth2 bearer tokens for outbound calls.
pub trait AccessTokenSource: Send + Sync {
    fn access_token(&self) -> AuthResult<String>;
}

/// Fixed bearer token, for callers that manage token lifetimes themselves.
#[derive(Clone)]
pub struct StaticAccessToken(String);

impl StaticAccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl AccessTokenSource for StaticAccessToken {
    fn access_token(&self) -> AuthResult<String> {
        Ok(self.0.clone())
    }
}

#[derive(Deserialize)]
struct ServiceAccountFile {
    #[serde(rename = "type")]
    kind: Option<String>,
    client_email: Option<String>,
    private_key: Option<String>,
    private_key_id: Option<String>,
    project_id: Option<String>,
}

/// Service-account key file contents with the parsed RSA private key.
#[derive(Clone)]
pub struct ServiceAccountKey {
    client_email: String,
    private_key_id: Option<String>,
    project_id: Option<String>,
    key: EncodingKey,
}

impl ServiceAccountKey {
    pub fn new(client_email: impl Into<String>, private_key_pem: &str) -> AuthResult<Self> {
        let client_email = client_email.into();
        if client_email.trim().is_empty() {
            return Err(AuthError::InvalidArgument(
                "service account client_email must be a non-empty string".to_string(),
            ));
        }
        let key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes()).map_err(|err| {
            AuthError::InvalidArgument(format!("failed to parse service account private key: {err}"))
        })?;
        Ok(Self {
            client_email,
            private_key_id: None,
            project_id: None,
            key,
        })
    }

    pub fn from_json(json: &str) -> AuthResult<Self> {
        let file: ServiceAccountFile = serde_json::from_str(json).map_err(|err| {
            AuthError::InvalidArgument(format!("failed to parse service account JSON: {err}"))
        })?;
        if let Some(kind) = file.kind.as_deref() {
            if kind != "service_account" {
                return Err(AuthError::InvalidArgument(format!(
                    "expected a service_account credential, got '{kind}'"
                )));
            }
        }
        let client_email = file.client_email.ok_or_else(|| {
            AuthError::InvalidArgument("service account JSON is missing client_email".to_string())
        })?;
        let private_key = file.private_key.ok_or_else(|| {
            AuthError::InvalidArgument("service account JSON is missing private_key".to_string())
        })?;

        let mut key = Self::new(client_email, &private_key)?;
        key.private_key_id = file.private_key_id;
        key.project_id = file.project_id.filter(|id| !id.trim().is_empty());
        Ok(key)
    }

    pub fn from_file(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| {
            AuthError::InvalidArgument(format!(
                "failed to read service account file {}: {err}",
                path.display()
            ))
        })?;
        Self::from_json(&contents)
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    pub fn private_key_id(&self) -> Option<&str> {
        self.private_key_id.as_deref()
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }
}

impl NativeSigner for ServiceAccountKey {
    fn account(&self) -> &str {
        &self.client_email
    }

    fn sign(&self, payload: &[u8]) -> AuthResult<Vec<u8>> {
        let signature = crypto::sign(payload, &self.key, Algorithm::RS256).map_err(|err| {
            AuthError::runtime(ErrorCode::Internal, format!("failed to sign payload: {err}"))
        })?;
        URL_SAFE_NO_PAD.decode(signature).map_err(|err| {
            AuthError::runtime(ErrorCode::Internal, format!("failed to decode signature: {err}"))
        })
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

/// The ambient credential the library was initialised with.
#[derive(Clone)]
pub enum Credential {
    /// Key file carrying a private key.
    ServiceAccount(ServiceAccountKey),
    /// Platform identity that signs without exposing a key.
    Managed(Arc<dyn NativeSigner>),
    /// Bearer-token-only identity, such as the default compute identity.
    AccessToken(Arc<dyn AccessTokenSource>),
}

impl Credential {
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Credential::ServiceAccount(key) => key.project_id(),
            _ => None,
        }
    }

    pub fn access_tokens(&self) -> Option<Arc<dyn AccessTokenSource>> {
        match self {
            Credential::AccessToken(source) => Some(Arc::clone(source)),
            _ => None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::ServiceAccount(key) => f.debug_tuple("ServiceAccount").field(key).finish(),
            Credential::Managed(signer) => f.debug_tuple("Managed").field(&signer.account()).finish(),
            Credential::AccessToken(_) => f.write_str("AccessToken"),
        }
    }
}
