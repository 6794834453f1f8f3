use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use identity_errors::{ensure_success, translate_transport, AuthError, AuthResult, ErrorCode};
use identity_observability::TrustMetrics;
use reqwest::blocking::Client;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::credentials::{AccessTokenSource, NativeSigner};

pub const IAM_CREDENTIALS_URL: &str = "https://iamcredentials.googleapis.com";
pub const LEGACY_IAM_URL: &str = "https://iam.googleapis.com";

const SIGN_BLOB_SERVICE: &str = "IAM sign-blob service";

/// Signs payloads on behalf of a service identity.
pub trait CryptoSigner: Send + Sync {
    fn sign(&self, payload: &[u8]) -> AuthResult<Vec<u8>>;

    /// Service-account email the signatures are attributable to.
    fn account(&self) -> &str;
}

/// Signs in-process through the credential's own primitive.
pub struct LocalKeySigner {
    inner: Arc<dyn NativeSigner>,
    metrics: Option<TrustMetrics>,
}

impl LocalKeySigner {
    pub fn new(inner: Arc<dyn NativeSigner>) -> Self {
        Self {
            inner,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<TrustMetrics>) -> Self {
        self.metrics = metrics;
        self
    }
}

impl CryptoSigner for LocalKeySigner {
    fn sign(&self, payload: &[u8]) -> AuthResult<Vec<u8>> {
        let result = self.inner.sign(payload);
        record(self.metrics.as_ref(), "local", &result);
        result
    }

    fn account(&self) -> &str {
        self.inner.account()
    }
}

/// Wire shape of a sign-blob endpoint: base URL plus request/response field
/// names. The path is always `/v1/projects/-/serviceAccounts/{account}:signBlob`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignBlobApi {
    base_url: String,
    request_field: &'static str,
    response_field: &'static str,
}

impl SignBlobApi {
    /// `{"payload"}` → `{"signedBlob"}` on the IAM Credentials API.
    pub fn iam_credentials() -> Self {
        Self {
            base_url: IAM_CREDENTIALS_URL.to_string(),
            request_field: "payload",
            response_field: "signedBlob",
        }
    }

    /// `{"bytesToSign"}` → `{"signature"}` on the older IAM API.
    pub fn legacy_iam() -> Self {
        Self {
            base_url: LEGACY_IAM_URL.to_string(),
            request_field: "bytesToSign",
            response_field: "signature",
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn endpoint(&self, account: &str) -> String {
        format!(
            "{}/v1/projects/-/serviceAccounts/{account}:signBlob",
            self.base_url.trim_end_matches('/')
        )
    }
}

impl Default for SignBlobApi {
    fn default() -> Self {
        Self::iam_credentials()
    }
}

/// Delegates signing to the remote sign-blob service.
pub struct RemoteSigner {
    client: Client,
    account: String,
    api: SignBlobApi,
    tokens: Option<Arc<dyn AccessTokenSource>>,
    metrics: Option<TrustMetrics>,
}

impl RemoteSigner {
    pub fn new(
        client: Client,
        account: impl Into<String>,
        api: SignBlobApi,
        tokens: Option<Arc<dyn AccessTokenSource>>,
    ) -> Self {
        Self {
            client,
            account: account.into(),
            api,
            tokens,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Option<TrustMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    fn sign_remote(&self, payload: &[u8]) -> AuthResult<Vec<u8>> {
        let mut body = Map::new();
        body.insert(
            self.api.request_field.to_string(),
            Value::String(STANDARD.encode(payload)),
        );

        let mut request = self.client.post(self.api.endpoint(&self.account)).json(&body);
        if let Some(tokens) = &self.tokens {
            request = request.bearer_auth(tokens.access_token()?);
        }

        let response = request
            .send()
            .map_err(|err| translate_transport(&err, SIGN_BLOB_SERVICE))?;
        let response = ensure_success(response)?;
        let value: Value = response
            .json()
            .map_err(|err| translate_transport(&err, SIGN_BLOB_SERVICE))?;

        let field = self.api.response_field;
        let signed = value.get(field).and_then(Value::as_str).ok_or_else(|| {
            AuthError::Transport {
                code: ErrorCode::Internal,
                message: format!("sign-blob response is missing the \"{field}\" field"),
                response: None,
            }
        })?;
        STANDARD.decode(signed).map_err(|err| AuthError::Transport {
            code: ErrorCode::Internal,
            message: format!("sign-blob response field \"{field}\" is not valid base64: {err}"),
            response: None,
        })
    }
}

impl CryptoSigner for RemoteSigner {
    fn sign(&self, payload: &[u8]) -> AuthResult<Vec<u8>> {
        let result = self.sign_remote(payload);
        match &result {
            Ok(_) => debug!(account = %self.account, "remote signing succeeded"),
            Err(err) => warn!(account = %self.account, error = %err, "remote signing failed"),
        }
        record(self.metrics.as_ref(), "remote", &result);
        result
    }

    fn account(&self) -> &str {
        &self.account
    }
}

fn record(metrics: Option<&TrustMetrics>, signer: &str, result: &AuthResult<Vec<u8>>) {
    if let Some(metrics) = metrics {
        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics.sign_request(signer, outcome);
    }
}
