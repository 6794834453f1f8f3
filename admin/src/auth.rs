use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use identity_auth::{
    Clock, KeyCacheRegistry, SystemClock, TokenVerifier, VerifiedToken, VerifierConfig,
    VerifierOptions,
};
use identity_errors::{AuthError, AuthResult};
use identity_observability::TrustMetrics;
use reqwest::blocking::Client;
use serde_json::{Map, Value};
use tracing::info;

use crate::config::{load_admin_config, AdminConfig};
use crate::credentials::{Credential, ServiceAccountKey};
use crate::metadata::MetadataAccessToken;
use crate::resolver::{SignerOptions, SignerResolver};
use crate::tokens::TokenFactory;

/// Entry point tying signing and verification to one project and credential.
pub struct IdentityAuth {
    project_id: String,
    tenant_id: Option<String>,
    clock: Arc<dyn Clock>,
    resolver: SignerResolver,
    key_caches: KeyCacheRegistry,
    id_tokens: TokenVerifier,
    session_cookies: TokenVerifier,
}

impl IdentityAuth {
    pub fn new(
        config: &AdminConfig,
        credential: Credential,
        client: Client,
        clock: Arc<dyn Clock>,
        metrics: Option<TrustMetrics>,
    ) -> AuthResult<Self> {
        let project_id = config
            .project_id
            .clone()
            .or_else(|| credential.project_id().map(str::to_string))
            .ok_or_else(|| {
                AuthError::Configuration(
                    "Failed to determine project id. Initialize the client with a service \
                     account credential or set the GOOGLE_CLOUD_PROJECT environment variable."
                        .to_string(),
                )
            })?;

        let key_caches = KeyCacheRegistry::with_urls(
            client.clone(),
            Arc::clone(&clock),
            &config.id_token_cert_url,
            &config.session_cookie_cert_url,
            metrics.clone(),
        );
        let options = VerifierOptions {
            clock_skew_seconds: config.clock_skew_seconds,
            tenant_id: config.tenant_id.clone(),
            metrics: metrics.clone(),
        };
        let id_tokens = TokenVerifier::new(VerifierConfig::id_token(
            &project_id,
            &key_caches,
            Arc::clone(&clock),
            options.clone(),
        )?);
        let session_cookies = TokenVerifier::new(VerifierConfig::session_cookie(
            &project_id,
            &key_caches,
            Arc::clone(&clock),
            options,
        )?);

        let resolver = SignerResolver::new(
            credential,
            client,
            SignerOptions {
                service_account_id: config.service_account_id.clone(),
                metadata_url: config.metadata_url.clone(),
                sign_blob: config.sign_blob_api(),
                metrics,
            },
        );

        info!(project_id = %project_id, tenant_id = ?config.tenant_id, "identity trust core ready");
        Ok(Self {
            project_id,
            tenant_id: config.tenant_id.clone(),
            clock,
            resolver,
            key_caches,
            id_tokens,
            session_cookies,
        })
    }

    /// Build from environment variables, loading the key file named by
    /// `GOOGLE_APPLICATION_CREDENTIALS` or falling back to the compute identity.
    pub fn from_env() -> anyhow::Result<Self> {
        let config = load_admin_config()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;

        let credential = match &config.credentials_path {
            Some(path) => Credential::ServiceAccount(ServiceAccountKey::from_file(path)?),
            None => Credential::AccessToken(Arc::new(MetadataAccessToken::new(
                client.clone(),
                config.metadata_url.clone(),
            ))),
        };

        Ok(Self::new(&config, credential, client, Arc::new(SystemClock), None)?)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn create_custom_token(
        &self,
        uid: &str,
        developer_claims: Option<&Map<String, Value>>,
    ) -> AuthResult<String> {
        let signer = self.resolver.signer()?;
        TokenFactory::new(signer, Arc::clone(&self.clock), self.tenant_id.clone())
            .create_custom_token(uid, developer_claims)
    }

    pub fn verify_id_token(&self, token: &str) -> AuthResult<VerifiedToken> {
        self.id_tokens.verify(token)
    }

    pub fn verify_session_cookie(&self, cookie: &str) -> AuthResult<VerifiedToken> {
        self.session_cookies.verify(cookie)
    }

    /// Email of the identity custom tokens are issued as. Resolves the signer
    /// if that has not happened yet.
    pub fn signer_account(&self) -> AuthResult<String> {
        Ok(self.resolver.signer()?.account().to_string())
    }

    pub fn key_caches(&self) -> &KeyCacheRegistry {
        &self.key_caches
    }
}
