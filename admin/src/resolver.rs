use std::sync::{Arc, Mutex, PoisonError};

use identity_errors::AuthResult;
use identity_observability::TrustMetrics;
use reqwest::blocking::Client;
use tracing::info;

use crate::credentials::{AccessTokenSource, Credential};
use crate::metadata::{self, MetadataAccessToken, METADATA_URL};
use crate::signer::{CryptoSigner, LocalKeySigner, RemoteSigner, SignBlobApi};

#[derive(Clone)]
pub struct SignerOptions {
    /// Explicit signing identity; takes precedence over managed-identity
    /// signing and metadata discovery.
    pub service_account_id: Option<String>,
    pub metadata_url: String,
    pub sign_blob: SignBlobApi,
    pub metrics: Option<TrustMetrics>,
}

impl Default for SignerOptions {
    fn default() -> Self {
        Self {
            service_account_id: None,
            metadata_url: METADATA_URL.to_string(),
            sign_blob: SignBlobApi::default(),
            metrics: None,
        }
    }
}

/// Picks the signer for the ambient credential on first use and hands out
/// the same instance afterwards. A failed selection is not remembered.
pub struct SignerResolver {
    credential: Credential,
    client: Client,
    options: SignerOptions,
    resolved: Mutex<Option<Arc<dyn CryptoSigner>>>,
}

impl SignerResolver {
    pub fn new(credential: Credential, client: Client, options: SignerOptions) -> Self {
        Self {
            credential,
            client,
            options,
            resolved: Mutex::new(None),
        }
    }

    pub fn signer(&self) -> AuthResult<Arc<dyn CryptoSigner>> {
        let mut resolved = self.resolved.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(signer) = resolved.as_ref() {
            return Ok(Arc::clone(signer));
        }

        let signer = self.select()?;
        *resolved = Some(Arc::clone(&signer));
        Ok(signer)
    }

    fn select(&self) -> AuthResult<Arc<dyn CryptoSigner>> {
        let metrics = self.options.metrics.clone();

        if let Credential::ServiceAccount(key) = &self.credential {
            info!(account = key.client_email(), "signing with service account private key");
            let signer = LocalKeySigner::new(Arc::new(key.clone())).with_metrics(metrics);
            return Ok(Arc::new(signer));
        }

        if let Some(account) = &self.options.service_account_id {
            info!(%account, "signing remotely as configured service account");
            return Ok(self.remote(account.clone()));
        }

        if let Credential::Managed(native) = &self.credential {
            info!(account = native.account(), "signing with managed identity");
            let signer = LocalKeySigner::new(Arc::clone(native)).with_metrics(metrics);
            return Ok(Arc::new(signer));
        }

        let account = metadata::discover_service_account(&self.client, &self.options.metadata_url)?;
        Ok(self.remote(account))
    }

    /// Remote signer authorized by the credential's own tokens, or by the
    /// compute identity's tokens when the credential cannot mint any.
    fn remote(&self, account: String) -> Arc<dyn CryptoSigner> {
        let tokens = self.credential.access_tokens().unwrap_or_else(|| {
            Arc::new(MetadataAccessToken::new(
                self.client.clone(),
                self.options.metadata_url.clone(),
            )) as Arc<dyn AccessTokenSource>
        });
        let signer = RemoteSigner::new(
            self.client.clone(),
            account,
            self.options.sign_blob.clone(),
            Some(tokens),
        )
        .with_metrics(self.options.metrics.clone());
        Arc::new(signer)
    }
}
