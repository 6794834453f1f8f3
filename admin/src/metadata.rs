//! Local metadata server lookups: default service-account email and access
//! tokens for the default compute identity.

use identity_errors::{ensure_success, translate_transport, AuthError, AuthResult};
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::credentials::AccessTokenSource;

pub const METADATA_URL: &str = "http://metadata.google.internal";

const EMAIL_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/email";
const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";
const FLAVOR_HEADER: &str = "Metadata-Flavor";
const FLAVOR: &str = "Google";

const DISCOVERY_HINT: &str = "Make sure to initialize the client with a service account \
     credential, or specify the email of a service account with \
     iam.serviceAccounts.signBlob permission.";

/// Ask the metadata server for the default service-account email.
///
/// Any failure is a configuration error. Nothing is retried or cached, so a
/// later call probes the server again.
pub fn discover_service_account(client: &Client, metadata_url: &str) -> AuthResult<String> {
    let url = format!("{}{EMAIL_PATH}", metadata_url.trim_end_matches('/'));
    let response = client
        .get(&url)
        .header(FLAVOR_HEADER, FLAVOR)
        .send()
        .map_err(|err| {
            warn!(%url, error = %err, "metadata server unreachable");
            AuthError::Configuration(format!(
                "Failed to determine service account: metadata server unreachable ({err}). {DISCOVERY_HINT}"
            ))
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(AuthError::Configuration(format!(
            "Failed to determine service account: metadata server returned HTTP {} ({body}). \
             {DISCOVERY_HINT}",
            status.as_u16()
        )));
    }

    let email = response
        .text()
        .map_err(|err| {
            AuthError::Configuration(format!(
                "Failed to determine service account: unreadable metadata response ({err}). \
                 {DISCOVERY_HINT}"
            ))
        })?
        .trim()
        .to_string();
    if email.is_empty() {
        return Err(AuthError::Configuration(format!(
            "Failed to determine service account: metadata server returned an empty email. \
             {DISCOVERY_HINT}"
        )));
    }

    info!(account = %email, "discovered service account from metadata server");
    Ok(email)
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Access tokens for the default compute identity, fetched per call.
#[derive(Clone)]
pub struct MetadataAccessToken {
    client: Client,
    metadata_url: String,
}

impl MetadataAccessToken {
    pub fn new(client: Client, metadata_url: impl Into<String>) -> Self {
        Self {
            client,
            metadata_url: metadata_url.into(),
        }
    }
}

impl AccessTokenSource for MetadataAccessToken {
    fn access_token(&self) -> AuthResult<String> {
        let url = format!("{}{TOKEN_PATH}", self.metadata_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .header(FLAVOR_HEADER, FLAVOR)
            .send()
            .map_err(|err| translate_transport(&err, "metadata server"))?;
        let response = ensure_success(response)?;
        let token: TokenResponse = response
            .json()
            .map_err(|err| translate_transport(&err, "metadata server"))?;
        Ok(token.access_token)
    }
}
