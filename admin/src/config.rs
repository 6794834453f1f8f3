use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;

use identity_auth::config::{
    DEFAULT_CLOCK_SKEW_SECONDS, ID_TOKEN_CERT_URL, SESSION_COOKIE_CERT_URL,
};

use crate::metadata::METADATA_URL;
use crate::signer::SignBlobApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignBlobProtocol {
    IamCredentials,
    LegacyIam,
}

impl SignBlobProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignBlobProtocol::IamCredentials => "iamcredentials",
            SignBlobProtocol::LegacyIam => "legacy",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub project_id: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub service_account_id: Option<String>,
    pub tenant_id: Option<String>,
    pub clock_skew_seconds: i64,
    pub http_timeout_seconds: u64,
    pub metadata_url: String,
    pub sign_blob_protocol: SignBlobProtocol,
    pub iam_url: Option<String>,
    pub id_token_cert_url: String,
    pub session_cookie_cert_url: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            credentials_path: None,
            service_account_id: None,
            tenant_id: None,
            clock_skew_seconds: DEFAULT_CLOCK_SKEW_SECONDS,
            http_timeout_seconds: 30,
            metadata_url: METADATA_URL.to_string(),
            sign_blob_protocol: SignBlobProtocol::IamCredentials,
            iam_url: None,
            id_token_cert_url: ID_TOKEN_CERT_URL.to_string(),
            session_cookie_cert_url: SESSION_COOKIE_CERT_URL.to_string(),
        }
    }
}

impl AdminConfig {
    /// Sign-blob wire shape for the configured protocol and endpoint override.
    pub fn sign_blob_api(&self) -> SignBlobApi {
        let api = match self.sign_blob_protocol {
            SignBlobProtocol::IamCredentials => SignBlobApi::iam_credentials(),
            SignBlobProtocol::LegacyIam => SignBlobApi::legacy_iam(),
        };
        match &self.iam_url {
            Some(url) => api.with_base_url(url.clone()),
            None => api,
        }
    }
}

pub fn load_admin_config() -> Result<AdminConfig> {
    admin_config_from(|key| env::var(key).ok())
}

/// Build the config from an arbitrary variable lookup.
pub fn admin_config_from<F>(lookup: F) -> Result<AdminConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = AdminConfig::default();
    let optional = |key: &str| lookup(key).and_then(|value| normalize_optional(&value));

    let project_id = optional("IDENTITY_PROJECT_ID")
        .or_else(|| optional("GOOGLE_CLOUD_PROJECT"))
        .or_else(|| optional("GCLOUD_PROJECT"));

    let credentials_path = optional("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from);
    let service_account_id = optional("IDENTITY_SERVICE_ACCOUNT_ID");
    let tenant_id = optional("IDENTITY_TENANT_ID");

    let clock_skew_seconds = optional("IDENTITY_CLOCK_SKEW_SECONDS")
        .map(|value| parse_seconds(&value))
        .transpose()
        .context("Failed to parse IDENTITY_CLOCK_SKEW_SECONDS")?
        .unwrap_or(defaults.clock_skew_seconds);

    let http_timeout_seconds = optional("IDENTITY_HTTP_TIMEOUT_SECONDS")
        .map(|value| parse_seconds(&value))
        .transpose()
        .context("Failed to parse IDENTITY_HTTP_TIMEOUT_SECONDS")?
        .map(|value| value as u64)
        .unwrap_or(defaults.http_timeout_seconds);

    let metadata_url = optional("IDENTITY_METADATA_URL")
        .or_else(|| optional("GCE_METADATA_HOST").map(|host| format!("http://{host}")))
        .unwrap_or(defaults.metadata_url);

    let sign_blob_protocol = optional("IDENTITY_SIGN_BLOB_PROTOCOL")
        .map(|value| parse_protocol(&value))
        .transpose()
        .context("Failed to parse IDENTITY_SIGN_BLOB_PROTOCOL")?
        .unwrap_or(defaults.sign_blob_protocol);

    let iam_url = optional("IDENTITY_IAM_URL");
    let id_token_cert_url =
        optional("IDENTITY_ID_TOKEN_CERT_URL").unwrap_or(defaults.id_token_cert_url);
    let session_cookie_cert_url =
        optional("IDENTITY_SESSION_COOKIE_CERT_URL").unwrap_or(defaults.session_cookie_cert_url);

    Ok(AdminConfig {
        project_id,
        credentials_path,
        service_account_id,
        tenant_id,
        clock_skew_seconds,
        http_timeout_seconds,
        metadata_url,
        sign_blob_protocol,
        iam_url,
        id_token_cert_url,
        session_cookie_cert_url,
    })
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_seconds(value: &str) -> Result<i64> {
    let seconds: i64 = value
        .trim()
        .parse()
        .map_err(|err| anyhow!("Invalid number of seconds '{value}': {err}"))?;
    if seconds < 0 {
        return Err(anyhow!("Seconds must not be negative, got {seconds}"));
    }
    Ok(seconds)
}

fn parse_protocol(value: &str) -> Result<SignBlobProtocol> {
    match value.trim().to_ascii_lowercase().as_str() {
        "iamcredentials" | "iam-credentials" => Ok(SignBlobProtocol::IamCredentials),
        "legacy" | "iam" => Ok(SignBlobProtocol::LegacyIam),
        other => Err(anyhow!(
            "Unsupported sign-blob protocol '{other}'. Use iamcredentials or legacy."
        )),
    }
}
