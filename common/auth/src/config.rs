use std::fmt;
use std::sync::Arc;

use identity_errors::{AuthError, AuthResult, ErrorCode};
use identity_observability::TrustMetrics;

use crate::clock::Clock;
use crate::keys::{KeyCacheRegistry, PublicKeyCache};

/// Audience stamped on custom tokens minted by this library.
pub const CUSTOM_TOKEN_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

pub const ID_TOKEN_CERT_URL: &str =
    "https://www.googleapis.com/robot/v1/metadata/x509/securetoken@system.gserviceaccount.com";
pub const SESSION_COOKIE_CERT_URL: &str =
    "https://www.googleapis.com/identitytoolkit/v3/relyingparty/publicKeys";

pub const ID_TOKEN_ISSUER_PREFIX: &str = "https://securetoken.google.com/";
pub const SESSION_COOKIE_ISSUER_PREFIX: &str = "https://session.firebase.google.com/";

pub const EXPECTED_ALGORITHM: &str = "RS256";
pub const MAX_SUBJECT_LENGTH: usize = 128;
pub const DEFAULT_CLOCK_SKEW_SECONDS: i64 = 300;

/// Which kind of inbound credential a verifier accepts. Drives issuer prefix
/// and all user-facing phrasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    IdToken,
    SessionCookie,
}

impl TokenKind {
    pub fn issuer_prefix(&self) -> &'static str {
        match self {
            TokenKind::IdToken => ID_TOKEN_ISSUER_PREFIX,
            TokenKind::SessionCookie => SESSION_COOKIE_ISSUER_PREFIX,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            TokenKind::IdToken => "ID token",
            TokenKind::SessionCookie => "session cookie",
        }
    }

    /// Short name with its indefinite article.
    pub fn articled_name(&self) -> &'static str {
        match self {
            TokenKind::IdToken => "an ID token",
            TokenKind::SessionCookie => "a session cookie",
        }
    }

    /// Short name capitalised for the start of a sentence.
    pub fn display_name(&self) -> &'static str {
        match self {
            TokenKind::IdToken => "ID token",
            TokenKind::SessionCookie => "Session cookie",
        }
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            TokenKind::IdToken => "verify_id_token()",
            TokenKind::SessionCookie => "verify_session_cookie()",
        }
    }

    pub fn doc_url(&self) -> &'static str {
        match self {
            TokenKind::IdToken => "https://firebase.google.com/docs/auth/admin/verify-id-tokens",
            TokenKind::SessionCookie => "https://firebase.google.com/docs/auth/admin/manage-cookies",
        }
    }

    pub fn invalid_code(&self) -> ErrorCode {
        match self {
            TokenKind::IdToken => ErrorCode::InvalidIdToken,
            TokenKind::SessionCookie => ErrorCode::InvalidSessionCookie,
        }
    }

    pub fn expired_code(&self) -> ErrorCode {
        match self {
            TokenKind::IdToken => ErrorCode::IdTokenExpired,
            TokenKind::SessionCookie => ErrorCode::SessionCookieExpired,
        }
    }

    /// Label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            TokenKind::IdToken => "id_token",
            TokenKind::SessionCookie => "session_cookie",
        }
    }
}

/// Optional knobs for [`VerifierConfig`].
#[derive(Clone)]
pub struct VerifierOptions {
    /// Allowed clock drift applied to `iat` and `exp`, in seconds.
    pub clock_skew_seconds: i64,
    /// When set, tokens must carry this tenant in `firebase.tenant`.
    pub tenant_id: Option<String>,
    pub metrics: Option<TrustMetrics>,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            clock_skew_seconds: DEFAULT_CLOCK_SKEW_SECONDS,
            tenant_id: None,
            metrics: None,
        }
    }
}

/// Immutable verifier configuration, validated once at construction.
#[derive(Clone)]
pub struct VerifierConfig {
    kind: TokenKind,
    expected_audience: String,
    expected_issuer: String,
    key_cache: Arc<PublicKeyCache>,
    clock: Arc<dyn Clock>,
    clock_skew_seconds: i64,
    tenant_id: Option<String>,
    metrics: Option<TrustMetrics>,
}

impl VerifierConfig {
    pub fn new(
        kind: TokenKind,
        project_id: &str,
        key_cache: Arc<PublicKeyCache>,
        clock: Arc<dyn Clock>,
        options: VerifierOptions,
    ) -> AuthResult<Self> {
        let project_id = project_id.trim();
        if project_id.is_empty() {
            return Err(AuthError::InvalidArgument(format!(
                "A project id is required to verify {} tokens. Configure the client with a \
                 project id or set the GOOGLE_CLOUD_PROJECT environment variable.",
                kind.short_name()
            )));
        }
        if options.clock_skew_seconds < 0 {
            return Err(AuthError::InvalidArgument(format!(
                "clock skew must not be negative, got {}",
                options.clock_skew_seconds
            )));
        }
        if matches!(options.tenant_id.as_deref(), Some(tenant) if tenant.trim().is_empty()) {
            return Err(AuthError::InvalidArgument(
                "tenant id must be a non-empty string".to_string(),
            ));
        }

        Ok(Self {
            kind,
            expected_audience: project_id.to_string(),
            expected_issuer: format!("{}{}", kind.issuer_prefix(), project_id),
            key_cache,
            clock,
            clock_skew_seconds: options.clock_skew_seconds,
            tenant_id: options.tenant_id,
            metrics: options.metrics,
        })
    }

    pub fn id_token(
        project_id: &str,
        registry: &KeyCacheRegistry,
        clock: Arc<dyn Clock>,
        options: VerifierOptions,
    ) -> AuthResult<Self> {
        Self::new(
            TokenKind::IdToken,
            project_id,
            Arc::clone(registry.id_token()),
            clock,
            options,
        )
    }

    pub fn session_cookie(
        project_id: &str,
        registry: &KeyCacheRegistry,
        clock: Arc<dyn Clock>,
        options: VerifierOptions,
    ) -> AuthResult<Self> {
        Self::new(
            TokenKind::SessionCookie,
            project_id,
            Arc::clone(registry.session_cookie()),
            clock,
            options,
        )
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn expected_audience(&self) -> &str {
        &self.expected_audience
    }

    pub fn expected_issuer(&self) -> &str {
        &self.expected_issuer
    }

    pub fn key_cache(&self) -> &Arc<PublicKeyCache> {
        &self.key_cache
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn clock_skew_seconds(&self) -> i64 {
        self.clock_skew_seconds
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn metrics(&self) -> Option<&TrustMetrics> {
        self.metrics.as_ref()
    }
}

impl fmt::Debug for VerifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifierConfig")
            .field("kind", &self.kind)
            .field("expected_audience", &self.expected_audience)
            .field("expected_issuer", &self.expected_issuer)
            .field("key_url", &self.key_cache.url())
            .field("clock_skew_seconds", &self.clock_skew_seconds)
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}
