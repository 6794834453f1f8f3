//! Claim-by-claim verification of ID tokens and session cookies.
//!
//! [`verify_token`] runs a fixed waterfall; the first failing check decides
//! the error:
//!
//! 1. no `kid` and a custom-token audience
//! 2. no `kid` and the legacy custom-token shape
//! 3. no `kid`
//! 4. algorithm other than RS256
//! 5. audience other than the project id
//! 6. issuer other than prefix + project id
//! 7. missing, empty or over-long subject
//! 8. current time outside `[iat - skew, exp + skew]`
//! 9. signature matched by none of the cached public keys
//!
//! Steps 1-8 run before any key is fetched.

use identity_errors::{AuthError, AuthResult, ErrorCode};
use jsonwebtoken::{crypto, Algorithm};
use serde_json::Value;
use tracing::debug;

use crate::claims::VerifiedToken;
use crate::config::{
    TokenKind, VerifierConfig, CUSTOM_TOKEN_AUDIENCE, EXPECTED_ALGORITHM, MAX_SUBJECT_LENGTH,
};
use crate::token::DecodedToken;

/// Verifier bound to one immutable configuration. Cheap to clone and safe to
/// share across threads.
#[derive(Clone, Debug)]
pub struct TokenVerifier {
    config: VerifierConfig,
}

impl TokenVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn verify(&self, token: &str) -> AuthResult<VerifiedToken> {
        verify_token(&self.config, token)
    }
}

pub fn verify_token(config: &VerifierConfig, token: &str) -> AuthResult<VerifiedToken> {
    let result = run_checks(config, token);
    if let Some(metrics) = config.metrics() {
        let outcome = match &result {
            Ok(_) => "valid",
            Err(AuthError::Runtime { .. }) => "runtime_error",
            Err(_) => "invalid",
        };
        metrics.verification(config.kind().label(), outcome);
    }
    result
}

fn run_checks(config: &VerifierConfig, token: &str) -> AuthResult<VerifiedToken> {
    let kind = config.kind();
    if token.is_empty() {
        return Err(AuthError::InvalidArgument(format!(
            "{} must be a non-empty string.",
            kind.display_name()
        )));
    }

    let decoded = DecodedToken::parse(token).map_err(|err| {
        invalid(
            kind,
            format!(
                "Decoding {} failed ({err}). Make sure you passed a string that represents a \
                 complete and valid JWT.",
                kind.short_name()
            ),
        )
    })?;

    check_claims(config, &decoded)?;
    check_signature(config, &decoded)?;

    let verified = VerifiedToken::from_decoded(&decoded, config.expected_audience(), kind.invalid_code())?;
    check_tenant(config, &verified)?;

    debug!(uid = %verified.uid, kind = kind.label(), "verified token successfully");
    Ok(verified)
}

fn check_claims(config: &VerifierConfig, decoded: &DecodedToken) -> AuthResult<()> {
    let kind = config.kind();
    let name = kind.display_name();
    let audience = decoded.audience();

    if decoded.key_id().is_none() {
        let message = if audience.contains(&CUSTOM_TOKEN_AUDIENCE) {
            format!(
                "{} expects {}, but was given a custom token.",
                kind.method_name(),
                kind.articled_name()
            )
        } else if is_legacy_custom_token(decoded) {
            format!(
                "{} expects {}, but was given a legacy custom token.",
                kind.method_name(),
                kind.articled_name()
            )
        } else {
            format!("{name} has no \"kid\" claim.")
        };
        return Err(invalid(kind, message));
    }

    if decoded.header.alg != EXPECTED_ALGORITHM {
        return Err(invalid(
            kind,
            format!(
                "{name} has incorrect algorithm. Expected \"{EXPECTED_ALGORITHM}\" but got \"{}\".",
                decoded.header.alg
            ),
        ));
    }

    if audience.as_slice() != [config.expected_audience()] {
        return Err(invalid(
            kind,
            format!(
                "{name} has incorrect \"aud\" (audience) claim. Expected \"{}\" but got \"{}\". {}",
                config.expected_audience(),
                audience.join(", "),
                project_match_hint(kind)
            ),
        ));
    }

    let issuer = decoded.issuer().unwrap_or_default();
    if issuer != config.expected_issuer() {
        return Err(invalid(
            kind,
            format!(
                "{name} has incorrect \"iss\" (issuer) claim. Expected \"{}\" but got \"{issuer}\". {}",
                config.expected_issuer(),
                project_match_hint(kind)
            ),
        ));
    }

    match decoded.subject() {
        None => {
            return Err(invalid(kind, format!("{name} has no \"sub\" (subject) claim.")));
        }
        Some("") => {
            return Err(invalid(
                kind,
                format!("{name} has an empty string \"sub\" (subject) claim."),
            ));
        }
        Some(subject) if subject.chars().count() > MAX_SUBJECT_LENGTH => {
            return Err(invalid(
                kind,
                format!(
                    "{name} has \"sub\" (subject) claim longer than {MAX_SUBJECT_LENGTH} characters."
                ),
            ));
        }
        Some(_) => {}
    }

    check_timestamps(config, decoded)
}

fn check_timestamps(config: &VerifierConfig, decoded: &DecodedToken) -> AuthResult<()> {
    let kind = config.kind();
    let name = kind.display_name();
    let now_millis = config.clock().now().timestamp_millis();
    let skew = config.clock_skew_seconds();

    let Some(expires_at) = decoded.expires_at() else {
        return Err(invalid(kind, format!("{name} has no \"exp\" (expiration time) claim.")));
    };
    let Some(issued_at) = decoded.issued_at() else {
        return Err(invalid(kind, format!("{name} has no \"iat\" (issued-at time) claim.")));
    };

    if now_millis > expires_at.saturating_add(skew).saturating_mul(1000) {
        return Err(AuthError::invalid_credential(
            kind.expired_code(),
            format!(
                "{name} has expired. Get a fresh {} and try again. {}",
                kind.short_name(),
                retrieve_hint(kind)
            ),
        ));
    }

    if now_millis < issued_at.saturating_sub(skew).saturating_mul(1000) {
        return Err(invalid(
            kind,
            format!("{name} is not yet valid: \"iat\" (issued-at time) claim is in the future."),
        ));
    }

    Ok(())
}

fn check_signature(config: &VerifierConfig, decoded: &DecodedToken) -> AuthResult<()> {
    let kind = config.kind();
    let keys = config.key_cache().get_keys()?;

    // Either side of a rotation may be the only valid signer, so every key is tried.
    let mut failures = 0usize;
    let mut last_error = None;
    for key in keys.iter() {
        match crypto::verify(
            decoded.signature(),
            decoded.signing_input(),
            key.decoding_key(),
            Algorithm::RS256,
        ) {
            Ok(true) => {
                debug!(kid = key.kid(), "signature matched");
                return Ok(());
            }
            Ok(false) => {}
            Err(err) => {
                failures += 1;
                last_error = Some(err);
            }
        }
    }

    if let Some(err) = last_error {
        if failures == keys.len() {
            return Err(AuthError::runtime(
                ErrorCode::Internal,
                format!(
                    "Error while verifying signature of {}: {err}",
                    kind.short_name()
                ),
            ));
        }
    }

    Err(invalid(
        kind,
        format!("Failed to verify the signature of {}.", kind.short_name()),
    ))
}

fn check_tenant(config: &VerifierConfig, verified: &VerifiedToken) -> AuthResult<()> {
    let Some(expected) = config.tenant_id() else {
        return Ok(());
    };
    let actual = verified.tenant_id.as_deref().unwrap_or_default();
    if actual != expected {
        return Err(AuthError::invalid_credential(
            ErrorCode::TenantIdMismatch,
            format!(
                "The tenant ID ('{actual}') of the {} did not match the expected value ('{expected}').",
                config.kind().short_name()
            ),
        ));
    }
    Ok(())
}

/// HS256 token carrying a numeric `v` and a `d.uid` claim, as minted by the
/// pre-RS256 token generator.
fn is_legacy_custom_token(decoded: &DecodedToken) -> bool {
    decoded.header.alg == "HS256"
        && decoded.payload.get("v").is_some_and(Value::is_number)
        && decoded
            .payload
            .get("d")
            .and_then(|data| data.get("uid"))
            .is_some_and(Value::is_string)
}

fn invalid(kind: TokenKind, message: String) -> AuthError {
    AuthError::invalid_credential(kind.invalid_code(), format!("{message} {}", retrieve_hint(kind)))
}

fn retrieve_hint(kind: TokenKind) -> String {
    format!(
        "See {} for details on how to retrieve {}.",
        kind.doc_url(),
        kind.articled_name()
    )
}

fn project_match_hint(kind: TokenKind) -> String {
    format!(
        "Make sure the {} comes from the same project as the credential used to initialize this client.",
        kind.short_name()
    )
}
