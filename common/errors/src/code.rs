use std::fmt;

use serde::Serialize;

/// Closed set of machine-checkable error codes surfaced by the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "&'static str")]
pub enum ErrorCode {
    InvalidArgument,
    InvalidCredential,
    InvalidIdToken,
    IdTokenExpired,
    InvalidSessionCookie,
    SessionCookieExpired,
    CertificateFetchFailed,
    ConfigurationFailure,
    ConfigurationNotFound,
    EmailAlreadyExists,
    UidAlreadyExists,
    PhoneNumberAlreadyExists,
    EmailNotFound,
    UserNotFound,
    InsufficientPermission,
    ClaimsTooLarge,
    ProjectNotFound,
    TenantNotFound,
    TenantIdMismatch,
    InvalidDynamicLinkDomain,
    UnauthorizedContinueUri,
    WeakPassword,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "invalid-argument",
            ErrorCode::InvalidCredential => "invalid-credential",
            ErrorCode::InvalidIdToken => "invalid-id-token",
            ErrorCode::IdTokenExpired => "id-token-expired",
            ErrorCode::InvalidSessionCookie => "invalid-session-cookie",
            ErrorCode::SessionCookieExpired => "session-cookie-expired",
            ErrorCode::CertificateFetchFailed => "certificate-fetch-failed",
            ErrorCode::ConfigurationFailure => "configuration-failure",
            ErrorCode::ConfigurationNotFound => "configuration-not-found",
            ErrorCode::EmailAlreadyExists => "email-already-exists",
            ErrorCode::UidAlreadyExists => "uid-already-exists",
            ErrorCode::PhoneNumberAlreadyExists => "phone-number-already-exists",
            ErrorCode::EmailNotFound => "email-not-found",
            ErrorCode::UserNotFound => "user-not-found",
            ErrorCode::InsufficientPermission => "insufficient-permission",
            ErrorCode::ClaimsTooLarge => "claims-too-large",
            ErrorCode::ProjectNotFound => "project-not-found",
            ErrorCode::TenantNotFound => "tenant-not-found",
            ErrorCode::TenantIdMismatch => "tenant-id-mismatch",
            ErrorCode::InvalidDynamicLinkDomain => "invalid-dynamic-link-domain",
            ErrorCode::UnauthorizedContinueUri => "unauthorized-continue-uri",
            ErrorCode::WeakPassword => "weak-password",
            ErrorCode::Internal => "internal-error",
        }
    }
}

impl From<ErrorCode> for &'static str {
    fn from(value: ErrorCode) -> Self {
        value.as_str()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
