//! Translation of remote failures into [`AuthError`] values.
//!
//! Backend errors arrive in a nested envelope of the form
//! `{"error": {"message": "CODE: optional details"}}`. Recognised codes map
//! onto a specific [`ErrorCode`]; anything else degrades to
//! [`ErrorCode::Internal`] with the raw status and body preserved.

use reqwest::blocking::Response;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::code::ErrorCode;
use crate::error::{AuthError, AuthResult, HttpResponse};

/// Backend error code and optional free-form details from an error envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub code: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("response body is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("response body has no error.message field")]
    MissingMessage,
    #[error("error.message is empty")]
    EmptyCode,
}

const BACKEND_CODES: &[(&str, ErrorCode, &str)] = &[
    (
        "CONFIGURATION_NOT_FOUND",
        ErrorCode::ConfigurationNotFound,
        "No identity provider configuration found for the given identifier",
    ),
    (
        "DUPLICATE_EMAIL",
        ErrorCode::EmailAlreadyExists,
        "The user with the provided email already exists",
    ),
    (
        "EMAIL_EXISTS",
        ErrorCode::EmailAlreadyExists,
        "The user with the provided email already exists",
    ),
    (
        "DUPLICATE_LOCAL_ID",
        ErrorCode::UidAlreadyExists,
        "The user with the provided uid already exists",
    ),
    (
        "PHONE_NUMBER_EXISTS",
        ErrorCode::PhoneNumberAlreadyExists,
        "The user with the provided phone number already exists",
    ),
    (
        "EMAIL_NOT_FOUND",
        ErrorCode::EmailNotFound,
        "No user record found for the given email",
    ),
    (
        "USER_NOT_FOUND",
        ErrorCode::UserNotFound,
        "No user record found for the given identifier",
    ),
    (
        "INSUFFICIENT_PERMISSION",
        ErrorCode::InsufficientPermission,
        "The credential used to initialize the client has insufficient permissions",
    ),
    (
        "CLAIMS_TOO_LARGE",
        ErrorCode::ClaimsTooLarge,
        "Developer claims exceed the maximum allowed payload size",
    ),
    (
        "PROJECT_NOT_FOUND",
        ErrorCode::ProjectNotFound,
        "No project found for the given identifier",
    ),
    (
        "TENANT_NOT_FOUND",
        ErrorCode::TenantNotFound,
        "No tenant found for the given identifier",
    ),
    (
        "TENANT_ID_MISMATCH",
        ErrorCode::TenantIdMismatch,
        "The tenant of the request does not match the tenant of the resource",
    ),
    (
        "INVALID_DYNAMIC_LINK_DOMAIN",
        ErrorCode::InvalidDynamicLinkDomain,
        "The dynamic link domain is not configured or authorized for the current project",
    ),
    (
        "UNAUTHORIZED_DOMAIN",
        ErrorCode::UnauthorizedContinueUri,
        "The domain of the continue URL is not authorized",
    ),
    (
        "WEAK_PASSWORD",
        ErrorCode::WeakPassword,
        "The password does not meet the minimum strength requirements",
    ),
];

/// Extract the backend code from a decoded error envelope.
pub fn parse_envelope(body: &Value) -> Result<BackendError, EnvelopeError> {
    let message = body
        .get("error")
        .and_then(|error| error.get("message"))
        .and_then(Value::as_str)
        .ok_or(EnvelopeError::MissingMessage)?;

    let (code, details) = match message.split_once(':') {
        Some((code, details)) => (code.trim(), Some(details.trim())),
        None => (message.trim(), None),
    };
    if code.is_empty() {
        return Err(EnvelopeError::EmptyCode);
    }

    Ok(BackendError {
        code: code.to_string(),
        details: details
            .filter(|value| !value.is_empty())
            .map(str::to_string),
    })
}

/// Decode a raw body and extract the backend code.
pub fn parse_envelope_str(body: &str) -> Result<BackendError, EnvelopeError> {
    let value: Value =
        serde_json::from_str(body).map_err(|err| EnvelopeError::InvalidJson(err.to_string()))?;
    parse_envelope(&value)
}

/// Map a non-2xx response onto the library taxonomy.
pub fn translate_response(status: u16, body: &str) -> AuthError {
    let response = Some(HttpResponse {
        status,
        body: body.to_string(),
    });

    let known = parse_envelope_str(body).ok().and_then(|backend| {
        BACKEND_CODES
            .iter()
            .find(|(name, _, _)| *name == backend.code)
            .map(|(name, code, text)| (backend.details, *name, *code, *text))
    });

    match known {
        Some((details, name, code, text)) => {
            let message = match details {
                Some(details) => format!("{text} ({name}): {details}"),
                None => format!("{text} ({name})."),
            };
            AuthError::Transport {
                code,
                message,
                response,
            }
        }
        None => AuthError::Transport {
            code: ErrorCode::Internal,
            message: format!("Unexpected HTTP response with status: {status}\n{body}"),
            response,
        },
    }
}

/// Map a failure that produced no HTTP response (connect, timeout, decode).
pub fn translate_transport(err: &reqwest::Error, service: &str) -> AuthError {
    warn!(service, error = %err, "request to remote service failed");
    AuthError::Transport {
        code: ErrorCode::Internal,
        message: format!("Error while calling the {service}: {err}"),
        response: None,
    }
}

/// Pass 2xx responses through; translate everything else.
pub fn ensure_success(response: Response) -> AuthResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    warn!(status = status.as_u16(), "remote service returned an error status");
    Err(translate_response(status.as_u16(), &body))
}
