use thiserror::Error;

use crate::code::ErrorCode;

pub type AuthResult<T> = Result<T, AuthError>;

/// Raw HTTP exchange kept alongside transport failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthError {
    /// A claim or signature check failed. Always attributable to the caller.
    #[error("{message}")]
    InvalidCredential { code: ErrorCode, message: String },

    /// Key fetch, key parse or crypto-library failure in the verifying environment.
    #[error("{message}")]
    Runtime { code: ErrorCode, message: String },

    /// Remote call failed or returned a non-2xx status.
    #[error("{message}")]
    Transport {
        code: ErrorCode,
        message: String,
        response: Option<HttpResponse>,
    },

    /// No usable signing identity could be established.
    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    InvalidArgument(String),
}

impl AuthError {
    pub fn invalid_credential(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::InvalidCredential {
            code,
            message: message.into(),
        }
    }

    pub fn runtime(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Runtime {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AuthError::InvalidCredential { code, .. }
            | AuthError::Runtime { code, .. }
            | AuthError::Transport { code, .. } => *code,
            AuthError::Configuration(_) => ErrorCode::ConfigurationFailure,
            AuthError::InvalidArgument(_) => ErrorCode::InvalidArgument,
        }
    }

    /// HTTP status and body of the failed exchange, when one was received.
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            AuthError::Transport { response, .. } => response.as_ref(),
            _ => None,
        }
    }

    /// Runtime failures stem from the verifier's own environment and may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::Runtime { .. })
    }
}
