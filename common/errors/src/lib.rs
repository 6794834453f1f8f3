//! Error taxonomy shared by the signing and verification crates, plus the
//! translator that maps remote failures onto it.

pub mod code;
pub mod error;
pub mod translate;

pub use code::ErrorCode;
pub use error::{AuthError, AuthResult, HttpResponse};
pub use translate::{
    ensure_success, parse_envelope, parse_envelope_str, translate_response, translate_transport,
    BackendError, EnvelopeError,
};
