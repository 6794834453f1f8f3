//! Verification half of the identity trust core: a rotating public-key cache
//! and the ID-token / session-cookie verifiers built on top of it.

pub mod claims;
pub mod clock;
pub mod config;
pub mod keys;
pub mod token;
pub mod verifier;

pub use claims::VerifiedToken;
#[cfg(any(test, feature = "test-helpers"))]
pub use clock::FixedClock;
pub use clock::{Clock, SystemClock};
pub use config::{TokenKind, VerifierConfig, VerifierOptions, CUSTOM_TOKEN_AUDIENCE};
pub use identity_errors::{AuthError, AuthResult, ErrorCode};
pub use keys::{KeyCacheRegistry, PublicKey, PublicKeyCache, PublicKeySet};
pub use token::{DecodedToken, TokenHeader, TokenParseError};
pub use verifier::{verify_token, TokenVerifier};
