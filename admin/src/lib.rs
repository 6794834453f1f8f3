//! Signing half of the identity trust core plus the `IdentityAuth` facade
//! that wires it to the verifiers in `identity-auth`.

pub mod auth;
pub mod config;
pub mod credentials;
pub mod metadata;
pub mod resolver;
pub mod signer;
pub mod tokens;

pub use auth::IdentityAuth;
pub use config::{admin_config_from, load_admin_config, AdminConfig, SignBlobProtocol};
pub use credentials::{AccessTokenSource, Credential, NativeSigner, ServiceAccountKey, StaticAccessToken};
pub use metadata::{discover_service_account, MetadataAccessToken, METADATA_URL};
pub use resolver::{SignerOptions, SignerResolver};
pub use signer::{CryptoSigner, LocalKeySigner, RemoteSigner, SignBlobApi};
pub use tokens::{TokenFactory, CUSTOM_TOKEN_TTL_SECONDS, MAX_UID_LENGTH, RESERVED_CLAIMS};
