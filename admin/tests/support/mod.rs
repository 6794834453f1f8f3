#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use httpmock::prelude::*;
use httpmock::Mock;
use identity_admin::ServiceAccountKey;
use identity_auth::FixedClock;
use jsonwebtoken::DecodingKey;
use rsa::pkcs1::{EncodeRsaPublicKey, LineEnding};
use rsa::pkcs8::EncodePrivateKey;
use rsa::rand_core::OsRng;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};

pub const PROJECT_ID: &str = "admin-project";
pub const NOW: i64 = 1_700_000_000;
pub const ACCOUNT: &str = "signer@admin-project.iam.gserviceaccount.com";
pub const DISCOVERED: &str = "compute@admin-project.iam.gserviceaccount.com";
pub const EMAIL_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/email";
pub const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";
pub const CERTS_PATH: &str = "/certs";

pub struct KeyMaterial {
    pub private_pem: String,
    pub public_pem: String,
}

pub fn key_material() -> &'static KeyMaterial {
    static KEY: OnceLock<KeyMaterial> = OnceLock::new();
    KEY.get_or_init(|| {
        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("key generation");
        KeyMaterial {
            private_pem: private_key
                .to_pkcs8_pem(LineEnding::LF)
                .expect("private pem")
                .to_string(),
            public_pem: private_key
                .to_public_key()
                .to_pkcs1_pem(LineEnding::LF)
                .expect("public pem"),
        }
    })
}

pub fn service_account_key() -> ServiceAccountKey {
    ServiceAccountKey::new(ACCOUNT, &key_material().private_pem).expect("service account key")
}

pub fn service_account_json(project_id: &str) -> String {
    json!({
        "type": "service_account",
        "project_id": project_id,
        "private_key_id": "key-1",
        "private_key": key_material().private_pem,
        "client_email": ACCOUNT,
    })
    .to_string()
}

pub fn decoding_key() -> DecodingKey {
    DecodingKey::from_rsa_pem(key_material().public_pem.as_bytes()).expect("decoding key")
}

pub fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::at_timestamp(NOW))
}

pub fn sign_blob_path(account: &str) -> String {
    format!("/v1/projects/-/serviceAccounts/{account}:signBlob")
}

pub fn mock_metadata_email<'a>(server: &'a MockServer, email: &str) -> Mock<'a> {
    let email = email.to_string();
    server.mock(|when, then| {
        when.method(GET)
            .path(EMAIL_PATH)
            .header("metadata-flavor", "Google");
        then.status(200).body(email);
    })
}

pub fn mock_certs(server: &MockServer) -> Mock<'_> {
    let body: Value = json!({ "key-1": key_material().public_pem });
    server.mock(|when, then| {
        when.method(GET).path(CERTS_PATH);
        then.status(200)
            .header("content-type", "application/json")
            .header("cache-control", "public, max-age=3600")
            .body(body.to_string());
    })
}

pub fn mock_metadata_token<'a>(server: &'a MockServer, token: &str) -> Mock<'a> {
    let body = json!({"access_token": token, "expires_in": 3599, "token_type": "Bearer"});
    server.mock(|when, then| {
        when.method(GET)
            .path(TOKEN_PATH)
            .header("metadata-flavor", "Google");
        then.status(200).json_body(body);
    })
}
