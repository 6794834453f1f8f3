#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use httpmock::prelude::*;
use httpmock::Mock;
use identity_auth::{
    FixedClock, PublicKeyCache, TokenKind, TokenVerifier, VerifierConfig, VerifierOptions,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};

pub const PROJECT_ID: &str = "test-project";
pub const NOW: i64 = 1_700_000_000;
pub const CERTS_PATH: &str = "/certs";

pub struct KeyMaterial {
    pub encoding: EncodingKey,
    pub public_pem: String,
}

fn generate() -> KeyMaterial {
    let mut rng = OsRng;
    let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("key generation");
    let private_pem = private_key
        .to_pkcs1_pem(LineEnding::LF)
        .expect("private pem");
    let public_pem = private_key
        .to_public_key()
        .to_pkcs1_pem(LineEnding::LF)
        .expect("public pem");
    KeyMaterial {
        encoding: EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("encoding key"),
        public_pem,
    }
}

pub fn primary_key() -> &'static KeyMaterial {
    static KEY: OnceLock<KeyMaterial> = OnceLock::new();
    KEY.get_or_init(generate)
}

pub fn rotated_key() -> &'static KeyMaterial {
    static KEY: OnceLock<KeyMaterial> = OnceLock::new();
    KEY.get_or_init(generate)
}

pub fn cert_body(entries: &[(&str, &KeyMaterial)]) -> String {
    let map: serde_json::Map<String, Value> = entries
        .iter()
        .map(|(kid, material)| (kid.to_string(), Value::String(material.public_pem.clone())))
        .collect();
    Value::Object(map).to_string()
}

pub fn mock_certs<'a>(server: &'a MockServer, body: String, cache_control: &str) -> Mock<'a> {
    let cache_control = cache_control.to_string();
    server.mock(|when, then| {
        when.method(GET).path(CERTS_PATH);
        then.status(200)
            .header("content-type", "application/json")
            .header("cache-control", cache_control.as_str())
            .body(body);
    })
}

pub fn id_token_claims() -> Value {
    json!({
        "iss": format!("https://securetoken.google.com/{PROJECT_ID}"),
        "aud": PROJECT_ID,
        "sub": "user-1",
        "iat": NOW - 60,
        "exp": NOW + 3600,
        "auth_time": NOW - 60,
        "firebase": {"sign_in_provider": "password"}
    })
}

pub fn session_cookie_claims() -> Value {
    let mut claims = id_token_claims();
    claims["iss"] = json!(format!("https://session.firebase.google.com/{PROJECT_ID}"));
    claims
}

pub fn sign(material: &KeyMaterial, kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &material.encoding).expect("sign token")
}

/// Compact token with an arbitrary header and a junk signature.
pub fn unsigned(header: Value, claims: &Value) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        URL_SAFE_NO_PAD.encode(b"not-a-signature")
    )
}

pub fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::at_timestamp(NOW))
}

pub fn key_cache(server: &MockServer, clock: Arc<FixedClock>) -> Arc<PublicKeyCache> {
    Arc::new(PublicKeyCache::new(Client::new(), server.url(CERTS_PATH), clock))
}

pub fn verifier_with(
    kind: TokenKind,
    server: &MockServer,
    clock: Arc<FixedClock>,
    options: VerifierOptions,
) -> TokenVerifier {
    let cache = key_cache(server, Arc::clone(&clock));
    let config = VerifierConfig::new(kind, PROJECT_ID, cache, clock, options).expect("config");
    TokenVerifier::new(config)
}

pub fn verifier(kind: TokenKind, server: &MockServer, clock: Arc<FixedClock>) -> TokenVerifier {
    verifier_with(kind, server, clock, VerifierOptions::default())
}
