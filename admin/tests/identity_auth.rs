mod support;

use std::io::Write;
use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use httpmock::prelude::*;
use identity_admin::{AdminConfig, Credential, IdentityAuth, ServiceAccountKey, StaticAccessToken};
use identity_auth::{AuthError, ErrorCode};
use identity_observability::TrustMetrics;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use support::*;

fn config(server: &MockServer) -> AdminConfig {
    AdminConfig {
        project_id: Some(PROJECT_ID.to_string()),
        metadata_url: server.base_url(),
        id_token_cert_url: server.url(CERTS_PATH),
        session_cookie_cert_url: server.url(CERTS_PATH),
        ..AdminConfig::default()
    }
}

fn signed(issuer_prefix: &str, tenant: Option<&str>) -> String {
    let mut firebase = json!({"sign_in_provider": "custom"});
    if let Some(tenant) = tenant {
        firebase["tenant"] = json!(tenant);
    }
    let claims = json!({
        "iss": format!("{issuer_prefix}{PROJECT_ID}"),
        "aud": PROJECT_ID,
        "sub": "user-9",
        "iat": NOW - 10,
        "exp": NOW + 600,
        "firebase": firebase,
    });
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some("key-1".to_string());
    let key = EncodingKey::from_rsa_pem(key_material().private_pem.as_bytes()).expect("encoding key");
    encode(&header, &claims, &key).expect("sign token")
}

#[test]
fn verifies_id_tokens_and_session_cookies_through_shared_caches() {
    let server = MockServer::start();
    let certs = mock_certs(&server);
    let metrics = TrustMetrics::new().expect("metrics");
    let auth = IdentityAuth::new(
        &config(&server),
        Credential::ServiceAccount(service_account_key()),
        Client::new(),
        clock(),
        Some(metrics.clone()),
    )
    .expect("identity auth");

    let id_token = auth
        .verify_id_token(&signed("https://securetoken.google.com/", None))
        .expect("id token");
    assert_eq!(id_token.uid, "user-9");
    assert_eq!(id_token.sign_in_provider.as_deref(), Some("custom"));

    let cookie = auth
        .verify_session_cookie(&signed("https://session.firebase.google.com/", None))
        .expect("session cookie");
    assert_eq!(cookie.issuer, format!("https://session.firebase.google.com/{PROJECT_ID}"));

    let err = auth
        .verify_session_cookie(&signed("https://securetoken.google.com/", None))
        .expect_err("wrong issuer for a cookie");
    assert_eq!(err.code(), ErrorCode::InvalidSessionCookie);

    // One fetch per cache; both point at the same endpoint here.
    assert_eq!(certs.hits(), 2);
    assert_eq!(metrics.verification_count("id_token", "valid"), 1);
    assert_eq!(metrics.verification_count("session_cookie", "valid"), 1);
    assert!(auth.key_caches().id_token().cached().is_some());
}

#[test]
fn configured_tenant_is_enforced_and_stamped() {
    let server = MockServer::start();
    let _certs = mock_certs(&server);
    let config = AdminConfig {
        tenant_id: Some("tenant-a".to_string()),
        ..config(&server)
    };
    let auth = IdentityAuth::new(
        &config,
        Credential::ServiceAccount(service_account_key()),
        Client::new(),
        clock(),
        None,
    )
    .expect("identity auth");

    let verified = auth
        .verify_id_token(&signed("https://securetoken.google.com/", Some("tenant-a")))
        .expect("tenant token");
    assert_eq!(verified.tenant_id.as_deref(), Some("tenant-a"));

    let err = auth
        .verify_id_token(&signed("https://securetoken.google.com/", Some("tenant-b")))
        .expect_err("other tenant");
    assert_eq!(err.code(), ErrorCode::TenantIdMismatch);

    let token = auth.create_custom_token("user-1", None).expect("custom token");
    let payload = token.split('.').nth(1).expect("payload segment");
    let claims: Value =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).expect("payload bytes"))
            .expect("payload json");
    assert_eq!(claims["tenant_id"], "tenant-a");
}

#[test]
fn project_id_falls_back_to_the_key_file() {
    let server = MockServer::start();
    let metadata = mock_metadata_email(&server, DISCOVERED);
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    file.write_all(service_account_json("file-project").as_bytes())
        .expect("write key file");

    let key = ServiceAccountKey::from_file(file.path()).expect("key file");
    assert_eq!(key.private_key_id(), Some("key-1"));
    let config = AdminConfig {
        project_id: None,
        ..config(&server)
    };
    let auth = IdentityAuth::new(
        &config,
        Credential::ServiceAccount(key),
        Client::new(),
        clock(),
        None,
    )
    .expect("identity auth");

    assert_eq!(auth.project_id(), "file-project");
    assert_eq!(auth.signer_account().expect("account"), ACCOUNT);
    assert_eq!(metadata.hits(), 0);
}

#[test]
fn missing_project_id_is_a_configuration_error() {
    let server = MockServer::start();
    let config = AdminConfig {
        project_id: None,
        ..config(&server)
    };
    let err = IdentityAuth::new(
        &config,
        Credential::AccessToken(Arc::new(StaticAccessToken::new("ya29.test"))),
        Client::new(),
        clock(),
        None,
    )
    .err()
    .expect("project id required");

    assert!(matches!(err, AuthError::Configuration(_)));
    assert_eq!(err.code(), ErrorCode::ConfigurationFailure);
}

#[test]
fn signer_is_discovered_lazily() {
    let server = MockServer::start();
    let metadata = mock_metadata_email(&server, DISCOVERED);
    let auth = IdentityAuth::new(
        &config(&server),
        Credential::AccessToken(Arc::new(StaticAccessToken::new("ya29.test"))),
        Client::new(),
        clock(),
        None,
    )
    .expect("identity auth");
    assert_eq!(metadata.hits(), 0);

    assert_eq!(auth.signer_account().expect("account"), DISCOVERED);
    assert_eq!(auth.signer_account().expect("account"), DISCOVERED);
    assert_eq!(metadata.hits(), 1);
}
