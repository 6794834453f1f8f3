mod support;

use std::sync::Arc;

use httpmock::prelude::*;
use identity_admin::{CryptoSigner, RemoteSigner, SignBlobApi, StaticAccessToken};
use identity_auth::{AuthError, ErrorCode};
use identity_observability::TrustMetrics;
use reqwest::blocking::Client;
use serde_json::json;
use support::*;

fn remote(server: &MockServer, api: SignBlobApi) -> RemoteSigner {
    RemoteSigner::new(
        Client::new(),
        ACCOUNT,
        api.with_base_url(server.base_url()),
        Some(Arc::new(StaticAccessToken::new("ya29.test"))),
    )
}

#[test]
fn sends_payload_and_decodes_signed_blob() {
    let server = MockServer::start();
    let sign_blob = server.mock(|when, then| {
        when.method(POST)
            .path(sign_blob_path(ACCOUNT))
            .header("authorization", "Bearer ya29.test")
            .json_body(json!({"payload": "aGVsbG8="}));
        then.status(200)
            .json_body(json!({"keyId": "k1", "signedBlob": "c2lnbmF0dXJl"}));
    });

    let signer = remote(&server, SignBlobApi::iam_credentials());
    let signature = signer.sign(b"hello").expect("remote signature");

    assert_eq!(signature, b"signature".to_vec());
    assert_eq!(signer.account(), ACCOUNT);
    sign_blob.assert_hits(1);
}

#[test]
fn legacy_protocol_uses_its_field_names() {
    let server = MockServer::start();
    let sign_blob = server.mock(|when, then| {
        when.method(POST)
            .path(sign_blob_path(ACCOUNT))
            .json_body(json!({"bytesToSign": "aGVsbG8="}));
        then.status(200).json_body(json!({"signature": "c2lnbmF0dXJl"}));
    });

    let signer = remote(&server, SignBlobApi::legacy_iam());
    assert_eq!(signer.sign(b"hello").expect("signature"), b"signature".to_vec());
    sign_blob.assert_hits(1);
}

#[test]
fn backend_error_is_translated() {
    let server = MockServer::start();
    let body = json!({
        "error": {"code": 403, "message": "INSUFFICIENT_PERMISSION: missing signBlob permission"}
    });
    let _sign_blob = server.mock(|when, then| {
        when.method(POST).path(sign_blob_path(ACCOUNT));
        then.status(403).json_body(body);
    });

    let err = remote(&server, SignBlobApi::iam_credentials())
        .sign(b"hello")
        .expect_err("permission denied");

    assert_eq!(err.code(), ErrorCode::InsufficientPermission);
    assert!(err.to_string().contains("missing signBlob permission"));
    assert_eq!(err.response().map(|response| response.status), Some(403));
    assert!(!err.is_retryable());
}

#[test]
fn unknown_backend_error_keeps_status_and_body() {
    let server = MockServer::start();
    let _sign_blob = server.mock(|when, then| {
        when.method(POST).path(sign_blob_path(ACCOUNT));
        then.status(502).body("bad gateway");
    });

    let err = remote(&server, SignBlobApi::iam_credentials())
        .sign(b"hello")
        .expect_err("gateway failure");

    assert_eq!(err.code(), ErrorCode::Internal);
    assert!(err.to_string().contains("502"));
    assert!(err.to_string().contains("bad gateway"));
}

#[test]
fn response_without_signature_field_fails() {
    let server = MockServer::start();
    let _sign_blob = server.mock(|when, then| {
        when.method(POST).path(sign_blob_path(ACCOUNT));
        then.status(200).json_body(json!({"keyId": "k1"}));
    });

    let err = remote(&server, SignBlobApi::iam_credentials())
        .sign(b"hello")
        .expect_err("missing field");
    assert!(matches!(err, AuthError::Transport { .. }));
    assert!(err.to_string().contains("signedBlob"));
}

#[test]
fn records_sign_outcomes() {
    let server = MockServer::start();
    let _sign_blob = server.mock(|when, then| {
        when.method(POST).path(sign_blob_path(ACCOUNT));
        then.status(200).json_body(json!({"signedBlob": "c2lnbmF0dXJl"}));
    });
    let metrics = TrustMetrics::new().expect("metrics");

    let signer = remote(&server, SignBlobApi::iam_credentials()).with_metrics(Some(metrics.clone()));
    signer.sign(b"one").expect("first");
    signer.sign(b"two").expect("second");

    assert_eq!(metrics.sign_request_count("remote", "ok"), 2);
    assert_eq!(metrics.sign_request_count("remote", "error"), 0);
}
