use identity_errors::{translate_response, AuthError, ErrorCode};

#[test]
fn email_exists_maps_to_email_already_exists() {
    let err = translate_response(400, r#"{"error":{"message":"EMAIL_EXISTS: dup"}}"#);
    assert_eq!(err.code(), ErrorCode::EmailAlreadyExists);
    assert_eq!(err.code().as_str(), "email-already-exists");
    assert!(err.to_string().contains("dup"));
}

#[test]
fn unknown_code_falls_back_to_internal_error() {
    let body = r#"{"error":{"message":"SOMETHING_NEW: surprise"}}"#;
    let err = translate_response(500, body);
    assert_eq!(err.code(), ErrorCode::Internal);
    let response = err.response().expect("raw response preserved");
    assert_eq!(response.status, 500);
    assert_eq!(response.body, body);
    assert!(err.to_string().contains("500"));
}

#[test]
fn unparsable_body_falls_back_to_internal_error() {
    let err = translate_response(502, "Bad Gateway");
    assert_eq!(err.code(), ErrorCode::Internal);
    assert_eq!(err.response().map(|r| r.body.as_str()), Some("Bad Gateway"));
    assert!(err.to_string().contains("Bad Gateway"));
}

#[test]
fn translated_errors_are_transport_failures() {
    let err = translate_response(403, r#"{"error":{"message":"INSUFFICIENT_PERMISSION"}}"#);
    assert!(matches!(err, AuthError::Transport { code: ErrorCode::InsufficientPermission, .. }));
    assert!(err.to_string().contains("(INSUFFICIENT_PERMISSION)"));
}

#[test]
fn unauthorized_domain_maps_to_continue_uri_code() {
    let err = translate_response(400, r#"{"error":{"message":"UNAUTHORIZED_DOMAIN : example.com"}}"#);
    assert_eq!(err.code(), ErrorCode::UnauthorizedContinueUri);
    assert!(err.to_string().ends_with("example.com"));
}
