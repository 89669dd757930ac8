//! Authentication integration tests.
//!
//! Tests verify:
//! - Missing tokens are rejected with 401 without calling the verifier
//! - Rejected tokens yield 403
//! - Accepted tokens reach the handler
//! - Body tokens take precedence over the `Authorization` header
//! - Verifier failures yield a fixed 500

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use serde_json::json;

use dlc_server::{DlcServer, FORBIDDEN_BODY, SERVER_ERROR_BODY, UNAUTHORIZED_BODY};

use super::test_utils::{
    bare_request, json_request, send, test_config, test_server, FailingVerifier, VALID_TOKEN,
};

// =============================================================================
// Missing Tokens
// =============================================================================

#[tokio::test]
async fn test_status_without_token_is_unauthorized() {
    let (server, verifier) = test_server();

    let response = send(server.instance(), bare_request(Method::GET, "/status", None)).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.text(), UNAUTHORIZED_BODY);
    assert_eq!(verifier.calls(), 0);
}

#[tokio::test]
async fn test_change_without_token_is_unauthorized() {
    let (server, verifier) = test_server();

    let request = json_request(Method::POST, "/change", &json!({ "relays": [] }));
    let response = send(server.instance(), request).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.text(), UNAUTHORIZED_BODY);
    assert_eq!(verifier.calls(), 0);
}

#[tokio::test]
async fn test_empty_bearer_credential_is_unauthorized() {
    let (server, verifier) = test_server();

    let request = bare_request(Method::GET, "/status", Some("Bearer "));
    let response = send(server.instance(), request).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(verifier.calls(), 0);
}

#[tokio::test]
async fn test_empty_body_token_is_unauthorized() {
    let (server, verifier) = test_server();

    let request = json_request(Method::POST, "/change", &json!({ "token": "" }));
    let response = send(server.instance(), request).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(verifier.calls(), 0);
}

#[tokio::test]
async fn test_unreadable_authorization_header_is_not_fatal() {
    let (server, verifier) = test_server();

    let mut request = bare_request(Method::GET, "/status", None);
    request.headers_mut().insert(
        header::AUTHORIZATION,
        HeaderValue::from_bytes(b"Bearer \xfftoken").unwrap(),
    );
    let response = send(server.instance(), request).await;

    // Treated as "no token found", so the gate answers rather than a 400.
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(verifier.calls(), 0);
}

// =============================================================================
// Rejected Tokens
// =============================================================================

#[tokio::test]
async fn test_wrong_bearer_token_is_forbidden() {
    let (server, verifier) = test_server();

    let request = bare_request(Method::GET, "/status", Some("Bearer wrong"));
    let response = send(server.instance(), request).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.text(), FORBIDDEN_BODY);
    assert_eq!(verifier.seen(), vec!["wrong".to_string()]);
}

#[tokio::test]
async fn test_wrong_body_token_is_forbidden() {
    let (server, verifier) = test_server();

    let request = json_request(Method::POST, "/change", &json!({ "token": "wrong" }));
    let response = send(server.instance(), request).await;

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.text(), FORBIDDEN_BODY);
    assert_eq!(verifier.calls(), 1);
}

// =============================================================================
// Accepted Tokens
// =============================================================================

#[tokio::test]
async fn test_valid_bearer_token_reads_status() {
    let (server, verifier) = test_server();

    let request = bare_request(Method::GET, "/status", Some("Bearer token"));
    let response = send(server.instance(), request).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({}));
    assert_eq!(verifier.calls(), 1);
}

#[tokio::test]
async fn test_valid_body_token_reads_status() {
    let (server, _) = test_server();

    let request = json_request(Method::GET, "/status", &json!({ "token": VALID_TOKEN }));
    let response = send(server.instance(), request).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({}));
}

#[tokio::test]
async fn test_valid_bearer_token_posts_change() {
    let (server, _) = test_server();

    let request = bare_request(Method::POST, "/change", Some("Bearer token"));
    let response = send(server.instance(), request).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({ "changed": false }));
}

#[tokio::test]
async fn test_body_token_takes_precedence_over_header() {
    let (server, verifier) = test_server();

    let mut request = json_request(Method::POST, "/change", &json!({ "token": VALID_TOKEN }));
    request.headers_mut().insert(
        header::AUTHORIZATION,
        HeaderValue::from_static("Bearer wrong"),
    );
    let response = send(server.instance(), request).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(verifier.seen(), vec![VALID_TOKEN.to_string()]);
}

#[tokio::test]
async fn test_header_fills_in_non_string_body_token() {
    let (server, verifier) = test_server();

    let mut request = json_request(Method::POST, "/change", &json!({ "token": 7 }));
    request.headers_mut().insert(
        header::AUTHORIZATION,
        HeaderValue::from_static("Bearer token"),
    );
    let response = send(server.instance(), request).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(verifier.seen(), vec![VALID_TOKEN.to_string()]);
}

// =============================================================================
// Verifier Failures
// =============================================================================

#[tokio::test]
async fn test_verifier_failure_is_server_error() {
    let server = DlcServer::new(FailingVerifier, test_config());

    for request in [
        bare_request(Method::GET, "/status", Some("Bearer token")),
        json_request(Method::POST, "/change", &json!({ "token": "token" })),
    ] {
        let response = send(server.instance(), request).await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.text(), SERVER_ERROR_BODY);
        assert!(!response.text().contains("secret detail"));
    }
}

#[tokio::test]
async fn test_verifier_failure_without_token_is_still_unauthorized() {
    let server = DlcServer::new(FailingVerifier, test_config());

    let request = Request::builder()
        .method(Method::GET)
        .uri("/status")
        .body(Body::empty())
        .unwrap();
    let response = send(server.instance(), request).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}
