//! Listener lifecycle integration tests.
//!
//! These bind real sockets on 127.0.0.1 and talk to them over HTTP.

use std::net::SocketAddr;

use reqwest::StatusCode;
use serde_json::{json, Value};

use super::test_utils::{test_server, VALID_TOKEN};

/// A fresh client per test so no pooled connection outlives a listener.
fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{}{}", addr, path)
}

#[tokio::test]
async fn test_started_server_answers_requests() {
    let (server, _) = test_server();
    let addr = server.start(0).await.unwrap();
    assert_eq!(server.local_addr().await, Some(addr));
    let client = client();

    let response = client.get(url(addr, "/status")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.text().await.unwrap(), "Unauthorized");

    let response = client
        .post(url(addr, "/change"))
        .json(&json!({ "token": VALID_TOKEN }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "changed": false }));

    server.stop().await;
}

#[tokio::test]
async fn test_stopped_server_releases_port() {
    let (server, _) = test_server();
    let addr = server.start(0).await.unwrap();

    let response = client()
        .get(url(addr, "/status"))
        .bearer_auth(VALID_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    server.stop().await;
    assert!(!server.is_running().await);
    assert!(client().get(url(addr, "/status")).send().await.is_err());

    // The port can be bound again once released.
    assert!(tokio::net::TcpListener::bind(addr).await.is_ok());
}

#[tokio::test]
async fn test_restart_on_another_port() {
    let (server, _) = test_server();
    let first = server.start(0).await.unwrap();

    let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = reserved.local_addr().unwrap().port();
    drop(reserved);

    let second = server.start(port).await.unwrap();
    assert_eq!(second.port(), port);
    assert_ne!(first, second);
    assert!(client().get(url(first, "/status")).send().await.is_err());

    let response = client()
        .get(url(second, "/status"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.text().await.unwrap(), "Forbidden");

    server.stop().await;
}

#[tokio::test]
async fn test_start_again_after_stop() {
    let (server, _) = test_server();
    server.start(0).await.unwrap();
    server.stop().await;

    let addr = server.start(0).await.unwrap();
    assert!(server.is_running().await);

    let response = client()
        .get(url(addr, "/status"))
        .bearer_auth(VALID_TOKEN)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    server.stop().await;
}
