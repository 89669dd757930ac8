//! Log gating integration tests.
//!
//! Tests verify:
//! - `quiet` and `none` silence every event, including HTTP trace events
//! - Every event of a request, trace events included, carries its request id

use std::sync::{Arc, Mutex};

use axum::http::{Method, StatusCode};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use dlc_server::{DebugLevel, DlcServer, Environment, PartialOptions, ServerConfig};

use super::test_utils::{bare_request, send, FailingVerifier, RecordingVerifier};

/// One captured event.
#[derive(Debug, Clone)]
struct Captured {
    target: String,
    level: tracing::Level,
    /// Whether an enclosing span carries a `request_id` field
    has_request_id: bool,
}

/// Marker stored on spans created with a `request_id` field.
struct RequestIdSpan;

#[derive(Clone, Default)]
struct CaptureLayer {
    events: Arc<Mutex<Vec<Captured>>>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        if attrs.metadata().fields().field("request_id").is_some() {
            if let Some(span) = ctx.span(id) {
                span.extensions_mut().insert(RequestIdSpan);
            }
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let has_request_id = ctx
            .event_scope(event)
            .map(|mut scope| scope.any(|span| span.extensions().get::<RequestIdSpan>().is_some()))
            .unwrap_or(false);

        self.events.lock().unwrap().push(Captured {
            target: event.metadata().target().to_string(),
            level: *event.metadata().level(),
            has_request_id,
        });
    }
}

fn config(partial: PartialOptions) -> ServerConfig {
    // Tracing stays enabled so the gate alone decides.
    ServerConfig::from_partial(partial, Environment::Development)
}

/// Run one request with a capturing subscriber installed on this thread.
async fn capture_request(server: &DlcServer, authorization: &str) -> (StatusCode, Vec<Captured>) {
    let layer = CaptureLayer::default();
    let events = Arc::clone(&layer.events);
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(layer));

    let response = send(
        server.instance(),
        bare_request(Method::GET, "/status", Some(authorization)),
    )
    .await;

    let captured = events.lock().unwrap().clone();
    (response.status, captured)
}

#[tokio::test]
async fn test_quiet_silences_failing_request() {
    let server = DlcServer::new(
        FailingVerifier,
        config(PartialOptions::default().with_quiet(true)),
    );

    let (status, events) = capture_request(&server, "Bearer token").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(events.is_empty(), "unexpected events: {:?}", events);
}

#[tokio::test]
async fn test_level_none_silences_failing_request() {
    let server = DlcServer::new(
        FailingVerifier,
        config(PartialOptions::default().with_debug(DebugLevel::None)),
    );

    let (status, events) = capture_request(&server, "Bearer token").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(events.is_empty(), "unexpected events: {:?}", events);
}

#[tokio::test]
async fn test_error_level_keeps_only_errors() {
    let server = DlcServer::new(
        FailingVerifier,
        config(PartialOptions::default().with_debug(DebugLevel::Error)),
    );

    let (status, events) = capture_request(&server, "Bearer token").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!events.is_empty());
    assert!(
        events.iter().all(|e| e.level == tracing::Level::ERROR),
        "unexpected events: {:?}",
        events
    );
    assert!(events.iter().all(|e| !e.target.starts_with("tower_http")));
}

#[tokio::test]
async fn test_info_level_events_run_in_request_span() {
    let server = DlcServer::new(
        RecordingVerifier::new(),
        config(PartialOptions::default().with_debug(DebugLevel::Info)),
    );

    let (status, events) = capture_request(&server, "Bearer token").await;

    assert_eq!(status, StatusCode::OK);
    assert!(events.iter().any(|e| e.target.starts_with("tower_http")));
    assert!(events.iter().any(|e| e.target.starts_with("dlc_server")));
    for event in &events {
        assert!(event.has_request_id, "event without request id: {:?}", event);
    }
}
