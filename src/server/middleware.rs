//! Request interceptors run before route dispatch.
//!
//! Order is fixed by the router (outermost first):
//!
//! ```text
//! assign_request_id ─▶ negotiate_body ─▶ extract_bearer_token ─▶ handler
//! ```
//!
//! `negotiate_body` and `extract_bearer_token` never reject a request because
//! of a codec or header parsing failure: they log it and continue with
//! degraded data, leaving the authentication gate to reject the request.

use std::error::Error as StdError;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderName, HeaderValue, StatusCode};
use http_body_util::LengthLimitError;
use serde_json::Value;
use tracing::{error, info_span, warn, Instrument};

use super::auth::bearer_token;
use super::context::{RequestBody, RequestId};
use super::handlers::AppState;
use crate::codec::is_json_media_type;
use crate::logging::Severity;

/// Response header echoing the correlation id.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Body of a 400 response for malformed JSON or an unreadable body.
pub const BAD_REQUEST_BODY: &str = "Bad Request";

/// Body of a 413 response.
pub const PAYLOAD_TOO_LARGE_BODY: &str = "Payload Too Large";

// =============================================================================
// Correlation Identity
// =============================================================================

/// Assign a fresh correlation id and run the rest of the chain in its span.
pub async fn assign_request_id(mut request: Request, next: Next) -> Response {
    let id = RequestId::generate();
    request.extensions_mut().insert(id.clone());

    let span = info_span!("request", request_id = %id);
    let mut response = next.run(request).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    response
}

// =============================================================================
// Body Negotiation
// =============================================================================

/// Decode the raw body into the logical [`RequestBody`].
///
/// - alternate media type: decoded with the configured codec; a decode
///   failure is logged and yields [`RequestBody::Empty`]
/// - JSON media type: parsed as a JSON object; malformed JSON is a 400
/// - anything else: [`RequestBody::Empty`], and the body is left unread
///
/// A buffered body over the limit is a 413; any other read failure is a 400.
/// The raw bytes are put back so later extractors can still read them.
pub async fn negotiate_body(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let gate = state.gate();

    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    let alternate = state.codec().matches(content_type);
    if !alternate && !is_json_media_type(content_type) {
        let mut request = request;
        request.extensions_mut().insert(RequestBody::Empty);
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let request_id = parts.extensions.get::<RequestId>().cloned();
    let path = parts.uri.path().to_string();

    let bytes: Bytes = match axum::body::to_bytes(body, state.body_limit()).await {
        Ok(bytes) => bytes,
        Err(err) if exceeds_limit(&err) => {
            if gate.allows(Severity::Warn) {
                warn!(
                    request_id = request_id.as_ref().map(|id| id.as_str()),
                    path = %path,
                    limit = state.body_limit(),
                    "(413 Payload Too Large) Body of {} exceeds {} bytes",
                    path,
                    state.body_limit()
                );
            }
            return (StatusCode::PAYLOAD_TOO_LARGE, PAYLOAD_TOO_LARGE_BODY).into_response();
        }
        Err(err) => {
            if gate.allows(Severity::Warn) {
                warn!(
                    request_id = request_id.as_ref().map(|id| id.as_str()),
                    path = %path,
                    error = %err,
                    "(400 Bad Request) Could not read body of {}",
                    path
                );
            }
            return (StatusCode::BAD_REQUEST, BAD_REQUEST_BODY).into_response();
        }
    };

    let logical = if alternate {
        match state.codec().decode(&bytes) {
            Ok(Value::Object(fields)) => RequestBody::Alternate(fields),
            Ok(_) => {
                if gate.allows(Severity::Error) {
                    error!(
                        request_id = request_id.as_ref().map(|id| id.as_str()),
                        path = %path,
                        "Could not handle {} middleware {}: body is not a map",
                        state.codec().media_type(),
                        path
                    );
                }
                RequestBody::Empty
            }
            Err(err) => {
                if gate.allows(Severity::Error) {
                    error!(
                        request_id = request_id.as_ref().map(|id| id.as_str()),
                        path = %path,
                        error = %err,
                        "Could not handle {} middleware {}",
                        state.codec().media_type(),
                        path
                    );
                }
                RequestBody::Empty
            }
        }
    } else if bytes.iter().all(u8::is_ascii_whitespace) {
        RequestBody::Empty
    } else {
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(fields)) => RequestBody::Standard(fields),
            Ok(_) => RequestBody::Empty,
            Err(err) => {
                if gate.allows(Severity::Warn) {
                    warn!(
                        request_id = request_id.as_ref().map(|id| id.as_str()),
                        path = %path,
                        error = %err,
                        "(400 Bad Request) Malformed JSON body for {}",
                        path
                    );
                }
                return (StatusCode::BAD_REQUEST, BAD_REQUEST_BODY).into_response();
            }
        }
    };

    parts.extensions.insert(logical);
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Whether a body read failed because it hit the buffering limit.
fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(current) = source {
        if current.is::<LengthLimitError>() {
            return true;
        }
        source = current.source();
    }
    false
}

// =============================================================================
// Bearer Token Extraction
// =============================================================================

/// Copy a bearer token into the logical body unless it already has one.
pub async fn extract_bearer_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if request
        .extensions()
        .get::<RequestBody>()
        .and_then(RequestBody::token)
        .is_some()
    {
        return next.run(request).await;
    }

    match bearer_token(request.headers()) {
        Ok(Some(token)) => match request.extensions_mut().get_mut::<RequestBody>() {
            Some(body) => body.set_token(token),
            None => {
                let mut body = RequestBody::Empty;
                body.set_token(token);
                request.extensions_mut().insert(body);
            }
        },
        Ok(None) => {}
        Err(err) => {
            if state.gate().allows(Severity::Error) {
                error!(
                    request_id = request
                        .extensions()
                        .get::<RequestId>()
                        .map(|id| id.as_str()),
                    path = %request.uri().path(),
                    error = %err,
                    "Could not handle token middleware {}",
                    request.uri().path()
                );
            }
        }
    }

    next.run(request).await
}

// =============================================================================
// Tests
// =============================================================================
