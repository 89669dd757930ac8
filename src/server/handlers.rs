//! HTTP request handlers for the DLC server.
//!
//! Every protected endpoint follows the same five steps:
//!
//! 1. confirm the correlation id ([`RequestContext`])
//! 2. run the authentication gate
//! 3. perform its own logic
//! 4. encode the payload in the negotiated format
//! 5. send exactly one response
//!
//! Steps 2, 4 and 5 live in [`AppState::guard`], so an endpoint only supplies
//! step 3.
//!
//! # Endpoints
//!
//! - `GET /status` - Current state snapshot
//! - `POST /change` - Change request (always reports `changed: false`)

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use super::auth::{authenticate, Authorized, TokenVerifier};
use super::context::RequestContext;
use crate::codec::BodyCodec;
use crate::config::ServerOptions;
use crate::error::HandlerError;
use crate::logging::{LogGate, Severity};

/// Body of a 401 response.
pub const UNAUTHORIZED_BODY: &str = "Unauthorized";

/// Body of a 403 response.
pub const FORBIDDEN_BODY: &str = "Forbidden";

/// Body of every 500 response.
pub const SERVER_ERROR_BODY: &str = "Server Error";

// =============================================================================
// Application State
// =============================================================================

struct Shared {
    options: ServerOptions,
    gate: LogGate,
    verifier: Arc<dyn TokenVerifier>,
    codec: Arc<dyn BodyCodec>,
    body_limit: usize,
}

/// Read-only state shared by all requests.
///
/// Built once per server; cloning only bumps a reference count.
#[derive(Clone)]
pub struct AppState {
    shared: Arc<Shared>,
}

impl AppState {
    pub fn new(
        options: ServerOptions,
        verifier: Arc<dyn TokenVerifier>,
        codec: Arc<dyn BodyCodec>,
        body_limit: usize,
    ) -> Self {
        let gate = options.log_gate();
        Self {
            shared: Arc::new(Shared {
                options,
                gate,
                verifier,
                codec,
                body_limit,
            }),
        }
    }

    pub fn options(&self) -> &ServerOptions {
        &self.shared.options
    }

    pub fn gate(&self) -> LogGate {
        self.shared.gate
    }

    pub fn verifier(&self) -> &dyn TokenVerifier {
        self.shared.verifier.as_ref()
    }

    pub fn codec(&self) -> &dyn BodyCodec {
        self.shared.codec.as_ref()
    }

    pub fn body_limit(&self) -> usize {
        self.shared.body_limit
    }

    /// Run `op` behind the authentication gate and respond in the negotiated
    /// format.
    ///
    /// Missing tokens yield 401 and rejected tokens 403 without calling `op`.
    /// Verifier failures and errors returned by `op` yield 500 with a fixed
    /// body.
    pub async fn guard<F, Fut, T>(&self, ctx: RequestContext, op: F) -> Response
    where
        F: FnOnce(Authorized) -> Fut,
        Fut: Future<Output = Result<T, HandlerError>>,
        T: Serialize,
    {
        let gate = self.gate();

        if gate.allows(Severity::Info) {
            info!(
                request_id = %ctx.id,
                method = %ctx.method,
                path = %ctx.path,
                "(000 Start) Handling {} {}",
                ctx.method,
                ctx.path
            );
        }

        let result: Result<Response, HandlerError> = async {
            let authorized = authenticate(self.verifier(), &ctx.body).await?;
            let payload = op(authorized).await?;
            let payload = serde_json::to_value(payload)
                .map_err(|e| HandlerError::Internal(format!("payload serialization: {}", e)))?;
            negotiate_response(self.codec(), ctx.content_type.as_deref(), &payload)
        }
        .await;

        match result {
            Ok(response) => {
                if gate.allows(Severity::Info) {
                    info!(
                        request_id = %ctx.id,
                        method = %ctx.method,
                        path = %ctx.path,
                        "(200 OK) Handled {} {}",
                        ctx.method,
                        ctx.path
                    );
                }
                response
            }
            Err(err) => {
                log_failure(gate, &ctx, &err);
                err.into_response()
            }
        }
    }
}

fn log_failure(gate: LogGate, ctx: &RequestContext, err: &HandlerError) {
    if err.is_auth_failure() {
        if gate.allows(Severity::Warn) {
            let status = err.status();
            warn!(
                request_id = %ctx.id,
                method = %ctx.method,
                path = %ctx.path,
                status = status.as_u16(),
                "({} {}) Could not handle {} {}",
                status.as_u16(),
                err,
                ctx.method,
                ctx.path
            );
        }
    } else if gate.allows(Severity::Error) {
        error!(
            request_id = %ctx.id,
            method = %ctx.method,
            path = %ctx.path,
            status = 500u16,
            error = %err,
            "(500 Server Error) Could not handle {} {}",
            ctx.method,
            ctx.path
        );
    }
}

// =============================================================================
// Error Mapping
// =============================================================================

impl HandlerError {
    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            HandlerError::Unauthorized => StatusCode::UNAUTHORIZED,
            HandlerError::Forbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Plain-text response with a fixed body; error details never reach the
/// caller.
impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let body = match &self {
            HandlerError::Unauthorized => UNAUTHORIZED_BODY,
            HandlerError::Forbidden => FORBIDDEN_BODY,
            _ => SERVER_ERROR_BODY,
        };
        (self.status(), body).into_response()
    }
}

// =============================================================================
// Content Negotiation
// =============================================================================

/// Encode `payload` for the response.
///
/// If the request's `Content-Type` selects the alternate codec, the payload
/// is encoded with it and the response carries that media type; otherwise the
/// payload is sent as JSON.
pub fn negotiate_response(
    codec: &dyn BodyCodec,
    request_content_type: Option<&str>,
    payload: &Value,
) -> Result<Response, HandlerError> {
    if !codec.matches(request_content_type) {
        return Ok(Json(payload).into_response());
    }

    let bytes = codec.encode(payload)?;
    let media_type = HeaderValue::from_str(codec.media_type()).map_err(|e| {
        HandlerError::Internal(format!("invalid codec media type: {}", e))
    })?;

    Ok(([(CONTENT_TYPE, media_type)], bytes).into_response())
}

// =============================================================================
// Response Types
// =============================================================================

/// Snapshot returned by the status endpoint.
///
/// Nothing is persisted yet, so the snapshot has no fields.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {}

/// Response from the change endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeResponse {
    pub changed: bool,
}

/// Current state of the service.
pub async fn read_state() -> StatusSnapshot {
    StatusSnapshot::default()
}

// =============================================================================
// Handlers
// =============================================================================

/// Status endpoint: `GET /status`.
pub async fn status_handler(State(state): State<AppState>, ctx: RequestContext) -> Response {
    state
        .guard(ctx, |_authorized| async { Ok(read_state().await) })
        .await
}

/// Change endpoint: `POST /change`.
///
/// Changes are not applied; the response always reports `changed: false`.
pub async fn change_handler(State(state): State<AppState>, ctx: RequestContext) -> Response {
    state
        .guard(ctx, |_authorized| async {
            Ok(ChangeResponse { changed: false })
        })
        .await
}

// =============================================================================
// Tests
// =============================================================================
