//! Router assembly and server lifecycle for the DLC server.
//!
//! # Route Structure
//!
//! ```text
//! GET  /status   - State snapshot (protected)
//! POST /change   - Change request (protected)
//! POST|PATCH|PUT|DELETE <path> - Routes registered by the embedder
//! ```
//!
//! Every route, built-in or registered, passes through the same chain:
//!
//! ```text
//! request ─▶ request id ─▶ trace ─▶ body negotiation ─▶ bearer token ─▶ catch panic ─▶ handler
//! ```
//!
//! # Example
//!
//! ```ignore
//! use dlc_server::{verify_fn, DlcServer, ServerConfig};
//!
//! let verifier = verify_fn(|token: String| async move { Ok(token == "token") });
//! let server = DlcServer::new(verifier, ServerConfig::default());
//!
//! let addr = server.start(8080).await?;
//! // ...
//! server.stop().await;
//! ```

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    handler::Handler,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::auth::TokenVerifier;
use super::handlers::{change_handler, status_handler, AppState, SERVER_ERROR_BODY};
use super::middleware::{assign_request_id, extract_bearer_token, negotiate_body};
use crate::config::{Endpoints, ServerConfig, ServerOptions};
use crate::error::ServerError;
use crate::logging::{LogGate, Severity};

// =============================================================================
// Router Builder
// =============================================================================

/// Routes serving the two built-in endpoints.
pub fn builtin_routes(endpoints: &Endpoints) -> Router<AppState> {
    Router::new()
        .route(&endpoints.status, get(status_handler))
        .route(&endpoints.change, post(change_handler))
}

/// Wrap `routes` in the interceptor chain and attach the state.
///
/// The HTTP trace layer is installed only when `enable_tracing` is set and
/// the gate allows `info`. It runs inside the request span, so its events
/// carry the request id.
pub fn create_router(routes: Router<AppState>, state: AppState, enable_tracing: bool) -> Router {
    let gate = state.gate();

    let mut router = routes
        .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send>| {
            panic_response(gate, panic)
        }))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            extract_bearer_token,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), negotiate_body));

    if enable_tracing && gate.allows(Severity::Info) {
        router = router.layer(TraceLayer::new_for_http());
    }

    router
        .layer(middleware::from_fn(assign_request_id))
        .with_state(state)
}

fn panic_response(gate: LogGate, panic: Box<dyn Any + Send>) -> Response {
    if gate.allows(Severity::Error) {
        let detail = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        error!(status = 500u16, panic = %detail, "(500 Server Error) Handler panicked");
    }
    (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_BODY).into_response()
}

// =============================================================================
// Server
// =============================================================================

struct Listening {
    requested_port: u16,
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

/// The DLC server: pipeline, routes and listener lifecycle.
///
/// Options and the token verifier are fixed at construction. Routes must be
/// registered before [`start`](Self::start); the router is assembled when
/// the listener is bound.
pub struct DlcServer {
    state: AppState,
    config: ServerConfig,
    routes: Router<AppState>,
    listening: Mutex<Option<Listening>>,
}

impl DlcServer {
    /// Create a server with the given verifier and configuration.
    ///
    /// # Panics
    ///
    /// Panics if the configured endpoints are not valid route paths. Check
    /// them first with [`Endpoints::validate`].
    pub fn new<V>(verifier: V, config: ServerConfig) -> Self
    where
        V: TokenVerifier,
    {
        let state = AppState::new(
            config.options.clone(),
            Arc::new(verifier),
            Arc::clone(&config.codec),
            config.body_limit,
        );
        let routes = builtin_routes(&config.endpoints);

        Self {
            state,
            config,
            routes,
            listening: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &ServerOptions {
        self.state.options()
    }

    /// Register a `POST` route.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route path or already has a `POST`
    /// handler, including the built-in endpoints.
    pub fn post<H, T>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        self.add_route(path, post(handler))
    }

    /// Register a `PATCH` route.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route path or already has a `PATCH`
    /// handler, including the built-in endpoints.
    pub fn patch<H, T>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        self.add_route(path, patch(handler))
    }

    /// Register a `PUT` route.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route path or already has a `PUT`
    /// handler, including the built-in endpoints.
    pub fn put<H, T>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        self.add_route(path, put(handler))
    }

    /// Register a `DELETE` route.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route path or already has a `DELETE`
    /// handler, including the built-in endpoints.
    pub fn delete<H, T>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Handler<T, AppState>,
        T: 'static,
    {
        self.add_route(path, delete(handler))
    }

    fn add_route(
        &mut self,
        path: &str,
        method_router: axum::routing::MethodRouter<AppState>,
    ) -> &mut Self {
        self.routes = std::mem::take(&mut self.routes).route(path, method_router);
        self
    }

    /// The fully assembled router, for composition or in-process testing.
    pub fn instance(&self) -> Router {
        create_router(
            self.routes.clone(),
            self.state.clone(),
            self.config.enable_tracing,
        )
    }

    /// Bind `host:port` and start serving.
    ///
    /// Calling again with the same port returns the existing address; a
    /// different port replaces the current listener. Port 0 binds an
    /// ephemeral port.
    pub async fn start(&self, port: u16) -> Result<SocketAddr, ServerError> {
        let mut listening = self.listening.lock().await;

        if let Some(current) = listening.as_ref() {
            if current.requested_port == port {
                return Ok(current.addr);
            }
        }
        if let Some(previous) = listening.take() {
            self.shutdown(previous).await;
        }

        let bind_addr = format!("{}:{}", self.config.host, port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;
        let addr = listener.local_addr()?;

        let (shutdown, signal) = oneshot::channel::<()>();
        let router = self.instance();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = signal.await;
                })
                .await
        });

        if self.state.gate().allows(Severity::Info) {
            info!(
                server = %self.options().server_name,
                port = addr.port(),
                "{} Started on Port {}: http://localhost:{}",
                self.options().server_name,
                addr.port(),
                addr.port()
            );
        }

        *listening = Some(Listening {
            requested_port: port,
            addr,
            shutdown,
            task,
        });
        Ok(addr)
    }

    /// Stop serving and release the listener. No-op when not running.
    pub async fn stop(&self) {
        if let Some(current) = self.listening.lock().await.take() {
            self.shutdown(current).await;
        }
    }

    /// Whether a listener is active.
    pub async fn is_running(&self) -> bool {
        self.listening.lock().await.is_some()
    }

    /// Address of the active listener.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listening.lock().await.as_ref().map(|l| l.addr)
    }

    async fn shutdown(&self, listening: Listening) {
        let gate = self.state.gate();
        let port = listening.addr.port();

        let _ = listening.shutdown.send(());
        match listening.task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                if gate.allows(Severity::Error) {
                    error!(port, error = %err, "Server error while shutting down");
                }
            }
            Err(err) => {
                if gate.allows(Severity::Error) {
                    error!(port, error = %err, "Server task failed");
                }
            }
        }

        if gate.allows(Severity::Info) {
            info!(
                server = %self.options().server_name,
                port,
                "{} Closed on Port {}",
                self.options().server_name,
                port
            );
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
