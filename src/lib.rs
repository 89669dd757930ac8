//! # DLC Server
//!
//! A minimal authenticated HTTP service skeleton.
//!
//! Every request passes through a fixed pipeline:
//!
//! ```text
//! request ─▶ correlation id ─▶ body negotiation ─▶ bearer token ─▶ route
//!         ─▶ authentication gate ─▶ handler ─▶ response negotiation ─▶ response
//! ```
//!
//! ## Features
//!
//! - **Correlation ids**: each request gets a UUID attached to its log lines
//!   and echoed in `x-request-id`
//! - **Content negotiation**: JSON by default, an alternate codec (deon) when
//!   the request's `Content-Type` asks for it
//! - **Token authentication**: bearer or body tokens checked by a caller
//!   supplied async verifier
//! - **Debug-level gating**: `none | error | warn | info` plus a quiet flag
//!
//! ## Architecture
//!
//! - [`server`] - Axum router, interceptors, handlers and lifecycle
//! - [`codec`] - Alternate body codec
//! - [`logging`] - Debug-level gate
//! - [`config`] - Options, defaults and CLI configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use dlc_server::{error::BoxError, verify_fn, DlcServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let verifier = verify_fn(|token: String| async move { Ok::<_, BoxError>(token == "token") });
//!     let server = DlcServer::new(verifier, ServerConfig::default());
//!
//!     server.start(3399).await.unwrap();
//!     tokio::signal::ctrl_c().await.unwrap();
//!     server.stop().await;
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;

// Re-export commonly used types
pub use codec::{BodyCodec, DeonCodec, DEON_MEDIA_TYPE};
pub use config::{
    Config, Endpoints, Environment, PartialOptions, ServerConfig, ServerOptions, DEFAULT_PORT,
};
pub use error::{BoxError, CodecError, HandlerError, ServerError};
pub use logging::{DebugLevel, LogGate, Severity};
pub use server::{
    verify_fn, AppState, Authorized, DlcServer, RequestBody, RequestContext, RequestId,
    StaticTokens, TokenVerifier, FORBIDDEN_BODY, SERVER_ERROR_BODY, UNAUTHORIZED_BODY,
    X_REQUEST_ID,
};
