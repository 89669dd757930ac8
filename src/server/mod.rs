//! HTTP server layer for the DLC server.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           HTTP Layer                             │
//! │                GET /status          POST /change                 │
//! │                                                                  │
//! │  ┌────────────┐ ┌─────────────┐ ┌──────────┐ ┌────────────────┐  │
//! │  │ middleware │ │   context   │ │   auth   │ │    handlers    │  │
//! │  │ (chain)    │ │ (id, body)  │ │ (verify) │ │ (guard, codec) │  │
//! │  └────────────┘ └─────────────┘ └──────────┘ └────────────────┘  │
//! │                     routes (assembly, lifecycle)                 │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod context;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use auth::{
    authenticate, bearer_token, verify_fn, Authorized, FnVerifier, StaticTokens, TokenVerifier,
};
pub use context::{RequestBody, RequestContext, RequestId};
pub use handlers::{
    change_handler, negotiate_response, read_state, status_handler, AppState, ChangeResponse,
    StatusSnapshot, FORBIDDEN_BODY, SERVER_ERROR_BODY, UNAUTHORIZED_BODY,
};
pub use middleware::{
    assign_request_id, extract_bearer_token, negotiate_body, BAD_REQUEST_BODY,
    PAYLOAD_TOO_LARGE_BODY, X_REQUEST_ID,
};
pub use routes::{builtin_routes, create_router, DlcServer};
