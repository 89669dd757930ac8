//! Token authentication for the DLC server.
//!
//! Authentication is applied per handler, not as a global layer. The token is
//! read from the logical body (filled in from `Authorization: Bearer <token>`
//! by the bearer extraction stage) and handed to an externally supplied
//! [`TokenVerifier`]:
//!
//! ```text
//! UNVERIFIED ──(no token)──────────▶ 401 Unauthorized
//! UNVERIFIED ──(verify = false)────▶ 403 Forbidden
//! UNVERIFIED ──(verify = true)─────▶ AUTHORIZED ──▶ handler
//! any state  ──(verifier error)────▶ 500 Server Error
//! ```
//!
//! The verifier is called at most once per request, with no retry and no
//! caching.
//!
//! # Example
//!
//! ```rust
//! use dlc_server::error::BoxError;
//! use dlc_server::server::auth::verify_fn;
//!
//! let verifier = verify_fn(|token: String| async move { Ok::<_, BoxError>(token == "token") });
//! # let _ = verifier;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, header::ToStrError, HeaderMap};
use subtle::{Choice, ConstantTimeEq};

use super::context::RequestBody;
use crate::error::{BoxError, HandlerError};

/// Prefix of a bearer credential in the `Authorization` header.
pub const BEARER_PREFIX: &str = "Bearer ";

// =============================================================================
// Token Verifier
// =============================================================================

/// Decides whether a presented token is valid.
#[async_trait]
pub trait TokenVerifier: Send + Sync + 'static {
    /// Resolve to `true` for a valid token. An `Err` is treated as a server
    /// fault, not as a rejection.
    async fn verify(&self, token: &str) -> Result<bool, BoxError>;
}

#[async_trait]
impl<T> TokenVerifier for Arc<T>
where
    T: TokenVerifier + ?Sized,
{
    async fn verify(&self, token: &str) -> Result<bool, BoxError> {
        (**self).verify(token).await
    }
}

/// Verifier backed by an async closure. Built with [`verify_fn`].
#[derive(Clone)]
pub struct FnVerifier<F> {
    f: F,
}

/// Wrap an async closure as a [`TokenVerifier`].
pub fn verify_fn<F, Fut>(f: F) -> FnVerifier<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, BoxError>> + Send + 'static,
{
    FnVerifier { f }
}

#[async_trait]
impl<F, Fut> TokenVerifier for FnVerifier<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool, BoxError>> + Send + 'static,
{
    async fn verify(&self, token: &str) -> Result<bool, BoxError> {
        (self.f)(token.to_string()).await
    }
}

/// Verifier accepting a fixed set of tokens.
///
/// Every configured token is compared in constant time, so the time taken
/// does not reveal which (if any) token matched.
#[derive(Clone, Default)]
pub struct StaticTokens {
    tokens: Vec<Vec<u8>>,
}

impl StaticTokens {
    pub fn new<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(|token| token.as_ref().to_vec())
                .filter(|token| !token.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Synchronous check used by the async verifier.
    pub fn contains(&self, token: &str) -> bool {
        let presented = token.as_bytes();
        let matched = self
            .tokens
            .iter()
            .fold(Choice::from(0), |acc, known| acc | known.as_slice().ct_eq(presented));
        matched.into()
    }
}

#[async_trait]
impl TokenVerifier for StaticTokens {
    async fn verify(&self, token: &str) -> Result<bool, BoxError> {
        Ok(self.contains(token))
    }
}

// =============================================================================
// Bearer Extraction
// =============================================================================

/// Read a bearer token from the `Authorization` header.
///
/// Returns `Ok(None)` when the header is absent or the credential is empty
/// after removing the `Bearer ` prefix.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<String>, ToStrError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value.to_str()?;
    let token = value.strip_prefix(BEARER_PREFIX).unwrap_or(value).trim();

    if token.is_empty() {
        Ok(None)
    } else {
        Ok(Some(token.to_string()))
    }
}

// =============================================================================
// Authentication Gate
// =============================================================================

/// Proof that the request passed the authentication gate.
#[derive(Debug, Clone)]
pub struct Authorized {
    /// The verified token
    pub token: String,

    /// The logical body the token came from
    pub body: RequestBody,
}

/// Run the authentication gate over a logical body.
pub async fn authenticate(
    verifier: &dyn TokenVerifier,
    body: &RequestBody,
) -> Result<Authorized, HandlerError> {
    let token = body.token().ok_or(HandlerError::Unauthorized)?;

    match verifier.verify(token).await {
        Ok(true) => Ok(Authorized {
            token: token.to_string(),
            body: body.clone(),
        }),
        Ok(false) => Err(HandlerError::Forbidden),
        Err(err) => Err(HandlerError::Verification(err)),
    }
}

// =============================================================================
// Tests
// =============================================================================
