//! Per-request context shared by the pipeline stages.
//!
//! The first stage stores a [`RequestId`] in the request extensions, the body
//! negotiation stage stores a [`RequestBody`], and handlers read both back
//! through the [`RequestContext`] extractor.

use std::convert::Infallible;
use std::fmt;

use axum::extract::FromRequestParts;
use axum::http::{header::CONTENT_TYPE, request::Parts, Method};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Field of the logical body carrying the caller's token.
pub const TOKEN_FIELD: &str = "token";

// =============================================================================
// Correlation Id
// =============================================================================

/// Correlation id attached to every log line of one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh random (v4) id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Logical Body
// =============================================================================

/// The request body after content negotiation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    /// No usable body (absent, unsupported type, or failed alternate decode)
    #[default]
    Empty,

    /// Body parsed as a JSON object
    Standard(Map<String, Value>),

    /// Body decoded by the alternate codec
    Alternate(Map<String, Value>),
}

impl RequestBody {
    /// Fields of the body, if any.
    pub fn fields(&self) -> Option<&Map<String, Value>> {
        match self {
            RequestBody::Empty => None,
            RequestBody::Standard(fields) | RequestBody::Alternate(fields) => Some(fields),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields().and_then(|fields| fields.get(key))
    }

    /// The caller's token, if the body carries a non-empty string one.
    pub fn token(&self) -> Option<&str> {
        self.get(TOKEN_FIELD)
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
    }

    /// Store `token` in the body, turning an empty body into a standard one.
    pub fn set_token(&mut self, token: impl Into<String>) {
        let value = Value::String(token.into());
        match self {
            RequestBody::Empty => {
                let mut fields = Map::new();
                fields.insert(TOKEN_FIELD.to_string(), value);
                *self = RequestBody::Standard(fields);
            }
            RequestBody::Standard(fields) | RequestBody::Alternate(fields) => {
                fields.insert(TOKEN_FIELD.to_string(), value);
            }
        }
    }

    pub fn is_alternate(&self) -> bool {
        matches!(self, RequestBody::Alternate(_))
    }

    /// The body as a JSON value; an empty body becomes `{}`.
    pub fn into_value(self) -> Value {
        match self {
            RequestBody::Empty => Value::Object(Map::new()),
            RequestBody::Standard(fields) | RequestBody::Alternate(fields) => Value::Object(fields),
        }
    }
}

// =============================================================================
// Request Context
// =============================================================================

/// Everything a handler needs to know about the current request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub id: RequestId,
    pub method: Method,
    pub path: String,
    pub content_type: Option<String>,
    pub body: RequestBody,
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Handlers mounted outside the pipeline still get an id.
        let id = parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(RequestId::generate);

        let body = parts
            .extensions
            .get::<RequestBody>()
            .cloned()
            .unwrap_or_default();

        let content_type = parts
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Ok(RequestContext {
            id,
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            content_type,
            body,
        })
    }
}
