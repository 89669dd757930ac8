//! Body codecs for content negotiation.
//!
//! The server speaks JSON by default. A single alternate codec, selected
//! purely by the request's `Content-Type`, may be plugged in through
//! [`ServerConfig::with_codec`](crate::config::ServerConfig::with_codec).
//! The built-in alternate codec is [`DeonCodec`].

mod deon;

pub use deon::{DeonCodec, DEON_MEDIA_TYPE};

use serde_json::Value;

use crate::error::CodecError;

/// An alternate wire encoding for request and response bodies.
pub trait BodyCodec: Send + Sync + 'static {
    /// Media type this codec is negotiated under.
    fn media_type(&self) -> &str;

    /// Decode a raw body into a structured value.
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;

    /// Encode a structured value into a raw body.
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    /// Whether a `Content-Type` header value selects this codec.
    ///
    /// Parameters after `;` are ignored and the comparison is
    /// case-insensitive.
    fn matches(&self, content_type: Option<&str>) -> bool {
        content_type
            .map(media_type_essence)
            .is_some_and(|essence| essence.eq_ignore_ascii_case(self.media_type()))
    }
}

/// The `type/subtype` part of a media type, without parameters.
pub fn media_type_essence(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
}

/// Whether a `Content-Type` denotes JSON (`application/json` or `+json`).
pub fn is_json_media_type(content_type: Option<&str>) -> bool {
    let Some(essence) = content_type.map(media_type_essence) else {
        return false;
    };
    let essence = essence.to_ascii_lowercase();
    essence == "application/json" || (essence.starts_with("application/") && essence.ends_with("+json"))
}
