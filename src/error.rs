use thiserror::Error;

/// Boxed error returned by external collaborators such as token verifiers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the alternate body codec
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// Input is not valid UTF-8
    #[error("Invalid UTF-8 in body at byte {0}")]
    InvalidUtf8(usize),

    /// Input ended while a value was still open
    #[error("Unexpected end of input")]
    UnexpectedEnd,

    /// A token appeared where it is not allowed
    #[error("Unexpected {found} at offset {offset}")]
    UnexpectedToken { found: String, offset: usize },

    /// A quoted string was never closed
    #[error("Unterminated string starting at offset {0}")]
    UnterminatedString(usize),

    /// Unknown escape sequence inside a quoted string
    #[error("Invalid escape sequence '\\{escape}' at offset {offset}")]
    InvalidEscape { escape: char, offset: usize },

    /// Map entry has a key but no value on the same line
    #[error("Missing value for key '{0}'")]
    MissingValue(String),

    /// Content remains after the root value
    #[error("Trailing content at offset {0}")]
    TrailingContent(usize),
}

/// Errors from the server lifecycle (binding and serving)
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listener could not be bound
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Listener was bound but its address could not be read
    #[error("Listener error: {0}")]
    Listener(#[from] std::io::Error),
}

/// Failures inside a guarded handler.
///
/// `Unauthorized` and `Forbidden` are expected client outcomes; every other
/// variant collapses into a `500 Server Error` response.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// No token in the logical body
    #[error("Unauthorized")]
    Unauthorized,

    /// Verifier rejected the token
    #[error("Forbidden")]
    Forbidden,

    /// Verifier itself failed
    #[error("Token verification failed: {0}")]
    Verification(BoxError),

    /// Response could not be encoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Any other failure in handler logic
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Whether this is an authentication outcome rather than a fault.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, HandlerError::Unauthorized | HandlerError::Forbidden)
    }
}
