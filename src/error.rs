//! Error taxonomy for request handling.
//!
//! Every failure a connection can hit ends up as a [`ServerError`]. The
//! dispatcher turns it into a response through [`ServerError::status`]:
//! client errors get a short HTML body, server errors get the `500.html`
//! page. Nothing here is retried.

use std::fmt;
use std::io;

/// Failure while reading, parsing or answering a single request.
#[derive(Debug)]
pub enum ServerError {
    /// The request line is missing or does not have `METHOD TARGET VERSION`.
    MalformedRequest {
        /// What was wrong with it
        reason: String,
    },
    /// No blank line was found within the configured header budget.
    HeadersTooLarge {
        /// Configured `max_header_bytes`
        limit: usize,
    },
    /// `Content-Length` is present but not a non-negative integer.
    InvalidContentLength {
        /// The raw header value
        value: String,
    },
    /// A `POST /contact` arrived without a `Content-Length` header.
    MissingContentLength,
    /// The declared body is larger than `max_body_bytes`.
    PayloadTooLarge {
        /// Declared `Content-Length`
        declared: usize,
        /// Configured `max_body_bytes`
        limit: usize,
    },
    /// The per-connection read deadline expired.
    Timeout,
    /// The peer closed the connection before the declared body arrived.
    IncompleteBody {
        /// Declared `Content-Length`
        expected: usize,
        /// Bytes actually received
        received: usize,
    },
    /// File store or submissions store I/O failure.
    Io(io::Error),
    /// The admin card template failed to render.
    Template(minijinja::Error),
}

impl ServerError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        ServerError::MalformedRequest {
            reason: reason.into(),
        }
    }

    /// HTTP status code this error is answered with.
    pub fn status(&self) -> u16 {
        match self {
            ServerError::MalformedRequest { .. }
            | ServerError::InvalidContentLength { .. }
            | ServerError::MissingContentLength
            | ServerError::IncompleteBody { .. } => 400,
            ServerError::Timeout => 408,
            ServerError::PayloadTooLarge { .. } => 413,
            ServerError::HeadersTooLarge { .. } => 431,
            ServerError::Io(_) | ServerError::Template(_) => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::MalformedRequest { reason } => {
                write!(f, "malformed request: {reason}")
            }
            ServerError::HeadersTooLarge { limit } => {
                write!(f, "request head exceeds {limit} bytes")
            }
            ServerError::InvalidContentLength { value } => {
                write!(f, "invalid Content-Length '{value}'")
            }
            ServerError::MissingContentLength => {
                write!(f, "Content-Length required")
            }
            ServerError::PayloadTooLarge { declared, limit } => {
                write!(f, "declared body of {declared} bytes exceeds limit of {limit}")
            }
            ServerError::Timeout => write!(f, "read deadline expired"),
            ServerError::IncompleteBody { expected, received } => {
                write!(
                    f,
                    "connection closed after {received} of {expected} body bytes"
                )
            }
            ServerError::Io(e) => write!(f, "I/O error: {e}"),
            ServerError::Template(e) => write!(f, "template error: {e}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Io(e) => Some(e),
            ServerError::Template(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ServerError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ServerError::Timeout,
            _ => ServerError::Io(e),
        }
    }
}

impl From<minijinja::Error> for ServerError {
    fn from(e: minijinja::Error) -> Self {
        ServerError::Template(e)
    }
}

/// Invalid configuration, reported before the listener is bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A numeric setting that must be positive was zero
    Zero {
        /// Dotted key of the offending setting
        key: &'static str,
    },
    /// The admin username is empty
    EmptyAdminUser,
    /// The admin username contains a colon, which Basic-Auth cannot carry
    ColonInAdminUser,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Zero { key } => {
                write!(f, "configuration error: '{key}' must be greater than zero")
            }
            ConfigError::EmptyAdminUser => {
                write!(f, "configuration error: 'admin.username' must not be empty")
            }
            ConfigError::ColonInAdminUser => {
                write!(
                    f,
                    "configuration error: 'admin.username' must not contain ':' \
                    (Basic-Auth splits credentials on the first colon)"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}
