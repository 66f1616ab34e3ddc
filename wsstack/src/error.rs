//! Failure taxonomy shared by every middleware in the stack.

use http::StatusCode;
use thiserror::Error;

use crate::connection::ConnectionId;

/// Convenience alias used by all lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure a middleware layer can raise.
///
/// Malformed input is an expected control path here (the peer controls the bytes),
/// so layers return these values instead of panicking.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Malformed WAMP frame, or an outbound frame that could not be encoded.
    #[error("invalid WAMP message: {0}")]
    InvalidMessage(String),

    /// A well-formed WAMP frame carrying a type code the server does not accept.
    #[error("unsupported WAMP message type \"{0}\"")]
    UnsupportedMessageType(i64),

    /// A request header carried a value which could not be parsed.
    #[error("invalid value for the \"{name}\" header: {value}")]
    InvalidRequestHeader {
        /// Header name
        name: String,
        /// Raw header value
        value: String,
    },

    /// A middleware which requires the parsed HTTP request ran before it was available.
    #[error("{0}")]
    MissingRequest(String),

    /// The request header block grew beyond the configured bound.
    #[error("request header exceeds the {limit} byte limit")]
    HeaderTooLarge {
        /// Configured maximum size in bytes
        limit: usize,
    },

    /// Session data could not be decoded.
    #[error("cannot deserialize session data: {reason}")]
    InvalidSession {
        /// The raw bytes which failed to decode
        data: Vec<u8>,
        /// What the decoder tripped over
        reason: String,
    },

    /// The session backend or its options are not usable.
    #[error("session misconfigured: {0}")]
    SessionMisconfigured(String),

    /// A write was attempted through a read-only session.
    #[error("{0}")]
    ReadOnlySession(String),

    /// An event arrived for a connection this layer never opened.
    #[error("connection {0} is not open at this layer")]
    UnknownConnection(ConnectionId),

    /// The connection has already been closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The transport failed to deliver data.
    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    /// Builds an [`Error::InvalidSession`] for the given raw input.
    pub fn invalid_session(data: &[u8], reason: impl Into<String>) -> Self {
        Error::InvalidSession {
            data: data.to_vec(),
            reason: reason.into(),
        }
    }

    /// The HTTP status a peer observes when this failure closes the connection
    /// during the upgrade phase.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Error::HeaderTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::InvalidRequestHeader { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
