//! Client error types.

use msnative_handle::NativeError;
use msnative_types::TypeError;
use thiserror::Error;

/// Errors that can occur during client operations.
///
/// Errors are `Clone` because one failure can be reported both to a request's
/// terminal callback and to every connection event subscriber.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Configuration is incomplete or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// No driver name was configured and none could be detected.
    #[error("driver was not specified and no driver was detected")]
    NoDriverDetected,

    /// Opening the native handle failed.
    #[error("connection failed: {0}")]
    Connection(NativeError),

    /// The native layer reported an error while a request was executing.
    #[error("{0}")]
    Protocol(NativeError),

    /// The event stream of a submission violated the event ordering.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A row value could not be assembled or converted.
    #[error("type error: {0}")]
    Type(#[from] TypeError),

    /// The heartbeat found the native handle unusable.
    #[error("connection was closed unexpectedly")]
    ConnectionReset,

    /// The connection closed before the request could complete.
    #[error("connection closed")]
    ConnectionClosed,

    /// `close()` was called on a connection without an open handle.
    #[error("connection already closed")]
    AlreadyClosed,

    /// The native handle failed to close cleanly.
    #[error("close failed: {0}")]
    Close(NativeError),

    /// The operation is not valid in the connection's current state.
    #[error("invalid connection state: {0}")]
    InvalidState(String),

    /// Invalid identifier (potential SQL injection attempt).
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl Error {
    /// A short machine-readable code for connection-level conditions.
    ///
    /// `ECONNRESET` marks a handle that the heartbeat found unusable.
    #[must_use]
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::ConnectionReset => Some("ECONNRESET"),
            Self::ConnectionClosed | Self::AlreadyClosed => Some("ECLOSE"),
            Self::Config(_) | Self::NoDriverDetected => Some("EINVAL"),
            _ => None,
        }
    }

    /// The native error behind this error, if any.
    #[must_use]
    pub fn native(&self) -> Option<&NativeError> {
        match self {
            Self::Connection(e) | Self::Protocol(e) | Self::Close(e) => Some(e),
            _ => None,
        }
    }

    /// Get the error class/severity if the native layer reported one.
    ///
    /// SQL Server error classes range from 0-25:
    /// - 0-10: Informational
    /// - 11-16: User errors
    /// - 17-19: Resource/hardware errors
    /// - 20-25: System errors (connection terminating)
    #[must_use]
    pub fn severity(&self) -> Option<u8> {
        self.native().and_then(NativeError::severity)
    }

    /// Whether this error was raised while a request was executing.
    #[must_use]
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::Protocol(_) | Self::ProtocolViolation(_) | Self::Type(_)
        )
    }

    /// Whether this error can only be raised while configuring or opening.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::NoDriverDetected)
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
