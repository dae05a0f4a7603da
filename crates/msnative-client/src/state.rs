//! Connection and request lifecycle states.
//!
//! ## Connection
//!
//! ```text
//! Connecting -> Open    (native open succeeded)
//! Connecting -> Failed  (configuration, detection, or open error)
//! Open -> Closed        (close(), heartbeat reset, or request error)
//! ```
//!
//! `Failed` and `Closed` are terminal: a new connection must be created to
//! recover.
//!
//! ## Request
//!
//! ```text
//! Queued -> Executing -> Resolved
//! Queued -> Resolved    (failed out by connection teardown)
//! ```

/// Runtime state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Created; the native handle has not been opened yet.
    #[default]
    Connecting,
    /// The native handle is open.
    Open,
    /// Opening failed.
    Failed,
    /// The connection was closed.
    Closed,
}

impl ConnectionState {
    /// Check if requests may be submitted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Check if the state can never change again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }

    /// State name used in logs and errors.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Failed => "failed",
            Self::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime state of a request bound to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestState {
    /// Registered with the connection, waiting for the handle.
    #[default]
    Queued,
    /// Submitted; events are being processed.
    Executing,
    /// The terminal callback has been invoked.
    Resolved,
}

impl RequestState {
    /// Check if the request still awaits its terminal callback.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !matches!(self, Self::Resolved)
    }
}
