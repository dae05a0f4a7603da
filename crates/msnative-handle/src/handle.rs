//! Native driver and handle traits.
//!
//! `#[async_trait]` is required for object safety: the client holds both the
//! driver and its handles as trait objects.

use async_trait::async_trait;

use crate::error::NativeError;
use crate::event::EventStream;

/// An open native handle: one established link to the database.
///
/// A handle is owned by exactly one client connection.
#[async_trait]
pub trait NativeHandle: Send + Sync {
    /// Submit a SQL batch and return its event stream.
    ///
    /// Fails synchronously when the handle cannot accept the submission,
    /// for example because it is already closed.
    fn submit(&self, sql: &str) -> Result<EventStream, NativeError>;

    /// Issue a no-op probe against the handle.
    ///
    /// Returns [`NativeError::HandleClosed`] if the handle has become
    /// unusable.
    fn probe(&self) -> Result<(), NativeError>;

    /// Whether the handle reports itself closed.
    fn is_closed(&self) -> bool;

    /// Close the handle.
    async fn close(&self) -> Result<(), NativeError>;
}

/// Opens native handles from ODBC connection strings.
#[async_trait]
pub trait NativeDriver: Send + Sync {
    /// Open a handle for the given connection string.
    async fn open(&self, connection_string: &str) -> Result<Box<dyn NativeHandle>, NativeError>;
}
