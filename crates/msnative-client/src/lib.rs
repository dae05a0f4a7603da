//! # msnative-client
//!
//! Async SQL Server client core built on a native ODBC driver.
//!
//! The native driver owns the link to the server and reports each submitted
//! SQL batch as a stream of metadata, row, column, and completion events.
//! This crate turns that stream into a request/response API:
//!
//! - **Connection**: owns one native handle, queues requests, probes the
//!   handle on a heartbeat, and broadcasts connect/error/end notifications
//! - **Request**: drives one submission to completion, delivering each row
//!   as it finishes and firing a single terminal callback
//! - **Row assembly**: long text and binary values split across several
//!   column events are concatenated into one cell
//! - **Transactions**: `BEGIN`/`COMMIT`/`ROLLBACK`/`SAVE TRANSACTION` with
//!   validated names
//!
//! ## Connection Lifecycle
//!
//! ```text
//! Connecting -> Open (via open())
//! Connecting -> Failed
//! Open -> Closed (via close(), heartbeat reset, or a failed request)
//! ```
//!
//! A failed request closes its connection: the native session state is
//! undefined after a mid-stream error. Create a new connection to recover.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use futures_util::StreamExt;
//! use msnative_client::{Config, Connection, ConnectionEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new()
//!         .instance_name("SQLEXPRESS")
//!         .database("test")
//!         .credentials("sa", "Password123");
//!
//!     let connection = Connection::new(config, Arc::new(odbc_driver()));
//!     let mut events = connection.subscribe();
//!     connection.open().await?;
//!
//!     let result = connection.execute_batch("SELECT 1+1; SELECT 2+2").await?;
//!     for row in result.rows() {
//!         println!("{}", row.get::<i32>(0)?);
//!     }
//!
//!     connection.begin_transaction("").await?;
//!     connection.execute_batch("INSERT INTO t VALUES (1)").await?;
//!     connection.commit_transaction("").await?;
//!
//!     let mut rows = connection.query("SELECT name FROM users");
//!     while let Some(row) = rows.next().await {
//!         println!("{}", row.get::<String>(0)?);
//!     }
//!     rows.finish().await?;
//!
//!     connection.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod accumulator;
pub mod config;
pub mod connection;
pub mod detect;
pub mod error;
pub mod request;
pub mod row;
pub mod state;
pub mod stream;
pub mod transaction;

pub use config::{Config, DEFAULT_HEARTBEAT_INTERVAL, ErrorPolicy};
pub use connection::{Connection, ConnectionEvent, ConnectionId};
pub use error::{Error, Result};
pub use request::{CompletionCallback, Request, RequestId, RowListener};
pub use row::{QueryResult, ResultSet, Row};
pub use state::{ConnectionState, RequestState};
pub use stream::QueryStream;
pub use transaction::{TransactionKind, TransactionStatement};

// Re-export the handle contract and value model
pub use msnative_handle::{EventStream, HandleEvent, NativeDriver, NativeError, NativeHandle};
pub use msnative_types::{ColumnCell, ColumnMetadata, FromSql, SqlType, SqlValue, TypeError};
