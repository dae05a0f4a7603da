//! # msnative-handle
//!
//! The boundary between the msnative client core and a native SQL Server
//! driver.
//!
//! The native layer owns the actual link to the server. For each SQL batch
//! submitted on a handle it delivers a totally ordered stream of events:
//!
//! ```text
//! Metadata* → (RowStart Column*)* ... Done [Error]
//!                      ↑ Error may arrive at any point after submission
//! ```
//!
//! A `Metadata` event starts each statement's result set, `RowStart` opens a
//! row, and `Column` events carry values by column position. Long values may
//! be split into several `Column` events for the same position. `Done` is the
//! terminal signal for the whole submission; the stream ends after it (or
//! after an `Error`).
//!
//! ## Architecture
//!
//! ```text
//! NativeDriver::open → NativeHandle::submit → EventStream → Request (client)
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod event;
pub mod handle;

pub use error::NativeError;
pub use event::{EventStream, HandleEvent};
pub use handle::{NativeDriver, NativeHandle};
