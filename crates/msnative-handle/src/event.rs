//! Events delivered for one submission.

use std::pin::Pin;

use futures_core::Stream;
use msnative_types::{ColumnMetadata, SqlValue};

use crate::error::NativeError;

/// One event of a submission's event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleEvent {
    /// Column metadata for the next statement's result set.
    Metadata(Vec<ColumnMetadata>),
    /// A new row begins.
    RowStart,
    /// A value, or a continuation chunk of a value, for the column at `index`.
    Column {
        /// Column position within the current metadata.
        index: usize,
        /// Value or value chunk.
        value: SqlValue,
    },
    /// Terminal signal: no further rows for this submission.
    Done,
    /// The native layer reported an error.
    Error(NativeError),
}

impl HandleEvent {
    /// Shorthand for a column event.
    pub fn column(index: usize, value: impl Into<SqlValue>) -> Self {
        Self::Column {
            index,
            value: value.into(),
        }
    }

    /// Event name used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Metadata(_) => "metadata",
            Self::RowStart => "row",
            Self::Column { .. } => "column",
            Self::Done => "done",
            Self::Error(_) => "error",
        }
    }
}

/// The ordered event stream of one submission.
///
/// The stream ends after the transport has delivered everything it will
/// deliver for the submission.
pub type EventStream = Pin<Box<dyn Stream<Item = HandleEvent> + Send>>;
