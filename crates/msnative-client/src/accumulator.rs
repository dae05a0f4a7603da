//! Row assembly from column events.
//!
//! The native layer reports values by column position and may split one long
//! value into several column events for the same position. The accumulator
//! keeps one open row buffer and finalizes it on the next row boundary, on a
//! new result set, or on the terminal signal of the submission.

use std::sync::Arc;

use msnative_types::{ColumnCell, ColumnMetadata, SqlValue};

use crate::error::{Error, Result};
use crate::row::{QueryResult, ResultSet, Row};

/// Position of a stored row: (result set, row).
type RowPosition = (usize, usize);

/// Assembles the column events of one submission into rows.
#[derive(Debug, Default)]
pub(crate) struct RowAccumulator {
    columns: Vec<Arc<ColumnMetadata>>,
    buffer: Option<Vec<Option<ColumnCell>>>,
    result_sets: Vec<ResultSet>,
}

impl RowAccumulator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Start a new result set.
    ///
    /// A row still open from the previous statement is finalized into that
    /// statement's result set and returned.
    pub(crate) fn metadata(&mut self, columns: Vec<ColumnMetadata>) -> Option<&Row> {
        let flushed = self.flush();
        self.columns = columns.into_iter().map(Arc::new).collect();
        self.result_sets.push(ResultSet::new(self.columns.clone()));
        self.row_at(flushed?)
    }

    /// Open a new row buffer, finalizing and returning the previous one.
    pub(crate) fn row_start(&mut self) -> Result<Option<&Row>> {
        if self.result_sets.is_empty() {
            return Err(Error::ProtocolViolation(
                "row started before column metadata".into(),
            ));
        }
        let flushed = self.flush();
        self.buffer = Some(vec![None; self.columns.len()]);
        Ok(flushed.and_then(|position| self.row_at(position)))
    }

    /// Apply a column value or continuation chunk at `index`.
    ///
    /// A chunk for a position whose cell already belongs to the same column is
    /// appended. Otherwise a new cell replaces whatever the position held.
    pub(crate) fn column(&mut self, index: usize, value: SqlValue) -> Result<()> {
        let Some(metadata) = self.columns.get(index) else {
            return Err(Error::ProtocolViolation(format!(
                "column {index} is outside the {} reported columns",
                self.columns.len()
            )));
        };
        let Some(slot) = self
            .buffer
            .as_mut()
            .and_then(|buffer| buffer.get_mut(index))
        else {
            return Err(Error::ProtocolViolation(format!(
                "column {index} arrived outside a row"
            )));
        };

        // Only text and binary values continue across events; a repeated
        // scalar overwrites the cell.
        match slot {
            Some(cell) if cell.is_same_column(metadata) && is_chunked(cell.value()) => {
                cell.append_chunk(value)?;
            }
            _ => *slot = Some(ColumnCell::new(Arc::clone(metadata), value)),
        }
        Ok(())
    }

    /// Finalize the open row on the terminal signal.
    pub(crate) fn finish(&mut self) -> Option<&Row> {
        let position = self.flush()?;
        self.row_at(position)
    }

    /// Consume the accumulator, returning every finalized row.
    ///
    /// A row that is still open is discarded: only a row boundary or the
    /// terminal signal completes a row.
    pub(crate) fn into_result(self) -> QueryResult {
        QueryResult::new(self.result_sets)
    }

    fn flush(&mut self) -> Option<RowPosition> {
        let buffer = self.buffer.take()?;
        let cells = buffer
            .into_iter()
            .zip(&self.columns)
            .map(|(cell, metadata)| {
                cell.unwrap_or_else(|| ColumnCell::new(Arc::clone(metadata), SqlValue::Null))
            })
            .collect();

        let set_index = self.result_sets.len().checked_sub(1)?;
        let set = self.result_sets.get_mut(set_index)?;
        set.push(Row::new(cells));
        Some((set_index, set.rows().len() - 1))
    }

    fn row_at(&self, (set, row): RowPosition) -> Option<&Row> {
        self.result_sets.get(set)?.rows().get(row)
    }
}

fn is_chunked(value: &SqlValue) -> bool {
    matches!(value, SqlValue::String(_) | SqlValue::Binary(_))
}
