//! Rows and aggregated query results.

use std::sync::Arc;

use msnative_types::{ColumnCell, ColumnMetadata, FromSql, SqlValue, TypeError};

/// A completed row: one cell per column position, in column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    cells: Vec<ColumnCell>,
}

impl Row {
    /// Create a row from its cells.
    pub fn new(cells: Vec<ColumnCell>) -> Self {
        Self { cells }
    }

    /// Number of cells in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if the row has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The cell at `index`.
    #[must_use]
    pub fn cell(&self, index: usize) -> Option<&ColumnCell> {
        self.cells.get(index)
    }

    /// The raw value at `index`.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<&SqlValue> {
        self.cells.get(index).map(ColumnCell::value)
    }

    /// Get a typed value by column index.
    pub fn get<T: FromSql>(&self, index: usize) -> Result<T, TypeError> {
        match self.cells.get(index) {
            Some(cell) => cell.get(),
            None => Err(TypeError::OutOfRange {
                target_type: "column index",
            }),
        }
    }

    /// Get a typed value by column name (case-insensitive, first match).
    pub fn get_by_name<T: FromSql>(&self, name: &str) -> Result<T, TypeError> {
        match self
            .cells
            .iter()
            .find(|cell| cell.name().eq_ignore_ascii_case(name))
        {
            Some(cell) => cell.get(),
            None => Err(TypeError::OutOfRange {
                target_type: "column name",
            }),
        }
    }

    /// Get a typed value, returning `None` on NULL, a missing column, or a
    /// failed conversion.
    #[must_use]
    pub fn try_get<T: FromSql>(&self, index: usize) -> Option<T> {
        self.cells.get(index).and_then(|cell| cell.get().ok())
    }

    /// Iterate over the cells.
    pub fn iter(&self) -> std::slice::Iter<'_, ColumnCell> {
        self.cells.iter()
    }

    /// Consume the row, returning its cells.
    #[must_use]
    pub fn into_cells(self) -> Vec<ColumnCell> {
        self.cells
    }
}

impl<'a> IntoIterator for &'a Row {
    type Item = &'a ColumnCell;
    type IntoIter = std::slice::Iter<'a, ColumnCell>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter()
    }
}

/// The rows produced by one statement of a submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    columns: Vec<Arc<ColumnMetadata>>,
    rows: Vec<Row>,
}

impl ResultSet {
    pub(crate) fn new(columns: Vec<Arc<ColumnMetadata>>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Column metadata for this result set.
    #[must_use]
    pub fn columns(&self) -> &[Arc<ColumnMetadata>] {
        &self.columns
    }

    /// The rows, in the order the server produced them.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
}

/// Aggregated result handed to a request's terminal callback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    result_sets: Vec<ResultSet>,
}

impl QueryResult {
    pub(crate) fn new(result_sets: Vec<ResultSet>) -> Self {
        Self { result_sets }
    }

    /// One result set per statement that returned metadata.
    #[must_use]
    pub fn result_sets(&self) -> &[ResultSet] {
        &self.result_sets
    }

    /// All rows of all statements, in delivery order.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.result_sets.iter().flat_map(|set| set.rows.iter())
    }

    /// The first row of the first statement that produced one.
    #[must_use]
    pub fn first_row(&self) -> Option<&Row> {
        self.rows().next()
    }

    /// Total number of rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.result_sets.iter().map(|set| set.rows.len()).sum()
    }

    /// Consume the result, returning all rows in delivery order.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.result_sets
            .into_iter()
            .flat_map(|set| set.rows)
            .collect()
    }
}
