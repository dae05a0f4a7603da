//! Column metadata and assembled column cells.

use std::sync::Arc;

use crate::error::TypeError;
use crate::from_sql::FromSql;
use crate::sql_type::SqlType;
use crate::value::SqlValue;

/// Metadata describing one result set column.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future versions without breaking semver compatibility. Use
/// [`ColumnMetadata::new()`] and the builder methods to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ColumnMetadata {
    /// Column name. Empty for unnamed expressions such as `SELECT 1+1`.
    pub name: String,
    /// Declared SQL type.
    pub sql_type: SqlType,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Declared size (characters or bytes; 0 for `MAX` types).
    pub size: u32,
}

impl ColumnMetadata {
    /// Create column metadata with a name and type.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            size: 0,
        }
    }

    /// Set whether the column is nullable.
    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set the declared size.
    #[must_use]
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }
}

/// One assembled (row, column) position: the column's metadata and its value.
///
/// Cells are built up while the column's chunks arrive and are read-only once
/// the row that holds them has been delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnCell {
    metadata: Arc<ColumnMetadata>,
    value: SqlValue,
}

impl ColumnCell {
    /// Create a cell from shared column metadata and the first value chunk.
    pub fn new(metadata: Arc<ColumnMetadata>, value: SqlValue) -> Self {
        Self { metadata, value }
    }

    /// Column metadata for this cell.
    #[must_use]
    pub fn metadata(&self) -> &ColumnMetadata {
        &self.metadata
    }

    /// Column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// The assembled value.
    #[must_use]
    pub fn value(&self) -> &SqlValue {
        &self.value
    }

    /// Consume the cell, returning its value.
    #[must_use]
    pub fn into_value(self) -> SqlValue {
        self.value
    }

    /// Convert the value to a Rust type.
    pub fn get<T: FromSql>(&self) -> Result<T, TypeError> {
        T::from_sql(&self.value)
    }

    /// Whether `other` describes the same column as this cell.
    ///
    /// Continuation chunks are recognized by column identity, which the
    /// native driver conveys through the column name.
    #[must_use]
    pub fn is_same_column(&self, other: &ColumnMetadata) -> bool {
        self.metadata.name == other.name
    }

    /// Append a continuation chunk to the value.
    pub fn append_chunk(&mut self, chunk: SqlValue) -> Result<(), TypeError> {
        self.value.append_chunk(chunk)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_builder() {
        let meta = ColumnMetadata::new("note", SqlType::VarChar)
            .with_nullable(false)
            .with_size(255);
        assert_eq!(meta.name, "note");
        assert_eq!(meta.sql_type, SqlType::VarChar);
        assert!(!meta.nullable);
        assert_eq!(meta.size, 255);
    }

    #[test]
    fn test_cell_chunk_continuation() {
        let meta = Arc::new(ColumnMetadata::new("body", SqlType::WLongVarChar));
        let mut cell = ColumnCell::new(Arc::clone(&meta), SqlValue::from("first "));
        assert!(cell.is_same_column(&meta));
        cell.append_chunk(SqlValue::from("second")).unwrap();
        assert_eq!(cell.get::<String>().unwrap(), "first second");
        assert_eq!(cell.name(), "body");
    }

    #[test]
    fn test_cell_distinct_column() {
        let cell = ColumnCell::new(
            Arc::new(ColumnMetadata::new("a", SqlType::Integer)),
            SqlValue::Int(1),
        );
        assert!(!cell.is_same_column(&ColumnMetadata::new("b", SqlType::Integer)));
        assert_eq!(cell.into_value(), SqlValue::Int(1));
    }
}
