//! Type conversion error types.

use thiserror::Error;

/// Errors that can occur during value conversion or assembly.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TypeError {
    /// Value is null when non-null was expected.
    #[error("unexpected null value")]
    UnexpectedNull,

    /// Type mismatch during conversion.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type name.
        expected: &'static str,
        /// Actual type name.
        actual: String,
    },

    /// A continuation chunk does not match the value it extends.
    #[error("cannot append {chunk} chunk to {value} value")]
    ChunkMismatch {
        /// Type name of the value being extended.
        value: &'static str,
        /// Type name of the incoming chunk.
        chunk: &'static str,
    },

    /// Value is out of range for target type.
    #[error("value out of range for {target_type}")]
    OutOfRange {
        /// Target type name.
        target_type: &'static str,
    },

    /// Invalid UUID value.
    #[error("invalid UUID: {0}")]
    InvalidUuid(String),

    /// Invalid decimal value.
    #[error("invalid decimal: {0}")]
    InvalidDecimal(String),
}
