//! SQL value representation.

use bytes::{Bytes, BytesMut};

use crate::error::TypeError;

/// A column value as delivered by the native driver.
///
/// Long character and binary columns may arrive split into several chunks
/// for the same column; [`SqlValue::append_chunk`] folds those chunks into a
/// single value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SqlValue {
    /// NULL value.
    #[default]
    Null,
    /// Boolean value (BIT).
    Bool(bool),
    /// 8-bit unsigned integer (TINYINT).
    TinyInt(u8),
    /// 16-bit signed integer (SMALLINT).
    SmallInt(i16),
    /// 32-bit signed integer (INT).
    Int(i32),
    /// 64-bit signed integer (BIGINT).
    BigInt(i64),
    /// 32-bit floating point (REAL).
    Float(f32),
    /// 64-bit floating point (FLOAT).
    Double(f64),
    /// String value (CHAR, VARCHAR, NCHAR, NVARCHAR, TEXT, NTEXT, XML).
    String(String),
    /// Binary value (BINARY, VARBINARY, IMAGE).
    Binary(Bytes),
    /// Decimal value (DECIMAL, NUMERIC, MONEY, SMALLMONEY).
    #[cfg(feature = "decimal")]
    Decimal(rust_decimal::Decimal),
    /// UUID value (UNIQUEIDENTIFIER).
    #[cfg(feature = "uuid")]
    Uuid(uuid::Uuid),
    /// Date value (DATE).
    #[cfg(feature = "chrono")]
    Date(chrono::NaiveDate),
    /// Time value (TIME).
    #[cfg(feature = "chrono")]
    Time(chrono::NaiveTime),
    /// DateTime value (DATETIME, DATETIME2, SMALLDATETIME).
    #[cfg(feature = "chrono")]
    DateTime(chrono::NaiveDateTime),
    /// DateTimeOffset value (DATETIMEOFFSET).
    #[cfg(feature = "chrono")]
    DateTimeOffset(chrono::DateTime<chrono::FixedOffset>),
}

impl SqlValue {
    /// Check if the value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the value as a bool, if it is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Get the value as an i32, if it is one.
    #[must_use]
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            Self::SmallInt(v) => Some(i32::from(*v)),
            Self::TinyInt(v) => Some(i32::from(*v)),
            _ => None,
        }
    }

    /// Get the value as an i64, if it is one.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::BigInt(v) => Some(*v),
            Self::Int(v) => Some(i64::from(*v)),
            Self::SmallInt(v) => Some(i64::from(*v)),
            Self::TinyInt(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Get the value as an f64, if it is one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(*v),
            Self::Float(v) => Some(f64::from(*v)),
            _ => None,
        }
    }

    /// Get the value as a string slice, if it is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Get the value as bytes, if it is binary.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(v) => Some(v),
            _ => None,
        }
    }

    /// Append a continuation chunk of the same column to this value.
    ///
    /// Text chunks concatenate onto text and binary chunks onto binary, in
    /// arrival order. A NULL chunk leaves the value unchanged, and a NULL
    /// value adopts the first non-NULL chunk. Every other combination is a
    /// [`TypeError::ChunkMismatch`].
    pub fn append_chunk(&mut self, chunk: SqlValue) -> Result<(), TypeError> {
        if chunk.is_null() {
            return Ok(());
        }
        if self.is_null() {
            *self = chunk;
            return Ok(());
        }

        match (self, chunk) {
            (Self::String(text), Self::String(more)) => {
                text.push_str(&more);
                Ok(())
            }
            (Self::Binary(bytes), Self::Binary(more)) => {
                let mut joined = BytesMut::with_capacity(bytes.len() + more.len());
                joined.extend_from_slice(bytes);
                joined.extend_from_slice(&more);
                *bytes = joined.freeze();
                Ok(())
            }
            (value, chunk) => Err(TypeError::ChunkMismatch {
                value: value.type_name(),
                chunk: chunk.type_name(),
            }),
        }
    }

    /// Get the type name as a string.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) => "BIT",
            Self::TinyInt(_) => "TINYINT",
            Self::SmallInt(_) => "SMALLINT",
            Self::Int(_) => "INT",
            Self::BigInt(_) => "BIGINT",
            Self::Float(_) => "REAL",
            Self::Double(_) => "FLOAT",
            Self::String(_) => "NVARCHAR",
            Self::Binary(_) => "VARBINARY",
            #[cfg(feature = "decimal")]
            Self::Decimal(_) => "DECIMAL",
            #[cfg(feature = "uuid")]
            Self::Uuid(_) => "UNIQUEIDENTIFIER",
            #[cfg(feature = "chrono")]
            Self::Date(_) => "DATE",
            #[cfg(feature = "chrono")]
            Self::Time(_) => "TIME",
            #[cfg(feature = "chrono")]
            Self::DateTime(_) => "DATETIME2",
            #[cfg(feature = "chrono")]
            Self::DateTimeOffset(_) => "DATETIMEOFFSET",
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u8> for SqlValue {
    fn from(v: u8) -> Self {
        Self::TinyInt(v)
    }
}

impl From<i16> for SqlValue {
    fn from(v: i16) -> Self {
        Self::SmallInt(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::BigInt(v)
    }
}

impl From<f32> for SqlValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<Bytes> for SqlValue {
    fn from(v: Bytes) -> Self {
        Self::Binary(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Binary(Bytes::from(v))
    }
}

impl From<&[u8]> for SqlValue {
    fn from(v: &[u8]) -> Self {
        Self::Binary(Bytes::copy_from_slice(v))
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

#[cfg(feature = "uuid")]
impl From<uuid::Uuid> for SqlValue {
    fn from(v: uuid::Uuid) -> Self {
        Self::Uuid(v)
    }
}

#[cfg(feature = "decimal")]
impl From<rust_decimal::Decimal> for SqlValue {
    fn from(v: rust_decimal::Decimal) -> Self {
        Self::Decimal(v)
    }
}

#[cfg(feature = "chrono")]
impl From<chrono::NaiveDate> for SqlValue {
    fn from(v: chrono::NaiveDate) -> Self {
        Self::Date(v)
    }
}

#[cfg(feature = "chrono")]
impl From<chrono::NaiveDateTime> for SqlValue {
    fn from(v: chrono::NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_append_text_chunks() {
        let mut value = SqlValue::from("Lorem ");
        value.append_chunk(SqlValue::from("ipsum ")).unwrap();
        value.append_chunk(SqlValue::from("dolor")).unwrap();
        assert_eq!(value.as_str(), Some("Lorem ipsum dolor"));
    }

    #[test]
    fn test_append_binary_chunks() {
        let mut value = SqlValue::from(vec![0xDE, 0xAD]);
        value.append_chunk(SqlValue::from(vec![0xBE, 0xEF])).unwrap();
        assert_eq!(value.as_bytes(), Some(&[0xDE, 0xAD, 0xBE, 0xEF][..]));
    }

    #[test]
    fn test_append_to_null_adopts_chunk() {
        let mut value = SqlValue::Null;
        value.append_chunk(SqlValue::from("abc")).unwrap();
        assert_eq!(value, SqlValue::String("abc".into()));

        value.append_chunk(SqlValue::Null).unwrap();
        assert_eq!(value, SqlValue::String("abc".into()));
    }

    #[test]
    fn test_append_mismatched_chunk() {
        let mut value = SqlValue::from("abc");
        let err = value.append_chunk(SqlValue::from(vec![1u8])).unwrap_err();
        assert_eq!(
            err,
            TypeError::ChunkMismatch {
                value: "NVARCHAR",
                chunk: "VARBINARY",
            }
        );
        assert_eq!(value.as_str(), Some("abc"));

        let mut scalar = SqlValue::Int(1);
        assert!(scalar.append_chunk(SqlValue::Int(2)).is_err());
    }

    #[test]
    fn test_integer_widening() {
        assert_eq!(SqlValue::TinyInt(7).as_i64(), Some(7));
        assert_eq!(SqlValue::SmallInt(-3).as_i32(), Some(-3));
        assert_eq!(SqlValue::String("1".into()).as_i32(), None);
    }

    proptest! {
        #[test]
        fn text_chunks_concatenate_in_order(parts in proptest::collection::vec(".{0,16}", 1..8)) {
            let mut value = SqlValue::Null;
            for part in &parts {
                value.append_chunk(SqlValue::String(part.clone())).unwrap();
            }
            prop_assert_eq!(value.as_str().unwrap_or(""), parts.concat());
        }

        #[test]
        fn binary_chunks_concatenate_in_order(parts in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..32), 1..8)) {
            let mut value = SqlValue::Null;
            for part in &parts {
                value.append_chunk(SqlValue::from(part.clone())).unwrap();
            }
            let expected: Vec<u8> = parts.concat();
            prop_assert_eq!(value.as_bytes().unwrap_or(&[]), &expected[..]);
        }
    }
}
