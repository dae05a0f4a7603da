//! Typed extraction of assembled column values.
//!
//! ODBC drivers do not always bind a column to its natural C type. Numeric
//! and temporal columns frequently arrive as text, `BIT` may arrive as an
//! integer, and `GUID` columns arrive as the raw 16-byte `SQLGUID` struct.
//! The conversions below accept those alternate forms.

use bytes::Bytes;

use crate::error::TypeError;
use crate::value::SqlValue;

/// Conversion from an assembled [`SqlValue`].
pub trait FromSql: Sized {
    /// Convert from a SQL value to this type.
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError>;

    /// Convert, mapping NULL to `None`.
    fn from_sql_nullable(value: &SqlValue) -> Result<Option<Self>, TypeError> {
        if value.is_null() {
            Ok(None)
        } else {
            Self::from_sql(value).map(Some)
        }
    }
}

fn mismatch(expected: &'static str, value: &SqlValue) -> TypeError {
    match value {
        SqlValue::Null => TypeError::UnexpectedNull,
        _ => TypeError::TypeMismatch {
            expected,
            actual: value.type_name().to_string(),
        },
    }
}

/// Any integer value, widened. Integral text is accepted as drivers bind
/// `NUMERIC(p, 0)` and `BIGINT` columns as characters.
fn integer(expected: &'static str, value: &SqlValue) -> Result<i64, TypeError> {
    match value {
        SqlValue::TinyInt(v) => Ok(i64::from(*v)),
        SqlValue::SmallInt(v) => Ok(i64::from(*v)),
        SqlValue::Int(v) => Ok(i64::from(*v)),
        SqlValue::BigInt(v) => Ok(*v),
        SqlValue::Bool(v) => Ok(i64::from(*v)),
        SqlValue::String(s) => s.trim().parse().map_err(|_| mismatch(expected, value)),
        _ => Err(mismatch(expected, value)),
    }
}

macro_rules! integer_from_sql {
    ($($ty:ty),*) => {
        $(
            impl FromSql for $ty {
                fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
                    let wide = integer(stringify!($ty), value)?;
                    <$ty>::try_from(wide).map_err(|_| TypeError::OutOfRange {
                        target_type: stringify!($ty),
                    })
                }
            }
        )*
    };
}

integer_from_sql!(u8, i16, i32, i64);

impl FromSql for bool {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Bool(v) => Ok(*v),
            SqlValue::String(s) if s == "1" || s == "0" => Ok(s == "1"),
            SqlValue::String(_) => Err(mismatch("bool", value)),
            _ => Ok(integer("bool", value)? != 0),
        }
    }
}

impl FromSql for f64 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Double(v) => Ok(*v),
            SqlValue::Float(v) => Ok(f64::from(*v)),
            SqlValue::String(s) => s.trim().parse().map_err(|_| mismatch("f64", value)),
            _ => integer("f64", value).map(|v| v as f64),
        }
    }
}

impl FromSql for f32 {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Float(v) => Ok(*v),
            _ => Err(mismatch("f32", value)),
        }
    }
}

impl FromSql for String {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| mismatch("String", value))
    }
}

impl FromSql for Vec<u8> {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        value
            .as_bytes()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| mismatch("Vec<u8>", value))
    }
}

impl FromSql for Bytes {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Binary(v) => Ok(v.clone()),
            _ => Err(mismatch("Bytes", value)),
        }
    }
}

impl FromSql for SqlValue {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        Ok(value.clone())
    }
}

impl<T: FromSql> FromSql for Option<T> {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        T::from_sql_nullable(value)
    }
}

/// `GUID` columns bound as binary hold an `SQLGUID`: three little-endian
/// fields followed by eight bytes in order.
#[cfg(feature = "uuid")]
impl FromSql for uuid::Uuid {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Uuid(v) => Ok(*v),
            SqlValue::Binary(b) => {
                let raw: [u8; 16] = b[..].try_into().map_err(|_| {
                    TypeError::InvalidUuid(format!("expected 16 bytes, got {}", b.len()))
                })?;
                Ok(uuid::Uuid::from_bytes_le(raw))
            }
            SqlValue::String(s) => uuid::Uuid::parse_str(s.trim_matches(|c| c == '{' || c == '}'))
                .map_err(|e| TypeError::InvalidUuid(e.to_string())),
            _ => Err(mismatch("Uuid", value)),
        }
    }
}

#[cfg(feature = "decimal")]
impl FromSql for rust_decimal::Decimal {
    fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
        match value {
            SqlValue::Decimal(v) => Ok(*v),
            SqlValue::String(s) => s
                .trim()
                .parse()
                .map_err(|e: rust_decimal::Error| TypeError::InvalidDecimal(e.to_string())),
            _ => integer("Decimal", value).map(rust_decimal::Decimal::from),
        }
    }
}

#[cfg(feature = "chrono")]
mod temporal {
    use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

    use super::{FromSql, mismatch};
    use crate::error::TypeError;
    use crate::value::SqlValue;

    /// Text layouts ODBC drivers use for `SQL_TYPE_TIMESTAMP` and
    /// `SQL_SS_TIMESTAMPOFFSET` columns bound as characters.
    const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
    const TIMESTAMP_OFFSET_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %:z";

    fn parse<T>(
        expected: &'static str,
        value: &SqlValue,
        text: &str,
        parse: impl FnOnce(&str) -> chrono::ParseResult<T>,
    ) -> Result<T, TypeError> {
        parse(text.trim()).map_err(|_| mismatch(expected, value))
    }

    impl FromSql for NaiveDate {
        fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
            match value {
                SqlValue::Date(v) => Ok(*v),
                SqlValue::DateTime(v) => Ok(v.date()),
                SqlValue::String(s) => parse("NaiveDate", value, s, |t| {
                    NaiveDate::parse_from_str(t, "%Y-%m-%d")
                }),
                _ => Err(mismatch("NaiveDate", value)),
            }
        }
    }

    impl FromSql for NaiveTime {
        fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
            match value {
                SqlValue::Time(v) => Ok(*v),
                SqlValue::String(s) => parse("NaiveTime", value, s, |t| {
                    NaiveTime::parse_from_str(t, "%H:%M:%S%.f")
                }),
                _ => Err(mismatch("NaiveTime", value)),
            }
        }
    }

    impl FromSql for NaiveDateTime {
        fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
            match value {
                SqlValue::DateTime(v) => Ok(*v),
                SqlValue::Date(v) => Ok(v.and_time(NaiveTime::MIN)),
                SqlValue::String(s) => parse("NaiveDateTime", value, s, |t| {
                    NaiveDateTime::parse_from_str(t, TIMESTAMP_FORMAT)
                }),
                _ => Err(mismatch("NaiveDateTime", value)),
            }
        }
    }

    impl FromSql for DateTime<FixedOffset> {
        fn from_sql(value: &SqlValue) -> Result<Self, TypeError> {
            match value {
                SqlValue::DateTimeOffset(v) => Ok(*v),
                SqlValue::String(s) => parse("DateTime<FixedOffset>", value, s, |t| {
                    DateTime::parse_from_str(t, TIMESTAMP_OFFSET_FORMAT)
                }),
                _ => Err(mismatch("DateTime<FixedOffset>", value)),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_widen_and_narrow() {
        assert_eq!(i64::from_sql(&SqlValue::TinyInt(9)).unwrap(), 9);
        assert_eq!(i32::from_sql(&SqlValue::BigInt(7)).unwrap(), 7);
        assert_eq!(
            i16::from_sql(&SqlValue::Int(70_000)),
            Err(TypeError::OutOfRange { target_type: "i16" })
        );
        assert_eq!(
            u8::from_sql(&SqlValue::SmallInt(-1)),
            Err(TypeError::OutOfRange { target_type: "u8" })
        );
    }

    #[test]
    fn test_integral_text() {
        assert_eq!(i64::from_sql(&SqlValue::from(" 9007199254740993 ")).unwrap(), 9_007_199_254_740_993);
        assert!(matches!(
            i32::from_sql(&SqlValue::from("1.5")),
            Err(TypeError::TypeMismatch { expected: "i32", .. })
        ));
    }

    #[test]
    fn test_bit_forms() {
        assert!(bool::from_sql(&SqlValue::Bool(true)).unwrap());
        assert!(bool::from_sql(&SqlValue::TinyInt(1)).unwrap());
        assert!(!bool::from_sql(&SqlValue::from("0")).unwrap());
        assert!(bool::from_sql(&SqlValue::from("yes")).is_err());
    }

    #[test]
    fn test_null_handling() {
        assert_eq!(i32::from_sql(&SqlValue::Null), Err(TypeError::UnexpectedNull));
        assert_eq!(Option::<i32>::from_sql(&SqlValue::Null).unwrap(), None);
        assert_eq!(Option::<i32>::from_sql(&SqlValue::Int(42)).unwrap(), Some(42));
    }

    #[test]
    fn test_text_and_bytes() {
        assert_eq!(String::from_sql(&SqlValue::from("hello")).unwrap(), "hello");
        let value = SqlValue::from(vec![1u8, 2, 3]);
        assert_eq!(Vec::<u8>::from_sql(&value).unwrap(), vec![1, 2, 3]);
        assert_eq!(Bytes::from_sql(&value).unwrap().len(), 3);
        assert!(String::from_sql(&value).is_err());
    }

    #[test]
    fn test_float_from_text() {
        assert_eq!(f64::from_sql(&SqlValue::from("2.25")).unwrap(), 2.25);
        assert_eq!(f64::from_sql(&SqlValue::Float(1.5)).unwrap(), 1.5);
        assert_eq!(f64::from_sql(&SqlValue::Int(3)).unwrap(), 3.0);
    }

    #[cfg(feature = "uuid")]
    #[test]
    fn test_guid_struct_bytes() {
        let expected = uuid::Uuid::parse_str("6F9619FF-8B86-D011-B42D-00C04FC964FF").unwrap();
        let raw = vec![
            0xFF, 0x19, 0x96, 0x6F, 0x86, 0x8B, 0x11, 0xD0, 0xB4, 0x2D, 0x00, 0xC0, 0x4F, 0xC9,
            0x64, 0xFF,
        ];
        assert_eq!(uuid::Uuid::from_sql(&SqlValue::from(raw)).unwrap(), expected);
        assert_eq!(
            uuid::Uuid::from_sql(&SqlValue::from("{6F9619FF-8B86-D011-B42D-00C04FC964FF}")).unwrap(),
            expected
        );
        assert!(matches!(
            uuid::Uuid::from_sql(&SqlValue::from(vec![0u8; 4])),
            Err(TypeError::InvalidUuid(_))
        ));
    }

    #[cfg(feature = "decimal")]
    #[test]
    fn test_numeric_text() {
        let d = rust_decimal::Decimal::from_sql(&SqlValue::from("123.4500")).unwrap();
        assert_eq!(d.to_string(), "123.4500");
        assert!(matches!(
            rust_decimal::Decimal::from_sql(&SqlValue::from("abc")),
            Err(TypeError::InvalidDecimal(_))
        ));
    }

    #[cfg(feature = "chrono")]
    #[test]
    fn test_temporal_text() {
        use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Timelike};

        let date = NaiveDate::from_sql(&SqlValue::from("2024-02-29")).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let stamp = NaiveDateTime::from_sql(&SqlValue::from("2024-02-29 13:45:10.250")).unwrap();
        assert_eq!(stamp.date(), date);
        assert_eq!(stamp.nanosecond(), 250_000_000);

        let offset =
            DateTime::<FixedOffset>::from_sql(&SqlValue::from("2024-02-29 13:45:10.0000000 +02:00"))
                .unwrap();
        assert_eq!(offset.offset().local_minus_utc(), 7200);

        assert!(NaiveDate::from_sql(&SqlValue::from("29/02/2024")).is_err());
    }
}
