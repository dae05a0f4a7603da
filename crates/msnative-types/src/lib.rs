//! # msnative-types
//!
//! Value and column model for rows produced by the native SQL Server driver.
//!
//! The native driver reports column metadata once per statement and then
//! streams column values by position. This crate holds the pieces those
//! events are assembled into:
//!
//! - [`SqlValue`]: a single column value, including chunk concatenation for
//!   long text and binary columns
//! - [`SqlType`]: the ODBC type code the driver reports for a column
//! - [`ColumnMetadata`]: name, type, nullability, and declared size
//! - [`ColumnCell`]: one assembled (metadata, value) pair of a row
//! - [`FromSql`]: typed extraction of Rust values
//!
//! ## Features
//!
//! - `chrono` (default): date/time values via chrono
//! - `uuid` (default): `UNIQUEIDENTIFIER` values
//! - `decimal` (default): `DECIMAL`/`NUMERIC` values via rust_decimal
//!
//! ## Type Mappings
//!
//! | SQL Server Type | Rust Type |
//! |-----------------|-----------|
//! | `BIT` | `bool` |
//! | `TINYINT` | `u8` |
//! | `SMALLINT` | `i16` |
//! | `INT` | `i32` |
//! | `BIGINT` | `i64` |
//! | `REAL` | `f32` |
//! | `FLOAT` | `f64` |
//! | `DECIMAL`/`NUMERIC` | `rust_decimal::Decimal` |
//! | `CHAR`/`VARCHAR`/`NVARCHAR` | `String` |
//! | `BINARY`/`VARBINARY` | `Vec<u8>` / `Bytes` |
//! | `DATE` | `chrono::NaiveDate` |
//! | `DATETIME2` | `chrono::NaiveDateTime` |
//! | `UNIQUEIDENTIFIER` | `uuid::Uuid` |

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod column;
pub mod error;
pub mod from_sql;
pub mod sql_type;
pub mod value;

pub use column::{ColumnCell, ColumnMetadata};
pub use error::TypeError;
pub use from_sql::FromSql;
pub use sql_type::SqlType;
pub use value::SqlValue;
