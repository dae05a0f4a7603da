//! SQL type identifiers reported by the native driver.
//!
//! The native driver sits on ODBC and describes each result column with an
//! ODBC SQL type code (`SQLSMALLINT`). SQL Server specific codes (`SQL_SS_*`)
//! are included.

/// SQL type of a result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    /// Fixed-length character (`SQL_CHAR`).
    Char,
    /// Variable-length character (`SQL_VARCHAR`).
    VarChar,
    /// Long character, `VARCHAR(MAX)`/`TEXT` (`SQL_LONGVARCHAR`).
    LongVarChar,
    /// Fixed-length Unicode character (`SQL_WCHAR`).
    WChar,
    /// Variable-length Unicode character (`SQL_WVARCHAR`).
    WVarChar,
    /// Long Unicode character, `NVARCHAR(MAX)`/`NTEXT` (`SQL_WLONGVARCHAR`).
    WLongVarChar,
    /// Exact numeric (`SQL_NUMERIC`).
    Numeric,
    /// Exact decimal (`SQL_DECIMAL`).
    Decimal,
    /// 32-bit integer (`SQL_INTEGER`).
    Integer,
    /// 16-bit integer (`SQL_SMALLINT`).
    SmallInt,
    /// 8-bit integer (`SQL_TINYINT`).
    TinyInt,
    /// 64-bit integer (`SQL_BIGINT`).
    BigInt,
    /// Single precision float (`SQL_REAL`).
    Real,
    /// Float with declared precision (`SQL_FLOAT`).
    Float,
    /// Double precision float (`SQL_DOUBLE`).
    Double,
    /// Bit (`SQL_BIT`).
    Bit,
    /// Fixed-length binary (`SQL_BINARY`).
    Binary,
    /// Variable-length binary (`SQL_VARBINARY`).
    VarBinary,
    /// Long binary, `VARBINARY(MAX)`/`IMAGE` (`SQL_LONGVARBINARY`).
    LongVarBinary,
    /// Date (`SQL_TYPE_DATE`).
    Date,
    /// Time (`SQL_TYPE_TIME`).
    Time,
    /// Timestamp, `DATETIME`/`DATETIME2` (`SQL_TYPE_TIMESTAMP`).
    Timestamp,
    /// Unique identifier (`SQL_GUID`).
    Guid,
    /// SQL Server `TIME` with fractional seconds (`SQL_SS_TIME2`).
    Time2,
    /// SQL Server `DATETIMEOFFSET` (`SQL_SS_TIMESTAMPOFFSET`).
    TimestampOffset,
    /// SQL Server `XML` (`SQL_SS_XML`).
    Xml,
    /// SQL Server `SQL_VARIANT` (`SQL_SS_VARIANT`).
    Variant,
    /// A code this crate does not name.
    Other(i16),
}

impl SqlType {
    /// Map an ODBC SQL type code to a type.
    ///
    /// Codes without a named variant are preserved as [`SqlType::Other`].
    #[must_use]
    pub fn from_code(code: i16) -> Self {
        match code {
            1 => Self::Char,
            12 => Self::VarChar,
            -1 => Self::LongVarChar,
            -8 => Self::WChar,
            -9 => Self::WVarChar,
            -10 => Self::WLongVarChar,
            2 => Self::Numeric,
            3 => Self::Decimal,
            4 => Self::Integer,
            5 => Self::SmallInt,
            -6 => Self::TinyInt,
            -5 => Self::BigInt,
            7 => Self::Real,
            6 => Self::Float,
            8 => Self::Double,
            -7 => Self::Bit,
            -2 => Self::Binary,
            -3 => Self::VarBinary,
            -4 => Self::LongVarBinary,
            91 => Self::Date,
            92 => Self::Time,
            93 => Self::Timestamp,
            -11 => Self::Guid,
            -154 => Self::Time2,
            -155 => Self::TimestampOffset,
            -152 => Self::Xml,
            -150 => Self::Variant,
            other => Self::Other(other),
        }
    }

    /// The ODBC SQL type code.
    #[must_use]
    pub fn code(&self) -> i16 {
        match self {
            Self::Char => 1,
            Self::VarChar => 12,
            Self::LongVarChar => -1,
            Self::WChar => -8,
            Self::WVarChar => -9,
            Self::WLongVarChar => -10,
            Self::Numeric => 2,
            Self::Decimal => 3,
            Self::Integer => 4,
            Self::SmallInt => 5,
            Self::TinyInt => -6,
            Self::BigInt => -5,
            Self::Real => 7,
            Self::Float => 6,
            Self::Double => 8,
            Self::Bit => -7,
            Self::Binary => -2,
            Self::VarBinary => -3,
            Self::LongVarBinary => -4,
            Self::Date => 91,
            Self::Time => 92,
            Self::Timestamp => 93,
            Self::Guid => -11,
            Self::Time2 => -154,
            Self::TimestampOffset => -155,
            Self::Xml => -152,
            Self::Variant => -150,
            Self::Other(code) => *code,
        }
    }

    /// The lowercase SQL Server type name the native driver uses.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Char => "char",
            Self::VarChar => "varchar",
            Self::LongVarChar => "text",
            Self::WChar => "nchar",
            Self::WVarChar => "nvarchar",
            Self::WLongVarChar => "ntext",
            Self::Numeric => "numeric",
            Self::Decimal => "decimal",
            Self::Integer => "int",
            Self::SmallInt => "smallint",
            Self::TinyInt => "tinyint",
            Self::BigInt => "bigint",
            Self::Real => "real",
            Self::Float | Self::Double => "float",
            Self::Bit => "bit",
            Self::Binary => "binary",
            Self::VarBinary => "varbinary",
            Self::LongVarBinary => "image",
            Self::Date => "date",
            Self::Time | Self::Time2 => "time",
            Self::Timestamp => "datetime2",
            Self::Guid => "uniqueidentifier",
            Self::TimestampOffset => "datetimeoffset",
            Self::Xml => "xml",
            Self::Variant => "sql_variant",
            Self::Other(_) => "unknown",
        }
    }

    /// Whether values of this type are delivered as text.
    #[must_use]
    pub fn is_character(&self) -> bool {
        matches!(
            self,
            Self::Char
                | Self::VarChar
                | Self::LongVarChar
                | Self::WChar
                | Self::WVarChar
                | Self::WLongVarChar
                | Self::Xml
        )
    }

    /// Whether values of this type are delivered as bytes.
    #[must_use]
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary | Self::VarBinary | Self::LongVarBinary)
    }
}

impl From<i16> for SqlType {
    fn from(code: i16) -> Self {
        Self::from_code(code)
    }
}

impl std::fmt::Display for SqlType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Other(code) => write!(f, "unknown({code})"),
            other => f.write_str(other.name()),
        }
    }
}
