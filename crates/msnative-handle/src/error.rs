//! Native driver error types.

use thiserror::Error;

/// Message the native driver raises when an operation hits a closed handle.
pub const HANDLE_CLOSED_MESSAGE: &str = "[msnodesql] Connection is closed.";

/// Errors raised by the native driver layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeError {
    /// The handle is closed and cannot be used.
    #[error("{}", HANDLE_CLOSED_MESSAGE)]
    HandleClosed,

    /// A diagnostic record reported by the server or the ODBC driver.
    #[error("{message}")]
    Sql {
        /// Diagnostic message text.
        message: String,
        /// Five-character SQLSTATE.
        sql_state: String,
        /// Native error number.
        code: i32,
        /// Error severity (class), when the driver reports one.
        severity: Option<u8>,
    },

    /// Any other failure raised by the native layer.
    #[error("native driver error: {0}")]
    Driver(String),
}

impl NativeError {
    /// Create a SQL diagnostic error.
    pub fn sql(message: impl Into<String>, sql_state: impl Into<String>, code: i32) -> Self {
        Self::Sql {
            message: message.into(),
            sql_state: sql_state.into(),
            code,
            severity: None,
        }
    }

    /// Attach a severity to a SQL diagnostic error.
    ///
    /// Other variants are returned unchanged.
    #[must_use]
    pub fn with_severity(self, class: u8) -> Self {
        match self {
            Self::Sql {
                message,
                sql_state,
                code,
                ..
            } => Self::Sql {
                message,
                sql_state,
                code,
                severity: Some(class),
            },
            other => other,
        }
    }

    /// Whether the error reports a closed handle.
    #[must_use]
    pub fn is_handle_closed(&self) -> bool {
        match self {
            Self::HandleClosed => true,
            Self::Driver(message) => message == HANDLE_CLOSED_MESSAGE,
            Self::Sql { .. } => false,
        }
    }

    /// Error severity, if reported.
    #[must_use]
    pub fn severity(&self) -> Option<u8> {
        match self {
            Self::Sql { severity, .. } => *severity,
            _ => None,
        }
    }

    /// The message text without any prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::HandleClosed => HANDLE_CLOSED_MESSAGE,
            Self::Sql { message, .. } => message,
            Self::Driver(message) => message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_closed_detection() {
        assert!(NativeError::HandleClosed.is_handle_closed());
        assert!(NativeError::Driver(HANDLE_CLOSED_MESSAGE.into()).is_handle_closed());
        assert!(!NativeError::Driver("timeout".into()).is_handle_closed());
        assert!(!NativeError::sql("boom", "42000", 50000).is_handle_closed());
    }

    #[test]
    fn test_sql_error_display_and_severity() {
        let err = NativeError::sql("[Microsoft][ODBC Driver] Custom Error", "42000", 50000)
            .with_severity(18);
        assert_eq!(err.to_string(), "[Microsoft][ODBC Driver] Custom Error");
        assert_eq!(err.severity(), Some(18));
        assert_eq!(NativeError::Driver("x".into()).with_severity(3).severity(), None);
    }
}
