//! ODBC driver detection.
//!
//! When neither the configuration nor the connection string names a driver,
//! the installed SQL Server ODBC drivers are probed newest first. Opening a
//! connection string that holds only a `Driver=` keyword fails immediately;
//! an installed driver fails with a "no DSN nor SERVER" diagnostic, while a
//! missing one fails with a driver manager error.

use once_cell::sync::Lazy;
use regex::Regex;

use msnative_handle::NativeDriver;

use crate::error::{Error, Result};

/// Driver names probed during detection, in order of preference.
pub const DRIVER_CANDIDATES: &[&str] = &[
    "SQL Server Native Client 12.0",
    "SQL Server Native Client 11.0",
    "SQL Server Native Client 10.0",
    "SQL Native Client",
    "SQL Server",
];

/// Diagnostic an installed driver reports for a string without a server.
pub const INSTALLED_DRIVER_MARKER: &str = "Neither DSN nor SERVER keyword supplied";

/// Whether the connection string already carries a `Driver=` keyword.
#[must_use]
pub fn has_driver_keyword(connection_string: &str) -> bool {
    #[allow(clippy::unwrap_used)] // literal pattern
    static DRIVER_KEYWORD_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)(?:^\s*Driver\s*=)|(?:;\s*Driver\s*=)").unwrap());

    DRIVER_KEYWORD_RE.is_match(connection_string)
}

/// Prefix a connection string with a driver keyword.
#[must_use]
pub fn with_driver(driver: &str, connection_string: &str) -> String {
    format!("Driver={{{driver}}};{connection_string}")
}

/// Probe the candidate drivers and return the first installed one.
pub async fn detect_driver(driver: &dyn NativeDriver) -> Result<&'static str> {
    for &candidate in DRIVER_CANDIDATES {
        match driver.open(&format!("Driver={candidate};")).await {
            Err(e) if e.message().contains(INSTALLED_DRIVER_MARKER) => {
                tracing::debug!(driver = candidate, "detected ODBC driver");
                return Ok(candidate);
            }
            Err(e) => {
                tracing::trace!(driver = candidate, error = %e, "driver not available");
            }
            Ok(handle) => {
                tracing::warn!(driver = candidate, "driver-only connection string opened a handle");
                if let Err(e) = handle.close().await {
                    tracing::debug!(driver = candidate, error = %e, "failed to close probe handle");
                }
            }
        }
    }
    Err(Error::NoDriverDetected)
}
