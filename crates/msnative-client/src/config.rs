//! Client configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default interval between heartbeat probes.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// What a connection does when a request fails with a native error.
///
/// A native error in the middle of a submission leaves the handle's session
/// state undefined, so the default closes the connection on any error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Close the connection on every request error.
    #[default]
    CloseOnAnyError,
    /// Keep the connection open for server errors whose reported severity is
    /// at or below the threshold. Errors without a severity still close.
    CloseAboveSeverity(u8),
}

impl ErrorPolicy {
    /// Whether a request failing with `error` must close its connection.
    #[must_use]
    pub fn should_close(&self, error: &Error) -> bool {
        match self {
            Self::CloseOnAnyError => true,
            Self::CloseAboveSeverity(threshold) => match error {
                Error::Protocol(native) => native
                    .severity()
                    .is_none_or(|severity| severity > *threshold),
                _ => true,
            },
        }
    }
}

/// Configuration for connecting through the native driver.
///
/// This struct is marked `#[non_exhaustive]` to allow adding new fields
/// in future releases without breaking semver. Use [`Config::new()`] or
/// [`Config::from_json()`] to construct instances.
#[derive(Clone)]
#[non_exhaustive]
pub struct Config {
    /// Complete ODBC connection string. When set, it is used verbatim and the
    /// discrete fields below are ignored.
    pub connection_string: Option<String>,

    /// Server hostname (default: `localhost`).
    pub server: String,

    /// Named instance. Required unless a connection string is given.
    pub instance_name: Option<String>,

    /// Database name.
    pub database: Option<String>,

    /// Use Windows integrated authentication instead of a user name and
    /// password.
    pub trusted_connection: bool,

    /// SQL Server login name.
    pub user_name: Option<String>,

    /// SQL Server login password.
    pub password: Option<String>,

    /// ODBC driver name. Detected at open time when absent.
    pub driver: Option<String>,

    /// Interval between heartbeat probes (default: 5s).
    pub heartbeat_interval: Duration,

    /// Connection behavior after a request error.
    pub error_policy: ErrorPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection_string: None,
            server: "localhost".to_string(),
            instance_name: None,
            database: None,
            trusted_connection: false,
            user_name: None,
            password: None,
            driver: None,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            error_policy: ErrorPolicy::default(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("connection_string", &self.connection_string.as_ref().map(|_| "<set>"))
            .field("server", &self.server)
            .field("instance_name", &self.instance_name)
            .field("database", &self.database)
            .field("trusted_connection", &self.trusted_connection)
            .field("user_name", &self.user_name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("driver", &self.driver)
            .field("heartbeat_interval", &self.heartbeat_interval)
            .field("error_policy", &self.error_policy)
            .finish()
    }
}

/// Recognized keys of a JSON configuration document.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Settings {
    connection_string: Option<String>,
    server: Option<String>,
    instance_name: Option<String>,
    database: Option<String>,
    trusted_connection: Option<bool>,
    user_name: Option<String>,
    password: Option<String>,
    driver: Option<String>,
    heartbeat_interval_ms: Option<u64>,
}

/// Top-level document: settings plus an `options` object that overrides them.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigDocument {
    #[serde(flatten)]
    settings: Settings,
    options: Option<Settings>,
}

impl Settings {
    fn overlay(mut self, other: Settings) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(
            connection_string,
            server,
            instance_name,
            database,
            trusted_connection,
            user_name,
            password,
            driver,
            heartbeat_interval_ms
        );
        self
    }
}

impl Config {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON document.
    ///
    /// Keys are camelCase (`connectionString`, `instanceName`,
    /// `trustedConnection`, `userName`, `heartbeatIntervalMs`, ...). Keys in a
    /// nested `options` object take precedence over top-level keys. Unknown
    /// keys are ignored.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: ConfigDocument = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("invalid configuration document: {e}")))?;

        let settings = match document.options {
            Some(options) => document.settings.overlay(options),
            None => document.settings,
        };

        let mut config = Self::default();
        config.connection_string = settings.connection_string;
        if let Some(server) = settings.server {
            config.server = server;
        }
        config.instance_name = settings.instance_name;
        config.database = settings.database;
        config.trusted_connection = settings.trusted_connection.unwrap_or(false);
        config.user_name = settings.user_name;
        config.password = settings.password;
        config.driver = settings.driver;
        if let Some(ms) = settings.heartbeat_interval_ms {
            config.heartbeat_interval = Duration::from_millis(ms);
        }

        tracing::debug!(config = ?config, "loaded configuration");
        Ok(config)
    }

    /// The ODBC connection string for this configuration.
    ///
    /// An explicit connection string is returned unchanged. Otherwise one is
    /// synthesized from the discrete fields:
    ///
    /// ```text
    /// [Driver={driver};]Server=<server>\<instance>;[Database=<db>;]
    ///     Trusted_Connection=yes;  |  Uid=<user>;Pwd=<password>;
    /// ```
    pub fn build_connection_string(&self) -> Result<String> {
        if let Some(connection_string) = &self.connection_string {
            return Ok(connection_string.clone());
        }

        let instance = self
            .instance_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::Config("instance name is required".into()))?;

        let server = if self.server.is_empty() {
            "localhost"
        } else {
            &self.server
        };

        let mut out = String::new();
        if let Some(driver) = &self.driver {
            out.push_str(&format!("Driver={{{driver}}};"));
        }
        out.push_str(&format!("Server={server}\\{instance};"));
        if let Some(database) = self.database.as_deref().filter(|db| !db.is_empty()) {
            out.push_str(&format!("Database={database};"));
        }
        if self.trusted_connection {
            out.push_str("Trusted_Connection=yes;");
        } else {
            out.push_str(&format!(
                "Uid={};Pwd={};",
                self.user_name.as_deref().unwrap_or_default(),
                self.password.as_deref().unwrap_or_default()
            ));
        }
        Ok(out)
    }

    /// Use a complete connection string verbatim.
    #[must_use]
    pub fn connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    /// Set the server host.
    #[must_use]
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    /// Set the named instance.
    #[must_use]
    pub fn instance_name(mut self, instance: impl Into<String>) -> Self {
        self.instance_name = Some(instance.into());
        self
    }

    /// Set the database name.
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Use integrated authentication.
    #[must_use]
    pub fn trusted_connection(mut self, trusted: bool) -> Self {
        self.trusted_connection = trusted;
        self
    }

    /// Set SQL Server login credentials.
    #[must_use]
    pub fn credentials(mut self, user_name: impl Into<String>, password: impl Into<String>) -> Self {
        self.user_name = Some(user_name.into());
        self.password = Some(password.into());
        self
    }

    /// Set the ODBC driver name explicitly, skipping detection.
    #[must_use]
    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    /// Set the heartbeat interval.
    #[must_use]
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the behavior after request errors.
    #[must_use]
    pub fn error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use msnative_handle::NativeError;

    use super::*;

    #[test]
    fn test_sql_login_connection_string() {
        let config = Config::new()
            .server("db01")
            .instance_name("SQLEXPRESS")
            .database("test")
            .credentials("sa", "secret");

        assert_eq!(
            config.build_connection_string().unwrap(),
            "Server=db01\\SQLEXPRESS;Database=test;Uid=sa;Pwd=secret;"
        );
    }

    #[test]
    fn test_trusted_connection_string_with_driver() {
        let config = Config::new()
            .instance_name("SQLEXPRESS")
            .trusted_connection(true)
            .driver("SQL Server Native Client 11.0");

        assert_eq!(
            config.build_connection_string().unwrap(),
            "Driver={SQL Server Native Client 11.0};Server=localhost\\SQLEXPRESS;Trusted_Connection=yes;"
        );
    }

    #[test]
    fn test_missing_credentials_render_empty() {
        let config = Config::new().instance_name("I");
        assert_eq!(
            config.build_connection_string().unwrap(),
            "Server=localhost\\I;Uid=;Pwd=;"
        );
    }

    #[test]
    fn test_instance_name_required() {
        let err = Config::new().build_connection_string().unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("instance name")));
    }

    #[test]
    fn test_explicit_connection_string_used_verbatim() {
        let config = Config::new().connection_string("Driver={X};Server=a;");
        assert_eq!(config.build_connection_string().unwrap(), "Driver={X};Server=a;");
    }

    #[test]
    fn test_from_json_with_options_override() {
        let config = Config::from_json(
            r#"{
                "server": "db01",
                "instanceName": "A",
                "userName": "app",
                "password": "pw",
                "heartbeatIntervalMs": 250,
                "options": { "instanceName": "B", "database": "sales" },
                "unknownKey": 1
            }"#,
        )
        .unwrap();

        assert_eq!(config.server, "db01");
        assert_eq!(config.instance_name.as_deref(), Some("B"));
        assert_eq!(config.database.as_deref(), Some("sales"));
        assert_eq!(config.heartbeat_interval, Duration::from_millis(250));
        assert_eq!(
            config.build_connection_string().unwrap(),
            "Server=db01\\B;Database=sales;Uid=app;Pwd=pw;"
        );
    }

    #[test]
    fn test_from_json_rejects_malformed_document() {
        assert!(matches!(Config::from_json("{"), Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = Config::new().credentials("sa", "hunter2");
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_error_policy() {
        let low = Error::Protocol(NativeError::sql("Custom Error", "01000", 50000).with_severity(1));
        let high = Error::Protocol(NativeError::sql("Custom Error", "42000", 50000).with_severity(18));
        let unrated = Error::Protocol(NativeError::Driver("lost".into()));

        assert!(ErrorPolicy::default().should_close(&low));

        let relaxed = ErrorPolicy::CloseAboveSeverity(10);
        assert!(!relaxed.should_close(&low));
        assert!(relaxed.should_close(&high));
        assert!(relaxed.should_close(&unrated));
        assert!(relaxed.should_close(&Error::ProtocolViolation("bad index".into())));
    }
}
