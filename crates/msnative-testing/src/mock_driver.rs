//! Scripted native driver for unit and integration tests.
//!
//! The mock driver answers each submission with a configured response,
//! rendered as the event sequence a native driver would deliver. It also
//! imitates the connection string handling of an ODBC driver manager closely
//! enough for driver detection to run against it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use msnative_handle::{EventStream, HandleEvent, NativeDriver, NativeError, NativeHandle};
use msnative_types::{ColumnMetadata, SqlType, SqlValue};
use parking_lot::Mutex;

/// Custom response handler.
pub type ResponseHandler = Arc<dyn Fn(&str) -> MockResponse + Send + Sync>;

/// Mock response configuration.
#[derive(Clone)]
pub enum MockResponse {
    /// One result set.
    Rows {
        /// Column metadata.
        columns: Vec<ColumnMetadata>,
        /// Row data, one value per column.
        rows: Vec<Vec<SqlValue>>,
    },

    /// Return a server error.
    Error {
        /// Error number.
        code: i32,
        /// Error message.
        message: String,
        /// Severity class.
        severity: u8,
    },

    /// Complete without a result set (INSERT/UPDATE/DELETE).
    RowsAffected(u64),

    /// Several statements in one submission, completed once at the end.
    Batch(Vec<MockResponse>),

    /// Deliver exactly these events.
    Events(Vec<HandleEvent>),

    /// Deliver the response after a delay.
    Delayed(Duration, Box<MockResponse>),

    /// Never deliver anything.
    Hang,

    /// Execute a custom handler.
    Custom(ResponseHandler),
}

impl fmt::Debug for MockResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rows { columns, rows } => f
                .debug_struct("Rows")
                .field("columns", columns)
                .field("rows", rows)
                .finish(),
            Self::Error {
                code,
                message,
                severity,
            } => f
                .debug_struct("Error")
                .field("code", code)
                .field("message", message)
                .field("severity", severity)
                .finish(),
            Self::RowsAffected(n) => f.debug_tuple("RowsAffected").field(n).finish(),
            Self::Batch(parts) => f.debug_tuple("Batch").field(parts).finish(),
            Self::Events(events) => f.debug_tuple("Events").field(events).finish(),
            Self::Delayed(delay, response) => f
                .debug_tuple("Delayed")
                .field(delay)
                .field(response)
                .finish(),
            Self::Hang => f.write_str("Hang"),
            Self::Custom(_) => f.debug_tuple("Custom").field(&"<fn>").finish(),
        }
    }
}

impl MockResponse {
    /// A single unnamed column holding one value, like `SELECT 1+1`.
    pub fn scalar(value: impl Into<SqlValue>) -> Self {
        let value = value.into();
        Self::Rows {
            columns: vec![ColumnMetadata::new("", sql_type_of(&value))],
            rows: vec![vec![value]],
        }
    }

    /// Create a multi-row response.
    pub fn rows(columns: Vec<ColumnMetadata>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self::Rows { columns, rows }
    }

    /// Create an empty result response.
    pub fn empty() -> Self {
        Self::RowsAffected(0)
    }

    /// Create a rows affected response.
    pub fn affected(count: u64) -> Self {
        Self::RowsAffected(count)
    }

    /// Create an error response with severity 16.
    pub fn error(message: impl Into<String>) -> Self {
        Self::error_with_severity(message, 16)
    }

    /// Create an error response with the given severity.
    pub fn error_with_severity(message: impl Into<String>, severity: u8) -> Self {
        Self::Error {
            code: 50000,
            message: message.into(),
            severity,
        }
    }

    /// Several statements in one submission.
    pub fn batch(parts: Vec<MockResponse>) -> Self {
        Self::Batch(parts)
    }

    /// Deliver exactly these events.
    pub fn events(events: Vec<HandleEvent>) -> Self {
        Self::Events(events)
    }

    /// Deliver `response` after `delay`.
    pub fn delayed(delay: Duration, response: MockResponse) -> Self {
        Self::Delayed(delay, Box::new(response))
    }

    /// Compute the response from the submitted SQL.
    pub fn custom<F>(handler: F) -> Self
    where
        F: Fn(&str) -> MockResponse + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(handler))
    }

    fn plan(&self, sql: &str) -> Plan {
        match self {
            Self::Custom(handler) => handler(sql).plan(sql),
            Self::Hang => Plan::Hang,
            Self::Delayed(delay, response) => match response.plan(sql) {
                Plan::Ready(events) => Plan::Delayed(*delay, events),
                other => other,
            },
            Self::Events(events) => Plan::Ready(events.clone()),
            Self::Batch(parts) => {
                let mut events = Vec::new();
                for part in parts {
                    if part.append_statement(sql, &mut events) {
                        return Plan::Ready(events);
                    }
                }
                events.push(HandleEvent::Done);
                Plan::Ready(events)
            }
            _ => {
                let mut events = Vec::new();
                if !self.append_statement(sql, &mut events) {
                    events.push(HandleEvent::Done);
                }
                Plan::Ready(events)
            }
        }
    }

    /// Append one statement's events. Returns true when the statement failed
    /// and the submission must stop.
    fn append_statement(&self, sql: &str, events: &mut Vec<HandleEvent>) -> bool {
        match self {
            Self::Rows { columns, rows } => {
                events.push(HandleEvent::Metadata(columns.clone()));
                for row in rows {
                    events.push(HandleEvent::RowStart);
                    events.extend(
                        row.iter()
                            .enumerate()
                            .map(|(index, value)| HandleEvent::column(index, value.clone())),
                    );
                }
                false
            }
            Self::Error {
                code,
                message,
                severity,
            } => {
                events.push(HandleEvent::Error(
                    NativeError::sql(message.clone(), "42000", *code).with_severity(*severity),
                ));
                true
            }
            Self::RowsAffected(_) => false,
            Self::Custom(handler) => handler(sql).append_statement(sql, events),
            Self::Batch(parts) => parts
                .iter()
                .any(|part| part.append_statement(sql, events)),
            Self::Events(extra) => {
                events.extend(extra.iter().cloned());
                false
            }
            Self::Delayed(_, response) => response.append_statement(sql, events),
            Self::Hang => false,
        }
    }
}

enum Plan {
    Ready(Vec<HandleEvent>),
    Delayed(Duration, Vec<HandleEvent>),
    Hang,
}

impl Plan {
    fn into_stream(self) -> EventStream {
        match self {
            Self::Ready(events) => Box::pin(stream::iter(events)),
            Self::Delayed(delay, events) => Box::pin(
                stream::once(async move {
                    tokio::time::sleep(delay).await;
                    stream::iter(events)
                })
                .flatten(),
            ),
            Self::Hang => Box::pin(stream::pending::<HandleEvent>()),
        }
    }
}

/// The SQL type a native driver would report for a value.
fn sql_type_of(value: &SqlValue) -> SqlType {
    match value {
        SqlValue::Bool(_) => SqlType::Bit,
        SqlValue::TinyInt(_) => SqlType::TinyInt,
        SqlValue::SmallInt(_) => SqlType::SmallInt,
        SqlValue::BigInt(_) => SqlType::BigInt,
        SqlValue::Float(_) => SqlType::Real,
        SqlValue::Double(_) => SqlType::Double,
        SqlValue::String(_) => SqlType::WVarChar,
        SqlValue::Binary(_) => SqlType::VarBinary,
        _ => SqlType::Integer,
    }
}

struct DriverState {
    responses: HashMap<String, MockResponse>,
    default_response: MockResponse,
    installed_drivers: Vec<String>,
    open_error: Option<NativeError>,
    close_error: Option<NativeError>,
    killed: AtomicBool,
    fail_submissions: AtomicBool,
    submitted: Mutex<Vec<String>>,
    opened: Mutex<Vec<String>>,
    live_handles: AtomicUsize,
}

/// Builder for [`MockDriver`].
pub struct MockDriverBuilder {
    responses: HashMap<String, MockResponse>,
    default_response: MockResponse,
    installed_drivers: Vec<String>,
    open_error: Option<NativeError>,
    close_error: Option<NativeError>,
}

impl MockDriverBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            default_response: MockResponse::empty(),
            installed_drivers: vec!["SQL Server Native Client 11.0".to_string()],
            open_error: None,
            close_error: None,
        }
    }

    /// Add a response for a specific SQL text.
    #[must_use]
    pub fn with_response(mut self, sql: impl Into<String>, response: MockResponse) -> Self {
        self.responses.insert(sql.into(), response);
        self
    }

    /// Set the response for unmatched SQL.
    #[must_use]
    pub fn with_default_response(mut self, response: MockResponse) -> Self {
        self.default_response = response;
        self
    }

    /// Replace the set of installed ODBC driver names.
    #[must_use]
    pub fn with_installed_drivers<I, S>(mut self, drivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.installed_drivers = drivers.into_iter().map(Into::into).collect();
        self
    }

    /// Fail every open of a complete connection string with this error.
    #[must_use]
    pub fn with_open_error(mut self, error: NativeError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// Fail every handle close with this error.
    #[must_use]
    pub fn with_close_error(mut self, error: NativeError) -> Self {
        self.close_error = Some(error);
        self
    }

    /// Build the driver.
    pub fn build(self) -> MockDriver {
        MockDriver {
            state: Arc::new(DriverState {
                responses: self.responses,
                default_response: self.default_response,
                installed_drivers: self.installed_drivers,
                open_error: self.open_error,
                close_error: self.close_error,
                killed: AtomicBool::new(false),
                fail_submissions: AtomicBool::new(false),
                submitted: Mutex::new(Vec::new()),
                opened: Mutex::new(Vec::new()),
                live_handles: AtomicUsize::new(0),
            }),
        }
    }
}

impl Default for MockDriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A scripted native driver.
///
/// Clones share configuration, recordings, and fault switches.
#[derive(Clone)]
pub struct MockDriver {
    state: Arc<DriverState>,
}

impl MockDriver {
    /// Create a new builder for the mock driver.
    pub fn builder() -> MockDriverBuilder {
        MockDriverBuilder::new()
    }

    /// SQL texts submitted on any handle, in submission order.
    pub fn submitted(&self) -> Vec<String> {
        self.state.submitted.lock().clone()
    }

    /// Connection strings passed to `open`, including detection probes.
    pub fn opened(&self) -> Vec<String> {
        self.state.opened.lock().clone()
    }

    /// Number of handles opened and not yet closed.
    pub fn live_handles(&self) -> usize {
        self.state.live_handles.load(Ordering::SeqCst)
    }

    /// Silently invalidate every handle, as a dropped link would.
    ///
    /// Handles report themselves closed; probes and submissions fail with
    /// the handle-closed condition.
    pub fn kill(&self) {
        self.state.killed.store(true, Ordering::SeqCst);
    }

    /// Make submissions fail synchronously with a driver error.
    pub fn fail_submissions(&self, fail: bool) {
        self.state.fail_submissions.store(fail, Ordering::SeqCst);
    }

    fn response_for(&self, sql: &str) -> &MockResponse {
        self.state
            .responses
            .get(sql)
            .unwrap_or(&self.state.default_response)
    }
}

impl fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockDriver")
            .field("responses", &self.state.responses.len())
            .field("installed_drivers", &self.state.installed_drivers)
            .field("live_handles", &self.live_handles())
            .finish()
    }
}

/// Value of `key=` in an ODBC connection string, braces removed.
fn keyword<'a>(connection_string: &'a str, key: &str) -> Option<&'a str> {
    connection_string.split(';').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        name.trim()
            .eq_ignore_ascii_case(key)
            .then(|| value.trim().trim_start_matches('{').trim_end_matches('}'))
    })
}

#[async_trait]
impl NativeDriver for MockDriver {
    async fn open(&self, connection_string: &str) -> Result<Box<dyn NativeHandle>, NativeError> {
        self.state.opened.lock().push(connection_string.to_string());
        tracing::trace!(connection_string, "mock open");

        let Some(driver) = keyword(connection_string, "Driver") else {
            return Err(NativeError::Driver(
                "[Driver Manager] Data source name not found and no default driver specified"
                    .into(),
            ));
        };
        if !self.state.installed_drivers.iter().any(|d| d == driver) {
            return Err(NativeError::Driver(format!(
                "[Driver Manager] Can't open lib '{driver}' : file not found"
            )));
        }
        if keyword(connection_string, "Server").is_none() {
            return Err(NativeError::sql(
                format!("[{driver}] Neither DSN nor SERVER keyword supplied"),
                "08001",
                0,
            ));
        }
        if let Some(error) = &self.state.open_error {
            return Err(error.clone());
        }

        self.state.live_handles.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockHandle {
            driver: self.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

/// A handle opened by [`MockDriver`].
pub struct MockHandle {
    driver: MockDriver,
    closed: AtomicBool,
}

impl fmt::Debug for MockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl NativeHandle for MockHandle {
    fn submit(&self, sql: &str) -> Result<EventStream, NativeError> {
        if self.is_closed() {
            return Err(NativeError::HandleClosed);
        }
        if self.driver.state.fail_submissions.load(Ordering::SeqCst) {
            return Err(NativeError::Driver("mock submission failure".into()));
        }
        self.driver.state.submitted.lock().push(sql.to_string());
        tracing::trace!(sql, "mock submit");
        Ok(self.driver.response_for(sql).plan(sql).into_stream())
    }

    fn probe(&self) -> Result<(), NativeError> {
        if self.is_closed() {
            Err(NativeError::HandleClosed)
        } else {
            Ok(())
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.driver.state.killed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), NativeError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.driver.state.live_handles.fetch_sub(1, Ordering::SeqCst);
        }
        match &self.driver.state.close_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
