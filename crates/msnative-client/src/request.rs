//! SQL requests and their execution.
//!
//! A [`Request`] is built detached, then handed to
//! [`Connection::execute`](crate::Connection::execute). From that point the
//! connection owns it: the request is registered as pending, queued behind any
//! request already running on the connection, submitted, and driven through
//! the submission's event stream.
//!
//! Completed rows are delivered to the row listeners as soon as they are
//! finalized. The terminal callback fires exactly once, after every row
//! delivery, with either the aggregated [`QueryResult`] or the first error.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::StreamExt;
use msnative_handle::{EventStream, HandleEvent};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::accumulator::RowAccumulator;
use crate::error::{Error, Result};
use crate::row::{QueryResult, Row};
use crate::state::RequestState;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        Self(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw identifier.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Listener invoked once per completed row.
pub type RowListener = Box<dyn FnMut(&Row) + Send>;

/// Terminal callback of a request.
pub type CompletionCallback = Box<dyn FnOnce(Result<QueryResult>) + Send>;

/// One SQL submission: SQL text, row listeners, and a terminal callback.
///
/// The SQL text may hold several statements; rows of all statements are
/// delivered in order and the callback still fires once.
///
/// # Example
///
/// ```rust,ignore
/// let request = Request::new("SELECT 1+1; SELECT 2+2")
///     .on_row(|row| println!("{:?}", row.get::<i32>(0)))
///     .on_complete(|result| println!("done: {}", result.is_ok()));
/// connection.execute(request);
/// ```
pub struct Request {
    id: RequestId,
    sql: String,
    listeners: Vec<RowListener>,
    callback: Option<CompletionCallback>,
}

impl Request {
    /// Create a request for the given SQL text.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            id: RequestId::next(),
            sql: sql.into(),
            listeners: Vec::new(),
            callback: None,
        }
    }

    /// Register a listener for completed rows.
    #[must_use]
    pub fn on_row<F>(mut self, listener: F) -> Self
    where
        F: FnMut(&Row) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Set the terminal callback.
    ///
    /// Without a callback, failures still close the connection; only the
    /// notification is skipped.
    #[must_use]
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Result<QueryResult>) + Send + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    /// The request's identity.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// The SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Split into the shared pending entry and the execution that drives it.
    pub(crate) fn into_parts(self) -> (Arc<PendingRequest>, Execution) {
        let pending = Arc::new(PendingRequest {
            id: self.id,
            slot: Mutex::new(PendingSlot {
                state: RequestState::Queued,
                callback: self.callback,
            }),
            resolved: watch::Sender::new(false),
        });
        let execution = Execution {
            pending: Arc::clone(&pending),
            sql: self.sql,
            listeners: self.listeners,
        };
        (pending, execution)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.id)
            .field("sql", &self.sql)
            .field("listeners", &self.listeners.len())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

struct PendingSlot {
    state: RequestState,
    callback: Option<CompletionCallback>,
}

/// The part of a request shared between its connection's pending set and the
/// task driving it. Resolution happens at most once.
pub(crate) struct PendingRequest {
    id: RequestId,
    slot: Mutex<PendingSlot>,
    resolved: watch::Sender<bool>,
}

impl PendingRequest {
    pub(crate) fn id(&self) -> RequestId {
        self.id
    }

    pub(crate) fn state(&self) -> RequestState {
        self.slot.lock().state
    }

    /// Move from `Queued` to `Executing`. Fails if the request was resolved
    /// while it waited.
    pub(crate) fn begin(&self) -> bool {
        let mut slot = self.slot.lock();
        match slot.state {
            RequestState::Queued => {
                slot.state = RequestState::Executing;
                true
            }
            _ => false,
        }
    }

    /// Wait until the request has been resolved, by its own outcome or by
    /// removal from its connection.
    pub(crate) async fn resolved(&self) {
        let mut resolved = self.resolved.subscribe();
        let _ = resolved.wait_for(|done| *done).await;
    }

    /// Resolve the request, invoking the terminal callback if this is the
    /// first resolution. Returns whether it was.
    ///
    /// The callback runs after the lock is released, so it may call back into
    /// the connection.
    pub(crate) fn resolve(&self, outcome: Result<QueryResult>) -> bool {
        let callback = {
            let mut slot = self.slot.lock();
            if !slot.state.is_pending() {
                return false;
            }
            slot.state = RequestState::Resolved;
            slot.callback.take()
        };
        self.resolved.send_replace(true);

        match (&outcome, callback.is_some()) {
            (Err(e), false) => {
                tracing::debug!(request_id = %self.id, error = %e, "request failed without a callback");
            }
            _ => tracing::trace!(request_id = %self.id, ok = outcome.is_ok(), "request resolved"),
        }
        if let Some(callback) = callback {
            callback(outcome);
        }
        true
    }
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Outcome of driving one submission.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// The submission completed and the stream ended cleanly.
    Completed(QueryResult),
    /// The submission failed.
    Failed(Error),
    /// The request was resolved elsewhere while executing.
    Abandoned,
}

/// The execution half of a request, owned by the connection's worker.
pub(crate) struct Execution {
    pending: Arc<PendingRequest>,
    sql: String,
    listeners: Vec<RowListener>,
}

impl Execution {
    pub(crate) fn id(&self) -> RequestId {
        self.pending.id
    }

    pub(crate) fn sql(&self) -> &str {
        &self.sql
    }

    pub(crate) fn pending(&self) -> &Arc<PendingRequest> {
        &self.pending
    }

    /// Drive the submission's events to an outcome.
    ///
    /// Success requires the terminal signal followed by a clean end of the
    /// stream. The first error ends processing, and an error after the
    /// terminal signal still fails the request.
    pub(crate) async fn drive(&mut self, mut events: EventStream) -> Outcome {
        let mut accumulator = RowAccumulator::new();
        let mut done = false;
        let mut delivered = 0usize;

        while let Some(event) = events.next().await {
            if !self.pending.state().is_pending() {
                return Outcome::Abandoned;
            }
            tracing::trace!(kind = event.kind(), "event");

            let step = match event {
                HandleEvent::Error(native) => return Outcome::Failed(Error::Protocol(native)),
                _ if done => Err(Error::ProtocolViolation(format!(
                    "{} event after completion",
                    event.kind()
                ))),
                HandleEvent::Metadata(columns) => {
                    tracing::trace!(columns = columns.len(), "result set");
                    Ok(accumulator.metadata(columns))
                }
                HandleEvent::RowStart => accumulator.row_start(),
                HandleEvent::Column { index, value } => {
                    accumulator.column(index, value).map(|()| None)
                }
                HandleEvent::Done => {
                    done = true;
                    Ok(accumulator.finish())
                }
            };

            match step {
                Ok(Some(row)) => {
                    delivered += 1;
                    for listener in &mut self.listeners {
                        listener(row);
                    }
                }
                Ok(None) => {}
                Err(e) => return Outcome::Failed(e),
            }
        }

        if !done {
            return Outcome::Failed(Error::ProtocolViolation(
                "submission ended without completion".into(),
            ));
        }
        tracing::debug!(rows = delivered, "request completed");
        Outcome::Completed(accumulator.into_result())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use futures_util::stream;
    use msnative_handle::NativeError;
    use msnative_types::{ColumnMetadata, SqlType};

    use super::*;

    fn events(events: Vec<HandleEvent>) -> EventStream {
        Box::pin(stream::iter(events))
    }

    fn scalar_columns() -> HandleEvent {
        HandleEvent::Metadata(vec![ColumnMetadata::new("", SqlType::Integer)])
    }

    fn counting_request(sql: &str, calls: Arc<AtomicUsize>) -> Request {
        Request::new(sql).on_complete(move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = Request::new("SELECT 1");
        let b = Request::new("SELECT 1");
        assert_ne!(a.id(), b.id());
        assert!(a.id() < b.id());
        assert!(a.id().to_string().starts_with("req-"));
    }

    #[test]
    fn test_resolve_fires_callback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (pending, _execution) = counting_request("SELECT 1", Arc::clone(&calls)).into_parts();

        assert!(pending.resolve(Err(Error::ConnectionClosed)));
        assert!(!pending.resolve(Ok(QueryResult::default())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(pending.state(), RequestState::Resolved);
        assert!(!pending.begin());
    }

    #[test]
    fn test_resolve_without_callback() {
        let (pending, _execution) = Request::new("SELECT 1").into_parts();
        assert!(pending.begin());
        assert!(pending.resolve(Err(Error::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_drive_delivers_rows_and_completes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let request = Request::new("SELECT 1+1; SELECT 2+2").on_row(move |row| {
            sink.lock().push(row.get::<i32>(0).unwrap());
        });
        let (_pending, mut execution) = request.into_parts();

        let outcome = execution
            .drive(events(vec![
                scalar_columns(),
                HandleEvent::RowStart,
                HandleEvent::column(0, 2),
                scalar_columns(),
                HandleEvent::RowStart,
                HandleEvent::column(0, 4),
                HandleEvent::Done,
            ]))
            .await;

        assert_eq!(*seen.lock(), vec![2, 4]);
        match outcome {
            Outcome::Completed(result) => {
                assert_eq!(result.row_count(), 2);
                assert_eq!(result.result_sets().len(), 2);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_drive_fails_on_native_error() {
        let (_pending, mut execution) = Request::new("RAISERROR").into_parts();
        let native = NativeError::sql("Custom Error", "42000", 50000).with_severity(18);

        let outcome = execution
            .drive(events(vec![HandleEvent::Error(native.clone()), HandleEvent::Done]))
            .await;
        assert!(matches!(outcome, Outcome::Failed(Error::Protocol(e)) if e == native));
    }

    #[tokio::test]
    async fn test_error_after_done_suppresses_success() {
        let (_pending, mut execution) = Request::new("SELECT 1").into_parts();
        let outcome = execution
            .drive(events(vec![
                scalar_columns(),
                HandleEvent::RowStart,
                HandleEvent::column(0, 1),
                HandleEvent::Done,
                HandleEvent::Error(NativeError::Driver("late failure".into())),
            ]))
            .await;
        assert!(matches!(outcome, Outcome::Failed(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_stream_without_done_is_violation() {
        let (_pending, mut execution) = Request::new("SELECT 1").into_parts();
        let outcome = execution
            .drive(events(vec![scalar_columns(), HandleEvent::RowStart]))
            .await;
        assert!(matches!(outcome, Outcome::Failed(Error::ProtocolViolation(_))));
    }

    #[tokio::test]
    async fn test_resolved_request_is_abandoned() {
        let (pending, mut execution) = Request::new("SELECT 1").into_parts();
        pending.resolve(Err(Error::ConnectionClosed));

        let outcome = execution
            .drive(events(vec![scalar_columns(), HandleEvent::Done]))
            .await;
        assert!(matches!(outcome, Outcome::Abandoned));
    }
}
