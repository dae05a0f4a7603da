//! The connection: one native handle, its pending requests, and its
//! liveness heartbeat.
//!
//! A connection owns its native handle exclusively. Requests are queued on a
//! per-connection worker task and run one at a time in submission order; the
//! worker is the only place a submission's event stream is consumed.
//!
//! Lifecycle notifications are broadcast as [`ConnectionEvent`]s. Subscribe
//! before calling [`Connection::open`] to observe the `Connect` event.
//!
//! Any request failure tears the connection down by default: the native
//! session state is undefined after a mid-stream error. See
//! [`ErrorPolicy`](crate::ErrorPolicy) for the opt-in relaxation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use msnative_handle::{NativeDriver, NativeError, NativeHandle};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

use crate::config::Config;
use crate::detect;
use crate::error::{Error, Result};
use crate::request::{Execution, Outcome, PendingRequest, Request, RequestId};
use crate::row::QueryResult;
use crate::state::ConnectionState;
use crate::stream::QueryStream;
use crate::transaction::{TransactionKind, TransactionStatement};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Capacity of the lifecycle event channel.
const EVENT_CAPACITY: usize = 32;

/// Process-unique identity of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw identifier.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle notifications of a connection.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The open attempt resolved. Fires exactly once per connection.
    Connect(Option<Error>),
    /// The heartbeat found the handle unusable.
    Error(Error),
    /// The connection closed, carrying any close-time error.
    End(Option<Error>),
}

/// A client connection through a native driver.
///
/// `Connection` is a cheap handle; clones refer to the same connection.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

struct Inner {
    id: ConnectionId,
    config: Config,
    driver: Arc<dyn NativeDriver>,
    shared: Mutex<Shared>,
    events: broadcast::Sender<ConnectionEvent>,
    closing: watch::Sender<bool>,
}

#[derive(Default)]
struct Shared {
    state: ConnectionState,
    open_started: bool,
    handle: Option<Arc<dyn NativeHandle>>,
    pending: BTreeMap<RequestId, Arc<PendingRequest>>,
    queue: Option<mpsc::UnboundedSender<Execution>>,
    heartbeat: Option<JoinHandle<()>>,
}

impl Inner {
    fn emit(&self, event: ConnectionEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(heartbeat) = self.shared.get_mut().heartbeat.take() {
            heartbeat.abort();
        }
    }
}

impl Connection {
    /// Create a connection in the `Connecting` state.
    ///
    /// Nothing is opened until [`open`](Self::open) is called.
    pub fn new(config: Config, driver: Arc<dyn NativeDriver>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (closing, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                id: ConnectionId::next(),
                config,
                driver,
                shared: Mutex::new(Shared::default()),
                events,
                closing,
            }),
        }
    }

    /// Create a connection and open it.
    pub async fn connect(config: Config, driver: Arc<dyn NativeDriver>) -> Result<Self> {
        let connection = Self::new(config, driver);
        connection.open().await?;
        Ok(connection)
    }

    /// Subscribe to lifecycle notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe()
    }

    /// Open the native handle.
    ///
    /// Synthesizes the connection string, detects a driver if none is named,
    /// opens the handle, and starts the heartbeat. Emits
    /// [`ConnectionEvent::Connect`] exactly once, on success and on failure.
    /// A second call returns [`Error::InvalidState`] without emitting.
    pub async fn open(&self) -> Result<()> {
        {
            let mut shared = self.inner.shared.lock();
            if shared.open_started {
                return Err(Error::InvalidState(format!(
                    "open() called on a {} connection",
                    shared.state
                )));
            }
            shared.open_started = true;
        }

        let connection_id = self.id();
        tracing::debug!(%connection_id, "opening connection");

        match self.establish().await {
            Ok(handle) => {
                let (queue, jobs) = mpsc::unbounded_channel();
                {
                    let mut shared = self.inner.shared.lock();
                    shared.state = ConnectionState::Open;
                    shared.handle = Some(Arc::from(handle));
                    shared.queue = Some(queue);
                    shared.heartbeat = self.spawn_heartbeat();
                }
                self.spawn_worker(jobs);
                tracing::info!(%connection_id, "connection open");
                self.inner.emit(ConnectionEvent::Connect(None));
                Ok(())
            }
            Err(e) => {
                self.inner.shared.lock().state = ConnectionState::Failed;
                tracing::warn!(%connection_id, error = %e, "connection failed");
                self.inner.emit(ConnectionEvent::Connect(Some(e.clone())));
                Err(e)
            }
        }
    }

    async fn establish(&self) -> Result<Box<dyn NativeHandle>> {
        let mut connection_string = self.inner.config.build_connection_string()?;
        if !detect::has_driver_keyword(&connection_string) {
            let driver = detect::detect_driver(self.inner.driver.as_ref()).await?;
            connection_string = detect::with_driver(driver, &connection_string);
        }
        self.inner
            .driver
            .open(&connection_string)
            .await
            .map_err(Error::Connection)
    }

    /// Start the liveness heartbeat. A zero interval disables it.
    fn spawn_heartbeat(&self) -> Option<JoinHandle<()>> {
        let period = self.inner.config.heartbeat_interval;
        if period.is_zero() {
            return None;
        }
        let weak = Arc::downgrade(&self.inner);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                let connection = Connection { inner };
                if !connection.heartbeat() {
                    break;
                }
            }
        }))
    }

    /// Probe the handle once. Returns whether the heartbeat should continue.
    fn heartbeat(&self) -> bool {
        let handle = self.inner.shared.lock().handle.clone();
        let Some(handle) = handle else {
            return false;
        };

        match handle.probe() {
            Ok(()) => {
                tracing::trace!(connection_id = %self.id(), "heartbeat");
                true
            }
            Err(e) if e.is_handle_closed() => {
                tracing::warn!(connection_id = %self.id(), "heartbeat found the connection closed");
                self.inner.emit(ConnectionEvent::Error(Error::ConnectionReset));
                self.close();
                false
            }
            Err(e) => {
                tracing::debug!(connection_id = %self.id(), error = %e, "heartbeat probe failed");
                true
            }
        }
    }

    fn spawn_worker(&self, mut jobs: mpsc::UnboundedReceiver<Execution>) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let mut closing = self.inner.closing.subscribe();
        tokio::spawn(async move {
            while let Some(mut execution) = jobs.recv().await {
                let Some(inner) = weak.upgrade() else { break };
                let connection = Connection { inner };
                let span = tracing::info_span!(
                    "request",
                    connection_id = %connection.id(),
                    request_id = %execution.id(),
                );
                connection
                    .run(&mut execution, &mut closing)
                    .instrument(span)
                    .await;
            }
        });
    }

    /// Run one queued request to its terminal callback.
    async fn run(&self, execution: &mut Execution, closing: &mut watch::Receiver<bool>) {
        if !execution.pending().begin() {
            tracing::trace!("request resolved before submission");
            return;
        }

        let handle = self.inner.shared.lock().handle.clone();
        let Some(handle) = handle else {
            self.remove_request(execution.id(), Some(Error::ConnectionClosed));
            return;
        };

        tracing::debug!(sql = execution.sql(), "submitting");
        let events = match handle.submit(execution.sql()) {
            Ok(events) => events,
            Err(e) => {
                self.fail_submission(execution.pending(), e);
                return;
            }
        };

        let pending = Arc::clone(execution.pending());
        let outcome = tokio::select! {
            outcome = execution.drive(events) => outcome,
            () = pending.resolved() => Outcome::Abandoned,
            () = closed(closing) => Outcome::Abandoned,
        };

        match outcome {
            Outcome::Completed(result) => {
                self.inner.shared.lock().pending.remove(&execution.id());
                execution.pending().resolve(Ok(result));
            }
            Outcome::Failed(e) => self.fail_request(execution.pending(), e),
            Outcome::Abandoned => tracing::trace!("request abandoned"),
        }
    }

    /// Deregister a failed request, deliver its error, and close the
    /// connection unless the error policy keeps it.
    fn fail_request(&self, pending: &PendingRequest, error: Error) {
        let close = self.inner.config.error_policy.should_close(&error);
        tracing::warn!(
            connection_id = %self.id(),
            request_id = %pending.id(),
            error = %error,
            close,
            "request failed"
        );
        self.inner.shared.lock().pending.remove(&pending.id());
        pending.resolve(Err(error));
        if close {
            self.close();
        }
    }

    /// Fail a request whose submission was refused by the handle. The
    /// connection closes regardless of the error policy; a handle that
    /// reports itself closed is also announced as a reset.
    fn fail_submission(&self, pending: &PendingRequest, error: NativeError) {
        tracing::warn!(
            connection_id = %self.id(),
            request_id = %pending.id(),
            error = %error,
            "submission failed"
        );
        if error.is_handle_closed() {
            self.inner.emit(ConnectionEvent::Error(Error::ConnectionReset));
        }
        self.inner.shared.lock().pending.remove(&pending.id());
        pending.resolve(Err(Error::Protocol(error)));
        self.close();
    }

    /// Execute a request.
    ///
    /// The request is registered as pending and queued behind any request
    /// already running on this connection. A request executed on a
    /// connection that is not open fails immediately through its callback.
    pub fn execute(&self, request: Request) -> RequestId {
        let (pending, execution) = request.into_parts();
        let id = pending.id();

        let rejection = {
            let mut guard = self.inner.shared.lock();
            let shared = &mut *guard;
            match shared.state {
                ConnectionState::Open => match &shared.queue {
                    Some(queue) => {
                        shared.pending.insert(id, Arc::clone(&pending));
                        if queue.send(execution).is_ok() {
                            None
                        } else {
                            shared.pending.remove(&id);
                            Some(Error::ConnectionClosed)
                        }
                    }
                    None => Some(Error::ConnectionClosed),
                },
                ConnectionState::Connecting => Some(Error::InvalidState(
                    "connection is not open yet".into(),
                )),
                ConnectionState::Failed | ConnectionState::Closed => Some(Error::ConnectionClosed),
            }
        };

        match rejection {
            Some(e) => {
                tracing::debug!(connection_id = %self.id(), request_id = %id, error = %e, "request rejected");
                pending.resolve(Err(e));
            }
            None => tracing::trace!(connection_id = %self.id(), request_id = %id, "request queued"),
        }
        id
    }

    /// Execute SQL and wait for the aggregated result.
    pub async fn execute_batch(&self, sql: impl Into<String>) -> Result<QueryResult> {
        let (tx, rx) = oneshot::channel();
        self.execute(Request::new(sql).on_complete(move |result| {
            let _ = tx.send(result);
        }));
        rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Execute SQL and stream its rows as they complete.
    ///
    /// The stream ends when the request resolves; call
    /// [`QueryStream::finish`] to learn whether it succeeded.
    pub fn query(&self, sql: impl Into<String>) -> QueryStream {
        let (rows_tx, rows_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = oneshot::channel();
        let request = Request::new(sql)
            .on_row(move |row| {
                let _ = rows_tx.send(row.clone());
            })
            .on_complete(move |result| {
                let _ = done_tx.send(result);
            });
        let id = self.execute(request);
        QueryStream::new(id, rows_rx, done_rx)
    }

    /// Remove a request from the pending set.
    ///
    /// When `error` is given, the request's callback is invoked with it as
    /// part of the removal. Returns whether the request was pending.
    pub fn remove_request(&self, id: RequestId, error: Option<Error>) -> bool {
        let removed = self.inner.shared.lock().pending.remove(&id);
        let Some(pending) = removed else {
            return false;
        };
        if let Some(error) = error {
            pending.resolve(Err(error));
        }
        true
    }

    /// Close the connection.
    ///
    /// The handle is released immediately, so [`closed`](Self::closed) is
    /// true once this returns; the native close completes in the background
    /// and is reported by [`ConnectionEvent::End`]. Every pending request is
    /// failed with [`Error::ConnectionClosed`]. Closing a connection without
    /// a handle emits `End` carrying [`Error::AlreadyClosed`].
    pub fn close(&self) {
        let Some(handle) = self.begin_close() else {
            tracing::debug!(connection_id = %self.id(), "close on a connection without a handle");
            self.inner.emit(ConnectionEvent::End(Some(Error::AlreadyClosed)));
            return;
        };

        let id = self.id();
        let events = self.inner.events.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    let _ = finish_close(id, &events, handle).await;
                });
            }
            Err(_) => {
                tracing::warn!(connection_id = %id, "no runtime to close the native handle; dropping it");
                let _ = events.send(ConnectionEvent::End(None));
            }
        }
    }

    /// Close the connection and wait for the native handle to close.
    ///
    /// Returns [`Error::AlreadyClosed`] if there was no handle to close.
    pub async fn shutdown(&self) -> Result<()> {
        match self.begin_close() {
            Some(handle) => finish_close(self.id(), &self.inner.events, handle).await,
            None => {
                self.inner.emit(ConnectionEvent::End(Some(Error::AlreadyClosed)));
                Err(Error::AlreadyClosed)
            }
        }
    }

    /// Release the handle and fail out pending requests.
    fn begin_close(&self) -> Option<Arc<dyn NativeHandle>> {
        let (handle, heartbeat, ids) = {
            let mut shared = self.inner.shared.lock();
            let handle = shared.handle.take()?;
            shared.state = ConnectionState::Closed;
            shared.queue = None;
            let ids: Vec<RequestId> = shared.pending.keys().copied().collect();
            (handle, shared.heartbeat.take(), ids)
        };

        tracing::info!(connection_id = %self.id(), pending = ids.len(), "closing connection");
        self.inner.closing.send_replace(true);
        if let Some(heartbeat) = heartbeat {
            heartbeat.abort();
        }
        for id in ids {
            self.remove_request(id, Some(Error::ConnectionClosed));
        }
        Some(handle)
    }

    /// Start a transaction. An empty name starts an unnamed transaction.
    pub async fn begin_transaction(&self, name: &str) -> Result<()> {
        self.transaction(TransactionKind::Begin, name).await
    }

    /// Commit a transaction.
    pub async fn commit_transaction(&self, name: &str) -> Result<()> {
        self.transaction(TransactionKind::Commit, name).await
    }

    /// Roll back a transaction, or to a savepoint when `name` names one.
    pub async fn rollback_transaction(&self, name: &str) -> Result<()> {
        self.transaction(TransactionKind::Rollback, name).await
    }

    /// Create a savepoint within the current transaction.
    pub async fn save_transaction(&self, name: &str) -> Result<()> {
        self.transaction(TransactionKind::Save, name).await
    }

    async fn transaction(&self, kind: TransactionKind, name: &str) -> Result<()> {
        let statement = TransactionStatement::new(kind, name)?;
        tracing::debug!(connection_id = %self.id(), %statement, "transaction statement");
        self.execute_batch(statement.to_sql()).await.map(|_| ())
    }

    /// The connection's identity.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// The configuration this connection was created with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().state
    }

    /// True when there is no handle or the handle reports itself closed.
    #[must_use]
    pub fn closed(&self) -> bool {
        self.inner
            .shared
            .lock()
            .handle
            .as_ref()
            .is_none_or(|handle| handle.is_closed())
    }

    /// True when a handle exists and does not report itself closed.
    #[must_use]
    pub fn logged_in(&self) -> bool {
        !self.closed()
    }

    /// Number of requests registered and not yet resolved.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.inner.shared.lock().pending.len()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("state", &shared.state)
            .field("pending", &shared.pending.len())
            .finish()
    }
}

async fn closed(closing: &mut watch::Receiver<bool>) {
    let _ = closing.wait_for(|closed| *closed).await;
}

async fn finish_close(
    id: ConnectionId,
    events: &broadcast::Sender<ConnectionEvent>,
    handle: Arc<dyn NativeHandle>,
) -> Result<()> {
    let result = handle.close().await.map_err(Error::Close);
    match &result {
        Ok(()) => tracing::info!(connection_id = %id, "connection closed"),
        Err(e) => tracing::warn!(connection_id = %id, error = %e, "native close failed"),
    }
    let _ = events.send(ConnectionEvent::End(result.as_ref().err().cloned()));
    result
}
