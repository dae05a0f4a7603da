//! Connection lifecycle tests against the mock native driver.
//!
//! Covers opening (including driver detection), lifecycle notifications,
//! closing, heartbeat reset detection, and teardown of pending requests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use msnative_client::{
    Config, Connection, ConnectionEvent, ConnectionState, Error, NativeError, Request,
};
use msnative_testing::{MockDriver, MockResponse};
use tokio::sync::{broadcast, oneshot};

// =============================================================================
// Helpers
// =============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

fn config() -> Config {
    Config::new()
        .instance_name("SQLEXPRESS")
        .credentials("sa", "secret")
        .driver("SQL Server Native Client 11.0")
}

fn connection(driver: &MockDriver, config: Config) -> Connection {
    Connection::new(config, Arc::new(driver.clone()))
}

async fn next_event(events: &mut broadcast::Receiver<ConnectionEvent>) -> ConnectionEvent {
    tokio::time::timeout(Duration::from_secs(600), events.recv())
        .await
        .expect("timed out waiting for a connection event")
        .expect("event channel closed")
}

fn capture(request: Request) -> (Request, oneshot::Receiver<msnative_client::Result<usize>>) {
    let (tx, rx) = oneshot::channel();
    let request = request.on_complete(move |result| {
        let _ = tx.send(result.map(|r| r.row_count()));
    });
    (request, rx)
}

// =============================================================================
// Opening
// =============================================================================

#[tokio::test]
async fn test_open_emits_connect_once() {
    init_tracing();
    let driver = MockDriver::builder().build();
    let conn = connection(&driver, config());
    let mut events = conn.subscribe();

    assert_eq!(conn.state(), ConnectionState::Connecting);
    assert!(conn.closed());

    tokio_test::assert_ok!(conn.open().await);
    assert!(matches!(next_event(&mut events).await, ConnectionEvent::Connect(None)));
    assert_eq!(conn.state(), ConnectionState::Open);
    assert!(conn.logged_in());
    assert!(!conn.closed());

    let second = conn.open().await;
    assert!(matches!(second, Err(Error::InvalidState(_))));
    assert!(events.try_recv().is_err());

    assert_eq!(
        driver.opened(),
        vec!["Driver={SQL Server Native Client 11.0};Server=localhost\\SQLEXPRESS;Uid=sa;Pwd=secret;"]
    );
}

#[tokio::test]
async fn test_open_detects_driver() {
    let driver = MockDriver::builder()
        .with_installed_drivers(["SQL Native Client", "SQL Server"])
        .build();
    let conn = connection(
        &driver,
        Config::new()
            .instance_name("SQLEXPRESS")
            .database("app")
            .trusted_connection(true),
    );

    conn.open().await.unwrap();

    let opened = driver.opened();
    assert_eq!(
        opened,
        vec![
            "Driver=SQL Server Native Client 12.0;",
            "Driver=SQL Server Native Client 11.0;",
            "Driver=SQL Server Native Client 10.0;",
            "Driver=SQL Native Client;",
            "Driver={SQL Native Client};Server=localhost\\SQLEXPRESS;Database=app;Trusted_Connection=yes;",
        ]
    );
}

#[tokio::test]
async fn test_explicit_connection_string_skips_detection() {
    let driver = MockDriver::builder().build();
    let conn = connection(
        &driver,
        Config::new().connection_string("Server=db1;DRIVER={SQL Server Native Client 11.0};"),
    );

    conn.open().await.unwrap();
    assert_eq!(
        driver.opened(),
        vec!["Server=db1;DRIVER={SQL Server Native Client 11.0};"]
    );
}

#[tokio::test]
async fn test_no_driver_detected() {
    let driver = MockDriver::builder()
        .with_installed_drivers(Vec::<String>::new())
        .build();
    let conn = connection(&driver, Config::new().instance_name("SQLEXPRESS"));
    let mut events = conn.subscribe();

    let result = conn.open().await;
    assert!(matches!(result, Err(Error::NoDriverDetected)));
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connect(Some(Error::NoDriverDetected))
    ));
    assert_eq!(conn.state(), ConnectionState::Failed);
    assert_eq!(driver.opened().len(), 5);
}

#[tokio::test]
async fn test_missing_instance_name_fails_open() {
    let driver = MockDriver::builder().build();
    let conn = connection(&driver, Config::new());
    let mut events = conn.subscribe();

    let err = conn.open().await.unwrap_err();
    assert!(err.is_configuration_error());
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connect(Some(Error::Config(_)))
    ));
    assert!(driver.opened().is_empty());
}

#[tokio::test]
async fn test_native_open_failure() {
    let driver = MockDriver::builder()
        .with_open_error(NativeError::sql("Login failed for user 'sa'.", "28000", 18456))
        .build();
    let conn = connection(&driver, config());

    let err = conn.open().await.unwrap_err();
    assert!(matches!(&err, Error::Connection(native) if native.message().contains("Login failed")));
    assert_eq!(conn.state(), ConnectionState::Failed);
    assert!(matches!(
        conn.execute_batch("SELECT 1").await,
        Err(Error::ConnectionClosed)
    ));
}

#[tokio::test]
async fn test_execute_before_open_is_rejected() {
    let driver = MockDriver::builder().build();
    let conn = connection(&driver, config());

    let result = conn.execute_batch("SELECT 1").await;
    assert!(matches!(result, Err(Error::InvalidState(_))));
    assert!(driver.submitted().is_empty());
}

// =============================================================================
// Closing
// =============================================================================

#[tokio::test]
async fn test_close_reports_end_and_already_closed() {
    let driver = MockDriver::builder().build();
    let conn = Connection::connect(config(), Arc::new(driver.clone()))
        .await
        .unwrap();
    let mut events = conn.subscribe();

    conn.close();
    assert!(conn.closed());
    assert!(!conn.logged_in());
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(matches!(next_event(&mut events).await, ConnectionEvent::End(None)));
    assert_eq!(driver.live_handles(), 0);

    conn.close();
    match next_event(&mut events).await {
        ConnectionEvent::End(Some(err)) => {
            assert!(matches!(err, Error::AlreadyClosed));
            assert_eq!(err.to_string(), "connection already closed");
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_shutdown_waits_for_native_close() {
    let driver = MockDriver::builder().build();
    let conn = Connection::connect(config(), Arc::new(driver.clone()))
        .await
        .unwrap();

    tokio_test::assert_ok!(conn.shutdown().await);
    assert_eq!(driver.live_handles(), 0);
    assert!(matches!(conn.shutdown().await, Err(Error::AlreadyClosed)));
}

#[tokio::test]
async fn test_close_error_is_reported_in_end() {
    let driver = MockDriver::builder()
        .with_close_error(NativeError::Driver("close failed".into()))
        .build();
    let conn = Connection::connect(config(), Arc::new(driver.clone()))
        .await
        .unwrap();
    let mut events = conn.subscribe();

    conn.close();
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::End(Some(Error::Close(_)))
    ));
}

#[tokio::test]
async fn test_close_fails_out_pending_requests() {
    let driver = MockDriver::builder()
        .with_default_response(MockResponse::Hang)
        .build();
    let conn = Connection::connect(config(), Arc::new(driver.clone()))
        .await
        .unwrap();

    let (running, running_rx) = capture(Request::new("WAITFOR DELAY '01:00:00'"));
    let (queued, queued_rx) = capture(Request::new("SELECT 1"));
    conn.execute(running);
    conn.execute(queued);
    while driver.submitted().is_empty() {
        tokio::task::yield_now().await;
    }
    assert_eq!(conn.pending_requests(), 2);

    conn.close();
    assert_eq!(conn.pending_requests(), 0);
    assert!(matches!(running_rx.await.unwrap(), Err(Error::ConnectionClosed)));
    assert!(matches!(queued_rx.await.unwrap(), Err(Error::ConnectionClosed)));
    assert_eq!(driver.submitted(), vec!["WAITFOR DELAY '01:00:00'"]);
}

#[tokio::test]
async fn test_remove_request_delivers_error() {
    let driver = MockDriver::builder()
        .with_default_response(MockResponse::Hang)
        .build();
    let conn = Connection::connect(config(), Arc::new(driver.clone()))
        .await
        .unwrap();

    let (request, rx) = capture(Request::new("WAITFOR DELAY '01:00:00'"));
    let id = conn.execute(request);

    assert!(conn.remove_request(id, Some(Error::ConnectionReset)));
    assert!(!conn.remove_request(id, Some(Error::ConnectionReset)));
    assert!(matches!(rx.await.unwrap(), Err(Error::ConnectionReset)));
    assert_eq!(conn.pending_requests(), 0);
}

#[tokio::test]
async fn test_removing_running_request_frees_the_queue() {
    let driver = MockDriver::builder()
        .with_response("SELECT 1", MockResponse::scalar(1))
        .with_default_response(MockResponse::Hang)
        .build();
    let conn = Connection::connect(config(), Arc::new(driver.clone()))
        .await
        .unwrap();

    let (request, rx) = capture(Request::new("WAITFOR DELAY '01:00:00'"));
    let id = conn.execute(request);
    while driver.submitted().is_empty() {
        tokio::task::yield_now().await;
    }

    assert!(conn.remove_request(id, Some(Error::ConnectionReset)));
    assert!(matches!(rx.await.unwrap(), Err(Error::ConnectionReset)));

    let result = tokio::time::timeout(Duration::from_secs(5), conn.execute_batch("SELECT 1"))
        .await
        .expect("queued request stalled behind a removed request")
        .unwrap();
    assert_eq!(result.first_row().unwrap().get::<i32>(0).unwrap(), 1);
    assert!(conn.logged_in());
    assert_eq!(
        driver.submitted(),
        vec!["WAITFOR DELAY '01:00:00'", "SELECT 1"]
    );
}

// =============================================================================
// Heartbeat
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_heartbeat_detects_dropped_handle() {
    let driver = MockDriver::builder().build();
    let conn = connection(&driver, config());
    let mut events = conn.subscribe();
    conn.open().await.unwrap();
    assert!(matches!(next_event(&mut events).await, ConnectionEvent::Connect(None)));

    driver.kill();

    match next_event(&mut events).await {
        ConnectionEvent::Error(err) => {
            assert_eq!(err.code(), Some("ECONNRESET"));
            assert_eq!(err.to_string(), "connection was closed unexpectedly");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(matches!(next_event(&mut events).await, ConnectionEvent::End(None)));
    assert_eq!(conn.state(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_interval_is_configurable() {
    let driver = MockDriver::builder().build();
    let conn = connection(&driver, config().heartbeat_interval(Duration::from_secs(60)));
    let mut events = conn.subscribe();
    conn.open().await.unwrap();
    next_event(&mut events).await;

    driver.kill();
    let started = tokio::time::Instant::now();
    assert!(matches!(next_event(&mut events).await, ConnectionEvent::Error(_)));
    assert!(started.elapsed() >= Duration::from_secs(59));
}

#[tokio::test(start_paused = true)]
async fn test_healthy_heartbeat_keeps_connection_open() {
    let driver = MockDriver::builder().build();
    let conn = Connection::connect(config(), Arc::new(driver.clone()))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(conn.logged_in());
    assert_eq!(conn.state(), ConnectionState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_zero_interval_disables_heartbeat() {
    let driver = MockDriver::builder().build();
    let conn = Connection::connect(
        config().heartbeat_interval(Duration::ZERO),
        Arc::new(driver.clone()),
    )
    .await
    .unwrap();

    driver.kill();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(conn.closed());
    assert_eq!(conn.state(), ConnectionState::Open);
}
