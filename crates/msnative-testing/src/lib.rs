//! # msnative-testing
//!
//! Test infrastructure for msnative driver development.
//!
//! This crate provides a scripted in-memory native driver, so connection and
//! request behavior can be tested without an ODBC driver or a SQL Server
//! instance.
//!
//! ## Features
//!
//! - Canned responses keyed by SQL text, with a default for unmatched SQL
//! - Custom handlers for stateful scenarios such as transactions
//! - Installed driver names for driver detection
//! - Fault injection: killed handles, failing submissions, failing opens
//! - Submission recording
//!
//! ## Example
//!
//! ```rust,ignore
//! use msnative_testing::{MockDriver, MockResponse};
//! use msnative_types::SqlValue;
//!
//! #[tokio::test]
//! async fn test_with_mock_driver() {
//!     let driver = MockDriver::builder()
//!         .with_response("SELECT 1+1", MockResponse::scalar(SqlValue::Int(2)))
//!         .build();
//!
//!     // Hand Arc::new(driver.clone()) to a connection
//!     // ...
//!     assert_eq!(driver.submitted(), vec!["SELECT 1+1"]);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod mock_driver;

pub use mock_driver::{MockDriver, MockDriverBuilder, MockHandle, MockResponse};
