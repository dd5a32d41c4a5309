//! Test utilities for rhailambda
//!
//! Provides a mock Runtime API that runs in-process on a random port:
//! - Queue invocations served by `invocation/next`
//! - Inspect posted responses and error reports
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rhailambda_test::{MockInvocation, MockRuntimeApi};
//!
//! #[tokio::test]
//! async fn test_runtime() {
//!     let api = MockRuntimeApi::start([MockInvocation::new("req-1", "{}")])
//!         .await
//!         .unwrap();
//!
//!     // Point AWS_LAMBDA_RUNTIME_API at the mock
//!     println!("Runtime API at: {}", api.endpoint());
//!
//!     assert!(api.responses().is_empty());
//! }
//! ```

pub mod server;

pub use axum::http::StatusCode;
pub use server::{MockInvocation, MockRuntimeApi, MockRuntimeApiBuilder, PostedError, PostedResponse};
