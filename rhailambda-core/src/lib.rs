//! Core types for rhailambda
//!
//! The data model shared by the runtime loop and the `bootstrap` binary.

pub mod error;
pub mod handler;
pub mod invocation;

pub use error::BootstrapError;
pub use handler::{HandlerSpec, HandlerSpecError};
pub use invocation::{Context, ErrorReport, InvocationResult, Payload, REQUEST_ID_HEADER};
