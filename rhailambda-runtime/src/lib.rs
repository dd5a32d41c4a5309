//! Custom Lambda runtime executing rhai handlers
//!
//! Pulls invocations from the Runtime API, runs the configured handler against
//! each one and posts the result back.

pub mod bridge;
pub mod client;
pub mod config;
pub mod parser;
pub mod runtime;

pub use bridge::{BridgeError, Handler, HandlerError, RhaiHandler};
pub use client::{ClientError, RuntimeApiClient};
pub use config::{ConfigError, ConfigSource, RuntimeConfig};
pub use runtime::{Runtime, StepOutcome};
