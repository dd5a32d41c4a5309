//! rhailambda - Lambda custom runtime for rhai handlers
//!
//! Installed as `bootstrap` in a `provided` runtime. Reads its configuration
//! from the environment Lambda sets up, then serves invocations until a fatal
//! error ends the process with that error's exit code.

mod config;
mod logging;

use clap::Parser;
use std::process::ExitCode;

use config::Args;
use rhailambda_core::BootstrapError;
use rhailambda_runtime::{Runtime, RuntimeConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(err) = logging::init(&args.log_level) {
        eprintln!("failed to initialize logging: {err:#}");
    }

    let err = serve(args).await;
    eprintln!("{}", err.message());
    ExitCode::from(err.exit_code())
}

/// Only returns once something fatal happened
async fn serve(args: Args) -> BootstrapError {
    let config = match RuntimeConfig::resolve(args.into_source()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "Invalid runtime configuration");
            return err.into();
        }
    };

    match Runtime::bootstrap(config) {
        Ok(runtime) => runtime.run().await,
        Err(err) => err,
    }
}
