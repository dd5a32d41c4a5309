//! Command line and environment configuration

use clap::Parser;
use std::path::PathBuf;

use rhailambda_runtime::config::{ENDPOINT_VAR, HANDLER_VAR, TASK_ROOT_VAR};
use rhailambda_runtime::ConfigSource;

/// Required values are optional here so that each missing one maps to its own
/// exit code rather than to a usage error.
#[derive(Parser, Debug)]
#[command(name = "bootstrap")]
#[command(about = "Lambda custom runtime for rhai handlers", long_about = None)]
pub struct Args {
    /// Runtime API host:port
    #[arg(long, env = ENDPOINT_VAR)]
    pub endpoint: Option<String>,

    /// Handler as module.function
    #[arg(long, env = HANDLER_VAR)]
    pub handler: Option<String>,

    /// Directory holding the handler module
    #[arg(long, env = TASK_ROOT_VAR)]
    pub task_root: Option<PathBuf>,

    /// Report handler errors to the Runtime API instead of dropping them
    #[arg(long, env = "RHAILAMBDA_REPORT_ERRORS")]
    pub report_errors: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RHAILAMBDA_LOG_LEVEL")]
    pub log_level: String,
}

impl Args {
    pub fn into_source(self) -> ConfigSource {
        ConfigSource {
            endpoint: self.endpoint,
            handler: self.handler,
            task_root: self.task_root,
            report_errors: self.report_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = Args::try_parse_from([
            "bootstrap",
            "--endpoint",
            "127.0.0.1:9001",
            "--handler",
            "handler.process",
            "--task-root",
            "/var/task",
            "--report-errors",
        ])
        .unwrap();

        let source = args.into_source();
        assert_eq!(source.endpoint.as_deref(), Some("127.0.0.1:9001"));
        assert_eq!(source.handler.as_deref(), Some("handler.process"));
        assert_eq!(source.task_root, Some(PathBuf::from("/var/task")));
        assert!(source.report_errors);
    }

    #[test]
    fn test_env_names_match_runtime_config() {
        use clap::CommandFactory;
        let command = Args::command();
        let env_of = |id: &str| {
            command
                .get_arguments()
                .find(|arg| arg.get_id() == id)
                .and_then(|arg| arg.get_env())
                .and_then(|env| env.to_str())
                .map(str::to_owned)
        };
        assert_eq!(env_of("endpoint").as_deref(), Some("AWS_LAMBDA_RUNTIME_API"));
        assert_eq!(env_of("handler").as_deref(), Some("_HANDLER"));
        assert_eq!(env_of("task_root").as_deref(), Some("LAMBDA_TASK_ROOT"));
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
