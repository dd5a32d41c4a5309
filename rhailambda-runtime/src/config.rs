//! Runtime configuration
//!
//! Resolved once at startup and immutable afterwards.

use std::path::PathBuf;
use thiserror::Error;

use rhailambda_core::{BootstrapError, HandlerSpec, HandlerSpecError};

pub const ENDPOINT_VAR: &str = "AWS_LAMBDA_RUNTIME_API";
pub const HANDLER_VAR: &str = "_HANDLER";
pub const TASK_ROOT_VAR: &str = "LAMBDA_TASK_ROOT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{} is not set", ENDPOINT_VAR)]
    EndpointMissing,

    #[error("{} is not set", HANDLER_VAR)]
    HandlerMissing,

    #[error("{} is not set", TASK_ROOT_VAR)]
    RootMissing,

    #[error(transparent)]
    InvalidHandler(#[from] HandlerSpecError),
}

impl From<ConfigError> for BootstrapError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::EndpointMissing => BootstrapError::EndpointMissing,
            ConfigError::HandlerMissing | ConfigError::InvalidHandler(_) => {
                BootstrapError::HandlerMissing
            }
            ConfigError::RootMissing => BootstrapError::RootMissing,
        }
    }
}

/// Raw settings as read from the environment or the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    pub endpoint: Option<String>,
    pub handler: Option<String>,
    pub task_root: Option<PathBuf>,
    pub report_errors: bool,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Control plane `host:port`
    pub endpoint: String,
    pub handler: HandlerSpec,
    pub task_root: PathBuf,
    /// Report handler runtime errors to `invocation/{id}/error`
    pub report_errors: bool,
}

impl RuntimeConfig {
    /// Validate raw settings, checked in endpoint, handler, task root order
    ///
    /// Empty values count as missing.
    pub fn resolve(source: ConfigSource) -> Result<Self, ConfigError> {
        let endpoint = non_empty(source.endpoint).ok_or(ConfigError::EndpointMissing)?;
        let handler = non_empty(source.handler).ok_or(ConfigError::HandlerMissing)?;
        let task_root = source
            .task_root
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigError::RootMissing)?;

        Ok(Self {
            endpoint,
            handler: HandlerSpec::parse(&handler)?,
            task_root,
            report_errors: source.report_errors,
        })
    }

    /// Where the handler module is loaded from
    pub fn module_path(&self) -> PathBuf {
        self.handler.module_path(&self.task_root)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> ConfigSource {
        ConfigSource {
            endpoint: Some("127.0.0.1:9001".to_string()),
            handler: Some("handler.process".to_string()),
            task_root: Some(PathBuf::from("/var/task")),
            report_errors: false,
        }
    }

    #[test]
    fn test_resolve() {
        let config = RuntimeConfig::resolve(source()).unwrap();
        assert_eq!(config.endpoint, "127.0.0.1:9001");
        assert_eq!(config.handler.function, "process");
        assert_eq!(config.module_path(), PathBuf::from("/var/task/handler.rhai"));
    }

    #[test]
    fn test_missing_values_map_to_their_codes() {
        let cases = [
            (
                ConfigSource {
                    endpoint: None,
                    ..source()
                },
                BootstrapError::EndpointMissing,
            ),
            (
                ConfigSource {
                    handler: Some(String::new()),
                    ..source()
                },
                BootstrapError::HandlerMissing,
            ),
            (
                ConfigSource {
                    task_root: None,
                    ..source()
                },
                BootstrapError::RootMissing,
            ),
        ];

        for (source, expected) in cases {
            let err = RuntimeConfig::resolve(source).unwrap_err();
            assert_eq!(BootstrapError::from(err), expected);
        }
    }

    #[test]
    fn test_endpoint_checked_first() {
        let err = RuntimeConfig::resolve(ConfigSource::default()).unwrap_err();
        assert!(matches!(err, ConfigError::EndpointMissing));
        assert_eq!(err.to_string(), "AWS_LAMBDA_RUNTIME_API is not set");
    }

    #[test]
    fn test_handler_without_dot_is_rejected() {
        let err = RuntimeConfig::resolve(ConfigSource {
            handler: Some("handler".to_string()),
            ..source()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidHandler(_)));
        assert_eq!(BootstrapError::from(err), BootstrapError::HandlerMissing);
    }
}
