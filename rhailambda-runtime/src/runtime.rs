//! Runtime loop
//!
//! `INIT` once, then `ACQUIRE -> INVOKE -> PUBLISH` until a fatal error. Each
//! cycle owns its context, payload and engine; only the configuration and the
//! HTTP client outlive it.

use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::bridge::{self, BridgeError, HandlerError};
use crate::client::RuntimeApiClient;
use crate::config::RuntimeConfig;
use rhailambda_core::{BootstrapError, REQUEST_ID_HEADER};

/// How one cycle ended when it did not end the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The handler returned and its response was posted
    Published { request_id: String },

    /// The handler raised a runtime error, nothing was posted to `response`
    HandlerFailed {
        request_id: Option<String>,
        error: HandlerError,
        reported: bool,
    },
}

pub struct Runtime {
    config: RuntimeConfig,
    client: RuntimeApiClient,
    module_path: PathBuf,
}

impl Runtime {
    /// Build the HTTP client; the process working directory is left alone
    pub fn new(config: RuntimeConfig) -> Result<Self, BootstrapError> {
        let client = RuntimeApiClient::new(config.endpoint.clone()).map_err(|err| {
            error!(error = %err, "Failed to initialize http client");
            BootstrapError::InitHttp
        })?;
        let module_path = config.module_path();

        Ok(Self {
            config,
            client,
            module_path,
        })
    }

    /// Full `INIT`: resolve the task root, change into it and build the runtime
    pub fn bootstrap(mut config: RuntimeConfig) -> Result<Self, BootstrapError> {
        let root = std::fs::canonicalize(&config.task_root).map_err(|err| {
            error!(task_root = %config.task_root.display(), error = %err, "Task root is not accessible");
            BootstrapError::RootMissing
        })?;
        std::env::set_current_dir(&root).map_err(|err| {
            error!(task_root = %root.display(), error = %err, "Failed to change into task root");
            BootstrapError::RootMissing
        })?;
        config.task_root = root;

        let runtime = Self::new(config)?;
        info!(
            endpoint = %runtime.config.endpoint,
            module = %runtime.module_path.display(),
            function = %runtime.config.handler.function,
            "Runtime initialized"
        );
        Ok(runtime)
    }

    /// Process invocations until one fails fatally
    pub async fn run(&self) -> BootstrapError {
        loop {
            if let Err(err) = self.step().await {
                return err;
            }
        }
    }

    /// One `ACQUIRE -> INVOKE -> PUBLISH` cycle
    pub async fn step(&self) -> Result<StepOutcome, BootstrapError> {
        let (context, payload) = self.client.next_invocation().await.map_err(|err| {
            error!(error = %err, "Failed to get next invocation");
            BootstrapError::GetJob
        })?;
        let request_id = context.request_id().map(str::to_owned);
        debug!(
            request_id = request_id.as_deref().unwrap_or("-"),
            headers = context.len(),
            bytes = payload.len(),
            "Received invocation"
        );

        let result = match bridge::invoke(
            &self.module_path,
            &self.config.handler.function,
            &payload,
            &context,
        ) {
            Ok(result) => result,
            Err(BridgeError::Load { path, message }) => {
                error!(module = %path.display(), error = %message, "Failed to load handler module");
                return Err(BootstrapError::InitInterpreter);
            }
            Err(BridgeError::Runtime(err)) => {
                error!(
                    request_id = request_id.as_deref().unwrap_or("-"),
                    error = %err,
                    stack_trace = %err.stack_trace.join("\n"),
                    "Handler raised an error"
                );
                let reported = self.report_error(request_id.as_deref(), &err).await;
                return Ok(StepOutcome::HandlerFailed {
                    request_id,
                    error: err,
                    reported,
                });
            }
        };

        let Some(request_id) = request_id else {
            error!(header = REQUEST_ID_HEADER, "Invocation has no request id");
            return Err(BootstrapError::HandleRequest);
        };

        if let Some(handler_error) = &result.error {
            warn!(request_id = %request_id, error = %handler_error, "Handler returned an error value");
        }

        let response = result.response.unwrap_or_default();
        self.client
            .post_response(&request_id, &response)
            .await
            .map_err(|err| {
                error!(request_id = %request_id, error = %err, "Failed to post response");
                BootstrapError::PostResponse
            })?;

        info!(request_id = %request_id, bytes = response.len(), "Published response");
        Ok(StepOutcome::Published { request_id })
    }

    /// Best-effort `invocation/{id}/error` report, only when enabled
    async fn report_error(&self, request_id: Option<&str>, err: &HandlerError) -> bool {
        if !self.config.report_errors {
            return false;
        }
        let Some(request_id) = request_id else {
            warn!("Cannot report handler error without a request id");
            return false;
        };

        match self.client.post_error(request_id, &err.to_report()).await {
            Ok(()) => true,
            Err(report_err) => {
                warn!(request_id = %request_id, error = %report_err, "Failed to report handler error");
                false
            }
        }
    }
}
