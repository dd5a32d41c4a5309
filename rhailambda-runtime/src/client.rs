//! Runtime API client
//!
//! Talks to the control plane: fetches the next invocation and posts the
//! handler's response (or error report) back. Calls are awaited one after the
//! other and carry no timeout; the sandbox bounds how long an invocation may run.

use reqwest::{redirect, Client, Response};
use thiserror::Error;
use tracing::debug;

use crate::parser::{render_header_line, InvocationSink};
use rhailambda_core::invocation::FUNCTION_ERROR_TYPE_HEADER;
use rhailambda_core::{Context, ErrorReport, Payload};

/// Runtime API version prefix
pub const API_VERSION: &str = "2018-06-01";

/// Redirects followed before giving up
const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to build http client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} returned status {status}")]
    Status { url: String, status: u16 },
}

/// Client for the Lambda Runtime API at `http://{endpoint}`
#[derive(Debug, Clone)]
pub struct RuntimeApiClient {
    endpoint: String,
    client: Client,
}

impl RuntimeApiClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn next_invocation_url(&self) -> String {
        format!(
            "http://{}/{}/runtime/invocation/next",
            self.endpoint, API_VERSION
        )
    }

    pub fn response_url(&self, request_id: &str) -> String {
        format!(
            "http://{}/{}/runtime/invocation/{}/response",
            self.endpoint, API_VERSION, request_id
        )
    }

    pub fn error_url(&self, request_id: &str) -> String {
        format!(
            "http://{}/{}/runtime/invocation/{}/error",
            self.endpoint, API_VERSION, request_id
        )
    }

    /// GET /runtime/invocation/next
    ///
    /// The status line and every header are streamed through the header
    /// callback, the body through the body callback, into a fresh context and
    /// payload owned by this call.
    pub async fn next_invocation(&self) -> Result<(Context, Payload), ClientError> {
        let url = self.next_invocation_url();
        debug!(url = %url, "Requesting next invocation");

        let mut response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        let mut sink = InvocationSink::new();
        let status_line = format!("{:?} {}\r\n", response.version(), response.status());
        sink.on_header(status_line.as_bytes());
        for (name, value) in response.headers() {
            sink.on_header(&render_header_line(name.as_str(), value.as_bytes()));
        }

        check_status(&url, &response)?;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?
        {
            sink.on_body(&chunk);
        }

        Ok(sink.finish())
    }

    /// POST /runtime/invocation/{requestId}/response
    pub async fn post_response(&self, request_id: &str, response: &[u8]) -> Result<(), ClientError> {
        let url = self.response_url(request_id);
        debug!(request_id = %request_id, bytes = response.len(), "Posting response");

        let reply = self
            .client
            .post(&url)
            .body(response.to_vec())
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        check_status(&url, &reply)?;
        drain(&url, reply).await
    }

    /// POST /runtime/invocation/{requestId}/error
    pub async fn post_error(&self, request_id: &str, report: &ErrorReport) -> Result<(), ClientError> {
        let url = self.error_url(request_id);
        debug!(request_id = %request_id, error_type = %report.error_type, "Posting error report");

        let reply = self
            .client
            .post(&url)
            .header(FUNCTION_ERROR_TYPE_HEADER, &report.error_type)
            .json(report)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        check_status(&url, &reply)?;
        drain(&url, reply).await
    }
}

fn check_status(url: &str, response: &Response) -> Result<(), ClientError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(ClientError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

/// Read and discard whatever the control plane sent back
async fn drain(url: &str, response: Response) -> Result<(), ClientError> {
    response
        .bytes()
        .await
        .map(|_| ())
        .map_err(|source| ClientError::Transport {
            url: url.to_string(),
            source,
        })
}
