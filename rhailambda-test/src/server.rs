//! Mock Runtime API server
//!
//! Serves queued invocations from `invocation/next` and records every
//! response and error report the runtime posts back.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

const REDIRECT_TARGET: &str = "/redirected/runtime/invocation/next";

/// One invocation handed out by `invocation/next`
#[derive(Debug, Clone)]
pub struct MockInvocation {
    pub request_id: Option<String>,
    pub payload: Bytes,
    pub headers: Vec<(String, String)>,
}

impl MockInvocation {
    pub fn new(request_id: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            request_id: Some(request_id.into()),
            payload: payload.into(),
            headers: Vec::new(),
        }
    }

    /// An invocation the control plane forgot to address
    pub fn without_request_id(payload: impl Into<Bytes>) -> Self {
        Self {
            request_id: None,
            payload: payload.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A body posted to `invocation/{id}/response`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedResponse {
    pub request_id: String,
    pub body: Bytes,
    pub content_length: Option<u64>,
}

/// A report posted to `invocation/{id}/error`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedError {
    pub request_id: String,
    pub error_type: Option<String>,
    pub body: Bytes,
}

struct MockState {
    invocation_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<MockInvocation>>,
    next_requests: AtomicUsize,
    responses: Mutex<Vec<PostedResponse>>,
    errors: Mutex<Vec<PostedError>>,
    response_status: StatusCode,
    redirect_next: bool,
}

/// Builder for [`MockRuntimeApi`]
pub struct MockRuntimeApiBuilder {
    invocations: Vec<MockInvocation>,
    keep_open: bool,
    response_status: StatusCode,
    redirect_next: bool,
}

impl MockRuntimeApiBuilder {
    pub fn invocation(mut self, invocation: MockInvocation) -> Self {
        self.invocations.push(invocation);
        self
    }

    /// Keep `invocation/next` blocking once the queue is drained instead of
    /// answering 500
    pub fn keep_open(mut self) -> Self {
        self.keep_open = true;
        self
    }

    /// Status answered to every posted response
    pub fn response_status(mut self, status: StatusCode) -> Self {
        self.response_status = status;
        self
    }

    /// Answer `invocation/next` with a temporary redirect
    pub fn redirect_next(mut self) -> Self {
        self.redirect_next = true;
        self
    }

    pub async fn start(self) -> Result<MockRuntimeApi, std::io::Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        for invocation in self.invocations {
            let _ = tx.send(invocation);
        }

        let state = Arc::new(MockState {
            invocation_rx: tokio::sync::Mutex::new(rx),
            next_requests: AtomicUsize::new(0),
            responses: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            response_status: self.response_status,
            redirect_next: self.redirect_next,
        });

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let router = mock_router(state.clone());

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        debug!(addr = %addr, "Mock Runtime API listening");

        Ok(MockRuntimeApi {
            addr,
            state,
            invocation_tx: self.keep_open.then_some(tx),
            handle,
        })
    }
}

/// A Runtime API on a random local port
pub struct MockRuntimeApi {
    addr: SocketAddr,
    state: Arc<MockState>,
    invocation_tx: Option<mpsc::UnboundedSender<MockInvocation>>,
    handle: JoinHandle<()>,
}

impl MockRuntimeApi {
    pub fn builder() -> MockRuntimeApiBuilder {
        MockRuntimeApiBuilder {
            invocations: Vec::new(),
            keep_open: false,
            response_status: StatusCode::ACCEPTED,
            redirect_next: false,
        }
    }

    /// Serve `invocations` in order, then answer 500
    pub async fn start(
        invocations: impl IntoIterator<Item = MockInvocation>,
    ) -> Result<Self, std::io::Error> {
        invocations
            .into_iter()
            .fold(Self::builder(), MockRuntimeApiBuilder::invocation)
            .start()
            .await
    }

    /// `host:port`, the form `AWS_LAMBDA_RUNTIME_API` takes
    pub fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    /// Queue another invocation; only possible when built with `keep_open`
    pub fn push(&self, invocation: MockInvocation) -> bool {
        self.invocation_tx
            .as_ref()
            .is_some_and(|tx| tx.send(invocation).is_ok())
    }

    /// Stop accepting invocations, `invocation/next` answers 500 once drained
    pub fn close(&mut self) {
        self.invocation_tx = None;
    }

    pub fn next_requests(&self) -> usize {
        self.state.next_requests.load(Ordering::SeqCst)
    }

    pub fn responses(&self) -> Vec<PostedResponse> {
        self.state.responses.lock().clone()
    }

    pub fn errors(&self) -> Vec<PostedError> {
        self.state.errors.lock().clone()
    }
}

impl Drop for MockRuntimeApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mock_router(state: Arc<MockState>) -> Router {
    Router::new()
        .route(
            "/2018-06-01/runtime/invocation/next",
            get(get_next_invocation),
        )
        .route(REDIRECT_TARGET, get(deliver_next_invocation))
        .route(
            "/2018-06-01/runtime/invocation/:request_id/response",
            post(post_invocation_response),
        )
        .route(
            "/2018-06-01/runtime/invocation/:request_id/error",
            post(post_invocation_error),
        )
        .with_state(state)
}

/// GET /runtime/invocation/next
async fn get_next_invocation(State(state): State<Arc<MockState>>) -> Response {
    if state.redirect_next {
        return Redirect::temporary(REDIRECT_TARGET).into_response();
    }
    deliver_next_invocation(State(state)).await
}

async fn deliver_next_invocation(State(state): State<Arc<MockState>>) -> Response {
    state.next_requests.fetch_add(1, Ordering::SeqCst);

    let invocation = {
        let mut rx = state.invocation_rx.lock().await;
        match rx.recv().await {
            Some(invocation) => invocation,
            None => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Invocation channel closed",
                )
                    .into_response();
            }
        }
    };

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header("Lambda-Runtime-Deadline-Ms", "1700000000000")
        .header(
            "Lambda-Runtime-Invoked-Function-Arn",
            "arn:aws:lambda:us-east-1:000000000000:function:mock",
        );
    if let Some(request_id) = &invocation.request_id {
        builder = builder.header("Lambda-Runtime-Aws-Request-Id", request_id);
    }
    for (name, value) in &invocation.headers {
        builder = builder.header(name, value);
    }

    builder
        .body(Body::from(invocation.payload))
        .unwrap_or_else(|err| {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        })
}

/// POST /runtime/invocation/{requestId}/response
async fn post_invocation_response(
    State(state): State<Arc<MockState>>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let content_length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());

    state.responses.lock().push(PostedResponse {
        request_id,
        body,
        content_length,
    });
    state.response_status
}

/// POST /runtime/invocation/{requestId}/error
async fn post_invocation_error(
    State(state): State<Arc<MockState>>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let error_type = headers
        .get("Lambda-Runtime-Function-Error-Type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    state.errors.lock().push(PostedError {
        request_id,
        error_type,
        body,
    });
    StatusCode::ACCEPTED
}
