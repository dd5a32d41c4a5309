//! Per-invocation data: context, payload and handler result

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Header carrying the id used to address the response
pub const REQUEST_ID_HEADER: &str = "Lambda-Runtime-Aws-Request-Id";

/// Header naming the error category on an error report
pub const FUNCTION_ERROR_TYPE_HEADER: &str = "Lambda-Runtime-Function-Error-Type";

/// Invocation metadata taken from the response headers of `invocation/next`
///
/// Values are kept as the raw bytes the control plane sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    entries: HashMap<String, Vec<u8>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any previous value for the same key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Exact-key lookup of the raw value
    pub fn get_bytes(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Exact-key lookup, `None` as well when the value is not valid UTF-8
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_bytes(key).and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Case-insensitive lookup, HTTP header names are not case sensitive
    pub fn get_ignore_case(&self, key: &str) -> Option<&str> {
        let value = self.get_bytes(key).or_else(|| {
            self.entries
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.as_slice())
        })?;
        std::str::from_utf8(value).ok()
    }

    /// The request id, if the control plane sent one
    pub fn request_id(&self) -> Option<&str> {
        self.get_ignore_case(REQUEST_ID_HEADER)
            .filter(|id| !id.is_empty())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl<K: Into<String>, V: Into<Vec<u8>>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = Self::new();
        for (k, v) in iter {
            context.insert(k, v);
        }
        context
    }
}

/// Event body accumulated from the response of `invocation/next`
#[derive(Debug, Clone, Default)]
pub struct Payload {
    buf: BytesMut,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// The payload as text when it is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.buf).ok()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        let mut payload = Self::new();
        payload.append(s.as_bytes());
        payload
    }
}

/// The two values returned by a handler
///
/// Both may be set; nothing enforces that only one of them is. The response is
/// the body posted back, byte for byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationResult {
    pub response: Option<Vec<u8>>,
    pub error: Option<String>,
}

impl InvocationResult {
    pub fn new(response: Option<Vec<u8>>, error: Option<String>) -> Self {
        Self { response, error }
    }

    pub fn success(response: impl Into<Vec<u8>>) -> Self {
        Self {
            response: Some(response.into()),
            error: None,
        }
    }

    /// The response as text when it is valid UTF-8
    pub fn response_text(&self) -> Option<&str> {
        self.response
            .as_deref()
            .and_then(|r| std::str::from_utf8(r).ok())
    }
}

/// Body of an `invocation/{id}/error` report
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub error_message: String,
    pub error_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub stack_trace: Vec<String>,
}
