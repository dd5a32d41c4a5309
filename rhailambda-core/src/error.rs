//! Bootstrap error table
//!
//! Every process-fatal condition has a fixed message and its own exit status.

use std::fmt;

/// Fixed diagnostic lines, indexed by exit status - 1
const MESSAGES: [&str; 8] = [
    "Missing endpoint please set AWS_LAMBDA_RUNTIME_API environment variable",
    "Missing handler please set _HANDLER environment variable",
    "Missing task root please set LAMBDA_TASK_ROOT environment variable",
    "Failed to initialize interpreter",
    "Failed to initialize http client",
    "Failed to get a job",
    "Failed to handle the request",
    "Failed to post the response",
];

/// Fatal failure reasons, ordered by exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BootstrapError {
    EndpointMissing = 1,
    HandlerMissing = 2,
    RootMissing = 3,
    InitInterpreter = 4,
    InitHttp = 5,
    GetJob = 6,
    HandleRequest = 7,
    PostResponse = 8,
}

impl BootstrapError {
    /// All variants in exit status order
    pub const ALL: [BootstrapError; 8] = [
        Self::EndpointMissing,
        Self::HandlerMissing,
        Self::RootMissing,
        Self::InitInterpreter,
        Self::InitHttp,
        Self::GetJob,
        Self::HandleRequest,
        Self::PostResponse,
    ];

    /// Process exit status for this error
    pub fn exit_code(&self) -> u8 {
        *self as u8
    }

    /// Fixed diagnostic line printed before exiting
    pub fn message(&self) -> &'static str {
        MESSAGES[usize::from(self.exit_code()) - 1]
    }
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for BootstrapError {}
