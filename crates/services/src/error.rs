//! Shared error types for the services crate.

use std::time::Duration;

use thiserror::Error;

use interview_core::model::{ModeParseError, TaskId};
use storage::repository::StorageError;

/// Errors emitted by advisor clients.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdvisorError {
    #[error("advisor is not configured")]
    Disabled,
    #[error("advisor returned an empty response")]
    EmptyResponse,
    #[error("advisor request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("advisor request timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl AdvisorError {
    /// Transport hiccups, rate limits and server faults are worth another attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            AdvisorError::Timeout(_) => true,
            AdvisorError::HttpStatus(status) => {
                status.is_server_error() || *status == reqwest::StatusCode::TOO_MANY_REQUESTS
            }
            AdvisorError::Http(err) => err.is_timeout() || err.is_connect(),
            _ => false,
        }
    }
}

/// Infrastructure failures of the grading sandbox.
///
/// Per-test failures (timeouts, exceptions, bad output) are verdicts, not errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SandboxError {
    #[error("failed to prepare sandbox workspace: {0}")]
    Workspace(#[source] std::io::Error),
    #[error("failed to start interpreter {interpreter}: {source}")]
    Spawn {
        interpreter: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors emitted by the interview service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InterviewError {
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),
    #[error(transparent)]
    Mode(#[from] ModeParseError),
    #[error(transparent)]
    Advisor(#[from] AdvisorError),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
