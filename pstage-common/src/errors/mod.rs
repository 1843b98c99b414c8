//! Error taxonomy and catalog for pstage.
//!
//! [`StageError`] is the single error type crossing module boundaries. Each
//! variant maps to a catalog entry with a stable code and remediation steps.
//!
//! # Error Code Ranges
//!
//! | Range      | Category    | Description                          |
//! |------------|-------------|--------------------------------------|
//! | E001-E099  | Config      | Configuration and validation errors  |
//! | E100-E199  | Network     | SSH connectivity and command timeouts|
//! | E200-E299  | Transfer    | Remote file transfer and listing     |
//! | E300-E399  | Job         | Remote batch job outcome             |
//! | E400-E499  | Input       | Local input preparation              |

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// What a [`StageError::Timeout`] was waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// A single remote command exceeded its execution limit.
    Command,
    /// The job's status marker did not appear before the deadline.
    Marker,
}

/// Errors raised by the staging workflow.
///
/// Every variant is fatal for the current run. The only place an error is
/// downgraded is the best-effort result fetch, which logs a warning instead.
#[derive(Debug, Error)]
pub enum StageError {
    /// A configuration field or derived path/argument failed the allow-list.
    #[error("invalid value for {field}: {reason}")]
    Validation { field: String, reason: String },

    /// The SSH session could not be established.
    #[error("connection to {host} failed: {message}")]
    Connection { host: String, message: String },

    /// Upload, download, listing or directory creation failed.
    #[error("transfer failed for {path}: {message}")]
    Transfer { path: String, message: String },

    /// The remote job's status marker reported failure.
    #[error("remote job failed: {0}")]
    RemoteJob(String),

    /// Completion was not observed before the deadline.
    #[error("timed out after {}s waiting for {what}", .after.as_secs())]
    Timeout {
        kind: TimeoutKind,
        what: String,
        after: Duration,
    },

    /// Local input could not be prepared.
    #[error("input error for {}: {message}", .path.display())]
    Input { path: PathBuf, message: String },

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StageError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn connection(host: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Connection {
            host: host.into(),
            message: message.to_string(),
        }
    }

    pub fn transfer(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Transfer {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn timeout(kind: TimeoutKind, what: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            kind,
            what: what.into(),
            after,
        }
    }

    pub fn input(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Input {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Catalog code for this error.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::ConfigValidationError,
            Self::Config(_) => ErrorCode::ConfigLoadError,
            Self::Connection { .. } => ErrorCode::SshConnectionFailed,
            Self::Timeout {
                kind: TimeoutKind::Command,
                ..
            } => ErrorCode::SshTimeout,
            Self::Timeout {
                kind: TimeoutKind::Marker,
                ..
            } => ErrorCode::JobCompletionTimeout,
            Self::Transfer { .. } => ErrorCode::TransferFailed,
            Self::RemoteJob(_) => ErrorCode::JobFailed,
            Self::Input { .. } => ErrorCode::InputPreparationFailed,
        }
    }
}
