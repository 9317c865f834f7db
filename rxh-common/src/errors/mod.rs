//! Error definitions for Remote Execution Helper.
//!
//! [`HelperError`] is the single error type returned by builders, executors,
//! parsers and helpers. Every variant maps to a catalog entry (see
//! [`catalog`]) so failures can be reported with a stable code.

pub mod catalog;

pub use catalog::{ErrorCategory, ErrorCode, ErrorEntry};

use crate::types::OsFlavor;
use thiserror::Error;

/// Errors raised while building, running, or interpreting a command.
#[derive(Debug, Error)]
pub enum HelperError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Operation '{operation}' requires parameter '{placeholder}'")]
    MissingParameter {
        operation: String,
        placeholder: String,
    },

    #[error("No '{operation}' command template for {flavor}")]
    UnknownOperation { operation: String, flavor: OsFlavor },

    #[error("Cannot determine OS flavor from '{0}'")]
    UnknownOs(String),

    #[error("Refusing to execute an empty command")]
    EmptyCommand,

    #[error("Connection to {host} failed: {message}")]
    Connection { host: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "Operation '{operation}' failed with exit code {exit_code}: {}",
        describe_failure(.output, .exception)
    )]
    CommandExecution {
        operation: String,
        exit_code: i32,
        output: String,
        exception: Option<String>,
    },

    #[error("Release listings disagree: {0}")]
    ReleaseMismatch(String),

    #[error("Malformed output ({reason}): '{line}'")]
    MalformedOutput { line: String, reason: String },

    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

fn describe_failure(output: &str, exception: &Option<String>) -> String {
    match exception.as_deref().map(str::trim).filter(|text| !text.is_empty()) {
        Some(text) => text.to_string(),
        None if output.trim().is_empty() => "no output".to_string(),
        None => output.trim().to_string(),
    }
}

impl HelperError {
    /// Catalog code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::MissingParameter { .. } => ErrorCode::MissingParameter,
            Self::UnknownOperation { .. } => ErrorCode::UnknownOperation,
            Self::UnknownOs(_) => ErrorCode::UnknownOs,
            Self::EmptyCommand => ErrorCode::EmptyCommand,
            Self::Connection { .. } => ErrorCode::ConnectionFailed,
            Self::Io(_) => ErrorCode::ProcessIo,
            Self::CommandExecution { .. } => ErrorCode::CommandFailed,
            Self::ReleaseMismatch(_) => ErrorCode::ReleaseMismatch,
            Self::MalformedOutput { .. } => ErrorCode::MalformedOutput,
            Self::InvalidPattern(_) => ErrorCode::InvalidPattern,
        }
    }

    pub(crate) fn malformed(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedOutput {
            line: line.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for RXH operations.
pub type Result<T> = std::result::Result<T, HelperError>;
