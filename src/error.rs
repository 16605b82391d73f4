//! Exit codes and structured error reports.

use serde::Serialize;

use crate::duplicates::FinderError;
use crate::signal::Interrupted;

/// Process exit codes.
///
/// - 0: Success (including printing usage when no folders are given)
/// - 1: General error (bad configuration, missing root, spill failure)
/// - 130: Interrupted by user (Ctrl+C)
///
/// Per-file problems during a scan or a link batch never change the code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Completed normally.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// Interrupted by user (Ctrl+C).
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DL000",
            Self::GeneralError => "DL001",
            Self::Interrupted => "DL130",
        }
    }

    /// Classify an application error.
    #[must_use]
    pub fn from_error(err: &anyhow::Error) -> Self {
        let interrupted = err.chain().any(|cause| {
            cause.is::<Interrupted>()
                || matches!(
                    cause.downcast_ref::<FinderError>(),
                    Some(FinderError::Interrupted)
                )
        });
        if interrupted {
            Self::Interrupted
        } else {
            Self::GeneralError
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DL001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
