//! Exit codes.

use serde::Serialize;

/// Exit codes for the photosync binary.
///
/// - 0: Success (run completed, including runs with per-file failures)
/// - 1: General error (invalid configuration, unexpected failure)
/// - 130: Interrupted by user (Ctrl+C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the run completed.
    Success = 0,
    /// General error: an unexpected error occurred.
    GeneralError = 1,
    /// Interrupted: the run was stopped by the user.
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
            Self::Success => "PS000",
            Self::GeneralError => "PS001",
            Self::Interrupted => "PS130",
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        // Every variant fits in a u8
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}
