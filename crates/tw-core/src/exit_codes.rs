//! Exit codes for the tw-core CLI.
//!
//! Exit codes communicate operation outcome without requiring output parsing.
//!
//! Exit code ranges:
//! - 0-3: Operational outcomes (parse outcome from code, not output)
//! - 10-19: User/environment errors (recoverable by user action)
//! - 20-29: Internal errors (bugs, I/O, timeouts)

use tw_common::error::{BatchResult, StructuredError};
use tw_common::{Error, ErrorCategory};

/// Exit codes for tw-core operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    // ========================================================================
    // Operational Outcomes (0-3)
    // ========================================================================
    /// Success: every unit completed
    Clean = 0,

    /// Completed, but no unit produced a sample
    NoSamples = 1,

    /// Partial failure: some units failed
    PartialFail = 3,

    // ========================================================================
    // User / Environment Errors (10-19)
    // ========================================================================
    /// Invalid arguments or configuration
    ArgsError = 10,

    /// Permission denied
    PermissionError = 12,

    // ========================================================================
    // Internal Errors (20-29)
    // ========================================================================
    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,

    /// External extractor timed out
    TimeoutError = 22,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code indicates success.
    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean | ExitCode::NoSamples)
    }

    /// Check if this exit code is a user/environment error (codes 10-19).
    pub fn is_user_error(self) -> bool {
        let code = self as i32;
        (10..20).contains(&code)
    }

    /// Check if this exit code is an internal error (codes 20-29).
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Get the error code name as a string constant (for JSON output).
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::NoSamples => "OK_NO_SAMPLES",
            ExitCode::PartialFail => "ERR_PARTIAL",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::PermissionError => "ERR_PERMISSION",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
            ExitCode::TimeoutError => "ERR_TIMEOUT",
        }
    }

    /// Exit code for a fatal (whole-command) error.
    pub fn for_error(err: &Error) -> Self {
        match err {
            Error::ExtractorTimeout { .. } => ExitCode::TimeoutError,
            Error::Io(e) | Error::StorageWrite { source: e, .. }
                if e.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                ExitCode::PermissionError
            }
            _ => Self::for_category(err.category()),
        }
    }

    fn for_category(category: ErrorCategory) -> Self {
        match category {
            ErrorCategory::Config | ErrorCategory::Input => ExitCode::ArgsError,
            ErrorCategory::Storage | ErrorCategory::Io => ExitCode::IoError,
            ErrorCategory::Windowing | ErrorCategory::Features => ExitCode::InternalError,
        }
    }

    /// Exit code for a unit failure reported in a batch.
    pub fn for_structured(err: &StructuredError) -> Self {
        match err.code {
            42 => ExitCode::TimeoutError,
            _ => Self::for_category(err.category),
        }
    }

    /// Exit code for a fan-out stage.
    ///
    /// Any mix of successes and failures is a partial failure; a batch where
    /// every unit failed takes the code of its first failure.
    pub fn for_batch<T>(batch: &BatchResult<T>) -> Self {
        match batch.failed.first() {
            None => ExitCode::Clean,
            Some(_) if batch.summary.any_succeeded => ExitCode::PartialFail,
            Some(first) => Self::for_structured(&first.error),
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges() {
        assert!(ExitCode::Clean.is_success());
        assert!(ExitCode::NoSamples.is_success());
        assert!(!ExitCode::PartialFail.is_success());
        assert!(ExitCode::ArgsError.is_user_error());
        assert!(ExitCode::IoError.is_internal_error());
        assert_eq!(i32::from(ExitCode::TimeoutError), 22);
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCode::PartialFail.to_string(), "ERR_PARTIAL (3)");
    }

    #[test]
    fn test_for_error() {
        assert_eq!(
            ExitCode::for_error(&Error::Config("bad".into())),
            ExitCode::ArgsError
        );
        assert_eq!(
            ExitCode::for_error(&Error::NoInputs("/data".into())),
            ExitCode::ArgsError
        );
        assert_eq!(
            ExitCode::for_error(&Error::ExtractorTimeout {
                sample: "email/b86400-r0/000001".into(),
                seconds: 5
            }),
            ExitCode::TimeoutError
        );
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(
            ExitCode::for_error(&Error::Io(denied)),
            ExitCode::PermissionError
        );
    }

    #[test]
    fn test_for_category() {
        let out_of_range = Error::TimestampOutOfRange {
            timestamp: i64::MIN,
            bucket_secs: 86_400,
        };
        assert_eq!(out_of_range.category(), ErrorCategory::Windowing);
        assert_eq!(
            ExitCode::for_category(ErrorCategory::Windowing),
            ExitCode::for_error(&out_of_range)
        );
        assert_eq!(
            ExitCode::for_category(ErrorCategory::Storage),
            ExitCode::IoError
        );
    }

    #[test]
    fn test_for_batch() {
        let unsorted = Error::UnsortedInput {
            position: 1,
            timestamp: 5,
            previous: 10,
        };

        let mut batch: BatchResult<u32> = BatchResult::default();
        assert_eq!(ExitCode::for_batch(&batch), ExitCode::Clean);

        batch.add_failure("bad/b86400-r0", StructuredError::from(&unsorted));
        assert_eq!(ExitCode::for_batch(&batch), ExitCode::InternalError);

        batch.add_success(1);
        assert_eq!(ExitCode::for_batch(&batch), ExitCode::PartialFail);

        let timeout = Error::ExtractorTimeout {
            sample: "x/b60-r0/000000".into(),
            seconds: 1,
        };
        let mut batch: BatchResult<u32> = BatchResult::default();
        batch.add_failure("x/b60-r0", StructuredError::from(&timeout));
        assert_eq!(ExitCode::for_batch(&batch), ExitCode::TimeoutError);
    }
}
