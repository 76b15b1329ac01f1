//! Error types for cmdrdata.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! Errors are categorized into five categories:
//! - **Configuration**: Missing API key, invalid endpoint, bad config file
//! - **Network**: Timeouts and transport failures talking to the backend
//! - **Backend**: The tracking backend answered with a non-success status
//! - **Input**: Provider responses or files that could not be parsed
//! - **Internal**: Reporter shutdown, I/O, and unclassified errors
//!
//! Each error has a stable error code (e.g., `CMDR-C001`) for programmatic handling.
//!
//! None of these errors ever escape a tracked provider call: the wrapper logs
//! reporting failures and hands the caller its own result untouched.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Configuration issues (missing key, invalid values, unreadable files).
    Configuration,
    /// Transport issues (timeout, connection refused, DNS).
    Network,
    /// Tracking backend rejected or could not accept an event.
    Backend,
    /// Unparseable input (provider responses, JSON files).
    Input,
    /// Internal errors (reporter shutdown, I/O, unclassified).
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Configuration => "Configuration error",
            Self::Network => "Network error",
            Self::Backend => "Tracking backend error",
            Self::Input => "Input error",
            Self::Internal => "Internal error",
        }
    }

    /// Returns a short code prefix for this category.
    #[must_use]
    pub const fn code_prefix(&self) -> &'static str {
        match self {
            Self::Configuration => "C",
            Self::Network => "N",
            Self::Backend => "B",
            Self::Input => "I",
            Self::Internal => "X",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for the `cmdrdata` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure, backend rejection
    GeneralError = 1,
    /// Missing or invalid configuration
    ConfigError = 2,
    /// Input could not be parsed
    ParseError = 3,
    /// Timeout
    Timeout = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

/// Main error type for cmdrdata operations.
///
/// Each variant has:
/// - A stable error code (e.g., `CMDR-C001`)
/// - A category for classification
/// - A retryable flag used by the delivery retry loop
#[derive(Error, Debug)]
pub enum CmdrDataError {
    // ==========================================================================
    // Configuration errors (Category: Configuration)
    // ==========================================================================
    /// Tracking is enabled but no API key was given or found in the environment.
    #[error("cmdrdata API key not configured (pass one explicitly or set CMDRDATA_API_KEY)")]
    MissingApiKey,

    /// Invalid value in configuration.
    #[error("invalid config value for '{key}': {message}")]
    ConfigInvalid { key: String, message: String },

    /// Error parsing the configuration file.
    #[error("config parse error at {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// Tracking endpoint is not an http(s) URL.
    #[error("invalid tracking endpoint: {0}")]
    InvalidEndpoint(String),

    // ==========================================================================
    // Network errors (Category: Network)
    // ==========================================================================
    /// Request timed out.
    #[error("request timeout after {0:?}")]
    Timeout(Duration),

    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(String),

    // ==========================================================================
    // Backend errors (Category: Backend)
    // ==========================================================================
    /// Backend refused the API key.
    #[error("tracking backend rejected API key (HTTP {status})")]
    AuthRejected { status: u16 },

    /// Backend rate limited the client.
    #[error("rate limited by tracking backend")]
    RateLimited { retry_after: Option<Duration> },

    /// Backend returned a server error.
    #[error("tracking backend unavailable (HTTP {status}): {message}")]
    BackendUnavailable { status: u16, message: String },

    /// Backend rejected the event for any other reason.
    #[error("tracking backend rejected event (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    // ==========================================================================
    // Input errors (Category: Input)
    // ==========================================================================
    /// Failed to parse a provider response.
    #[error("failed to parse response: {0}")]
    ParseResponse(String),

    // ==========================================================================
    // Internal errors (Category: Internal)
    // ==========================================================================
    /// The background reporter worker is gone.
    #[error("usage reporter is shut down")]
    ReporterClosed,

    /// Queued events were not delivered within the flush deadline.
    #[error("flush did not complete within {0:?}")]
    FlushTimeout(Duration),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CmdrDataError {
    /// Map error to the binary's exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::MissingApiKey
            | Self::ConfigInvalid { .. }
            | Self::ConfigParse { .. }
            | Self::InvalidEndpoint(_) => ExitCode::ConfigError,

            Self::ParseResponse(_) | Self::Json(_) => ExitCode::ParseError,

            Self::Timeout(_) | Self::FlushTimeout(_) => ExitCode::Timeout,

            Self::Network(_)
            | Self::AuthRejected { .. }
            | Self::RateLimited { .. }
            | Self::BackendUnavailable { .. }
            | Self::Rejected { .. }
            | Self::ReporterClosed
            | Self::Io(_)
            | Self::Other(_) => ExitCode::GeneralError,
        }
    }

    /// Returns the error category for classification and routing.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingApiKey
            | Self::ConfigInvalid { .. }
            | Self::ConfigParse { .. }
            | Self::InvalidEndpoint(_) => ErrorCategory::Configuration,

            Self::Timeout(_) | Self::Network(_) => ErrorCategory::Network,

            Self::AuthRejected { .. }
            | Self::RateLimited { .. }
            | Self::BackendUnavailable { .. }
            | Self::Rejected { .. } => ErrorCategory::Backend,

            Self::ParseResponse(_) | Self::Json(_) => ErrorCategory::Input,

            Self::ReporterClosed | Self::FlushTimeout(_) | Self::Io(_) | Self::Other(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Returns a stable error code for programmatic handling.
    ///
    /// Format: `CMDR-{category}{number}`.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "CMDR-C001",
            Self::ConfigInvalid { .. } => "CMDR-C002",
            Self::ConfigParse { .. } => "CMDR-C003",
            Self::InvalidEndpoint(_) => "CMDR-C004",

            Self::Timeout(_) => "CMDR-N001",
            Self::Network(_) => "CMDR-N099",

            Self::AuthRejected { .. } => "CMDR-B001",
            Self::RateLimited { .. } => "CMDR-B002",
            Self::BackendUnavailable { .. } => "CMDR-B003",
            Self::Rejected { .. } => "CMDR-B004",

            Self::ParseResponse(_) => "CMDR-I001",
            Self::Json(_) => "CMDR-I002",

            Self::ReporterClosed => "CMDR-X001",
            Self::FlushTimeout(_) => "CMDR-X002",
            Self::Io(_) => "CMDR-X003",
            Self::Other(_) => "CMDR-X099",
        }
    }

    /// Returns whether delivery should be retried after this error.
    ///
    /// Retryable errors are timeouts, transport failures, rate limits
    /// and backend 5xx responses.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_)
                | Self::Network(_)
                | Self::RateLimited { .. }
                | Self::BackendUnavailable { .. }
        )
    }

    /// Returns the retry-after duration if this error specifies one.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for cmdrdata operations.
pub type Result<T> = std::result::Result<T, CmdrDataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_map_to_config_exit_code() {
        assert_eq!(CmdrDataError::MissingApiKey.exit_code(), ExitCode::ConfigError);
        assert_eq!(
            CmdrDataError::InvalidEndpoint("ftp://x".into()).exit_code(),
            ExitCode::ConfigError
        );
    }

    #[test]
    fn error_codes_carry_category_prefix() {
        let errors = [
            CmdrDataError::MissingApiKey,
            CmdrDataError::Timeout(Duration::from_secs(5)),
            CmdrDataError::AuthRejected { status: 401 },
            CmdrDataError::ParseResponse("bad".into()),
            CmdrDataError::ReporterClosed,
        ];
        for err in &errors {
            let expected = format!("CMDR-{}", err.category().code_prefix());
            assert!(
                err.error_code().starts_with(&expected),
                "{} should start with {expected}",
                err.error_code()
            );
        }
    }

    #[test]
    fn retryable_classification() {
        assert!(CmdrDataError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(CmdrDataError::Network("reset".into()).is_retryable());
        assert!(CmdrDataError::RateLimited { retry_after: None }.is_retryable());
        assert!(
            CmdrDataError::BackendUnavailable {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!CmdrDataError::AuthRejected { status: 401 }.is_retryable());
        assert!(
            !CmdrDataError::Rejected {
                status: 422,
                message: String::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn retry_after_only_on_rate_limit() {
        let err = CmdrDataError::RateLimited {
            retry_after: Some(Duration::from_secs(2)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert_eq!(CmdrDataError::Timeout(Duration::from_secs(1)).retry_after(), None);
    }
}
