//! Error types for Popwise
//!
//! This module provides the error hierarchy for the engine and the
//! exit-code mapping used by the `popwise` binary.

use thiserror::Error;

use popwise_core::config::TriggerKind;
pub use popwise_core::error::{ConfigError, Severity, ValidationIssue};

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `popwise` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Collaborator error (campaign source or frequency recorder failed)
    pub const COLLABORATOR_ERROR: i32 = 4;

    /// Visitor state store error
    pub const STORE_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for Popwise operations.
///
/// Aggregates the domain errors and maps each one to an exit code.
#[derive(Debug, Error)]
pub enum PopwiseError {
    /// Campaign configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Visitor state store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// External collaborator error
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl PopwiseError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Store(_) => ExitCode::STORE_ERROR,
            Self::Collaborator(_) => ExitCode::COLLABORATOR_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Detector Errors
// ============================================================================

/// Measurement faults inside a trigger detector.
///
/// These never escape a detector: the detector logs them and stays
/// pending forever.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// A page capability is unavailable or failed
    #[error("{capability} unavailable: {reason}")]
    Unavailable {
        /// Name of the capability (e.g. `"scroll metrics"`)
        capability: &'static str,
        /// Failure description
        reason: String,
    },

    /// The page event bus closed (page unloaded)
    #[error("page event stream closed")]
    PageClosed,
}

// ============================================================================
// Evaluation Errors
// ============================================================================

/// Unexpected faults during trigger or session-rule evaluation.
///
/// The orchestrator treats these as fail-open: the campaign is shown.
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// A detector was dropped without reporting a result
    #[error("{kind} detector exited without a result")]
    DetectorLost {
        /// Kind of the lost detector
        kind: TriggerKind,
    },

    /// An evaluation task panicked or was aborted
    #[error("evaluation task failed: {0}")]
    TaskFailed(String),
}

// ============================================================================
// Store Errors
// ============================================================================

/// Visitor state persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying I/O failed
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document could not be (de)serialized
    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored value has an unexpected shape
    #[error("corrupt value for key '{key}': {reason}")]
    Corrupt {
        /// Affected key
        key: String,
        /// Description of the problem
        reason: String,
    },
}

// ============================================================================
// Collaborator Errors
// ============================================================================

/// Errors from external collaborators (campaign source, frequency recorder).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("backend returned status {status} for {url}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Campaign file could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for Popwise operations.
pub type Result<T> = std::result::Result<T, PopwiseError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::SUCCESS, 0);
        assert_eq!(ExitCode::ERROR, 1);
        assert_eq!(ExitCode::CONFIG_ERROR, 2);
        assert_eq!(ExitCode::IO_ERROR, 3);
        assert_eq!(ExitCode::COLLABORATOR_ERROR, 4);
        assert_eq!(ExitCode::STORE_ERROR, 5);
        assert_eq!(ExitCode::USAGE_ERROR, 64);
        assert_eq!(ExitCode::INTERRUPTED, 130);
        assert_eq!(ExitCode::TERMINATED, 143);
    }

    #[test]
    fn test_config_error_exit_code() {
        let err: PopwiseError = ConfigError::MissingFile {
            path: PathBuf::from("/campaigns.yaml"),
        }
        .into();
        assert_eq!(err.exit_code(), ExitCode::CONFIG_ERROR);
    }

    #[test]
    fn test_store_error_exit_code() {
        let err: PopwiseError = StoreError::Corrupt {
            key: "popwise:dismissed".to_string(),
            reason: "not an array".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), ExitCode::STORE_ERROR);
    }

    #[test]
    fn test_collaborator_error_exit_code() {
        let err: PopwiseError = CollaboratorError::Status {
            status: 503,
            url: "https://api.example.com/campaigns/active".to_string(),
        }
        .into();
        assert_eq!(err.exit_code(), ExitCode::COLLABORATOR_ERROR);
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_io_error_exit_code() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err: PopwiseError = io_err.into();
        assert_eq!(err.exit_code(), ExitCode::IO_ERROR);
    }

    #[test]
    fn test_usage_error_exit_code() {
        let err = PopwiseError::Usage("--script is required".to_string());
        assert_eq!(err.exit_code(), ExitCode::USAGE_ERROR);
    }

    #[test]
    fn test_detector_lost_display() {
        let err = EvaluationError::DetectorLost {
            kind: TriggerKind::ScrollDepth,
        };
        assert_eq!(
            err.to_string(),
            "scroll_depth detector exited without a result"
        );
    }
}
