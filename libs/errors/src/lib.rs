//! Unified error handling for the searchlight configuration tools
//!
//! Every crate in the workspace reports failures through [`SlcError`], so the
//! interactive session can print one line per failed operation and carry on.

use thiserror::Error;

// ============================================================================
// SlcError - Main error type
// ============================================================================

/// Main error type for the protocol engine and the configuration tool
#[derive(Debug, Error)]
pub enum SlcError {
    // ======================================
    // Transport Errors
    // ======================================
    #[error("Unable to open {port}: {reason}")]
    TransportOpenFailure { port: String, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("No sentence terminator after {idle_reads} idle reads")]
    TransportTimeout { idle_reads: u32 },

    // ======================================
    // Protocol Errors
    // ======================================
    #[error("Sentence too long: {len} bytes (max {max})")]
    SentenceTooLong { len: usize, max: usize },

    #[error("Field index {index} out of range (record has {count} fields)")]
    FieldIndexOutOfRange { index: usize, count: usize },

    #[error("Unknown field: {0}")]
    UnknownField(String),

    // ======================================
    // Input Errors
    // ======================================
    #[error("Not a number: '{0}'")]
    MalformedFieldEdit(String),

    // ======================================
    // Backup Errors
    // ======================================
    #[error("It is not a SearchLight backup file")]
    InvalidSignature,

    #[error("Backup size mismatch: file holds {stated} bytes, record needs {expected}")]
    SizeMismatch { stated: usize, expected: usize },

    #[error("Backup and restore are not supported by the {0} protocol variant")]
    BackupUnsupported(String),

    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // ======================================
    // File & I/O Errors
    // ======================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using SlcError
pub type Result<T> = std::result::Result<T, SlcError>;

/// Error category enum - used for classification and log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Connection,
    Timeout,
    Protocol,
    Validation,
    DataCorruption,
    Internal,
}

impl SlcError {
    /// Stable error code for logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::TransportOpenFailure { .. } => "TRANSPORT_OPEN_FAILURE",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::TransportTimeout { .. } => "TRANSPORT_TIMEOUT",
            Self::SentenceTooLong { .. } => "SENTENCE_TOO_LONG",
            Self::FieldIndexOutOfRange { .. } => "FIELD_INDEX_OUT_OF_RANGE",
            Self::UnknownField(_) => "UNKNOWN_FIELD",
            Self::MalformedFieldEdit(_) => "MALFORMED_FIELD_EDIT",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::SizeMismatch { .. } => "SIZE_MISMATCH",
            Self::BackupUnsupported(_) => "BACKUP_UNSUPPORTED",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) | Self::InvalidConfig { .. } => ErrorCategory::Configuration,
            Self::TransportOpenFailure { .. } | Self::Transport(_) => ErrorCategory::Connection,
            Self::TransportTimeout { .. } => ErrorCategory::Timeout,
            Self::SentenceTooLong { .. } | Self::FieldIndexOutOfRange { .. } => {
                ErrorCategory::Protocol
            },
            Self::MalformedFieldEdit(_) | Self::UnknownField(_) | Self::BackupUnsupported(_) => {
                ErrorCategory::Validation
            },
            Self::InvalidSignature | Self::SizeMismatch { .. } => ErrorCategory::DataCorruption,
            Self::Io(_) => ErrorCategory::Internal,
        }
    }

    /// Log level to use when the error is reported
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self.category() {
            ErrorCategory::Internal | ErrorCategory::Connection => Level::ERROR,
            ErrorCategory::Timeout | ErrorCategory::Protocol | ErrorCategory::DataCorruption => {
                Level::WARN
            },
            ErrorCategory::Validation | ErrorCategory::Configuration => Level::INFO,
        }
    }

    /// Whether repeating the same operation might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Connection | ErrorCategory::Timeout
        )
    }

    /// Create a transport error from anything displayable
    pub fn transport(msg: impl std::fmt::Display) -> Self {
        Self::Transport(msg.to_string())
    }
}

impl From<serde_yaml::Error> for SlcError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

// Helper macros for creating errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::SlcError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::SlcError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! invalid_config {
    ($field:expr, $reason:expr) => {
        $crate::SlcError::InvalidConfig {
            field: $field.to_string(),
            reason: $reason.to_string(),
        }
    };
}

// Tests
#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(SlcError::InvalidSignature.error_code(), "INVALID_SIGNATURE");
        assert_eq!(
            SlcError::TransportTimeout { idle_reads: 3 }.error_code(),
            "TRANSPORT_TIMEOUT"
        );
        assert_eq!(
            SlcError::MalformedFieldEdit("x".into()).error_code(),
            "MALFORMED_FIELD_EDIT"
        );
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            SlcError::SizeMismatch {
                stated: 28,
                expected: 32
            }
            .category(),
            ErrorCategory::DataCorruption
        );
        assert_eq!(
            SlcError::TransportOpenFailure {
                port: "COM1".into(),
                reason: "busy".into()
            }
            .category(),
            ErrorCategory::Connection
        );
        assert!(SlcError::TransportTimeout { idle_reads: 3 }.is_retryable());
        assert!(!SlcError::InvalidSignature.is_retryable());
        assert_eq!(
            SlcError::MalformedFieldEdit(String::new()).log_level(),
            tracing::Level::INFO
        );
    }

    #[test]
    fn test_error_display() {
        let err = SlcError::SentenceTooLong { len: 120, max: 100 };
        assert_eq!(err.to_string(), "Sentence too long: 120 bytes (max 100)");

        let err = invalid_config!("serial.baud_rate", "must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: serial.baud_rate: must be greater than zero"
        );

        let err = config_error!("missing {}", "file");
        assert_eq!(err.to_string(), "Configuration error: missing file");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SlcError = io.into();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
