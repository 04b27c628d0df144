//! SBI Error Types

use thiserror::Error;

/// SBI Error type
#[derive(Error, Debug)]
pub enum SbiError {
    /// A fixed-capacity pool has no free slot
    #[error("Pool exhausted: {0}")]
    PoolExhausted(&'static str),

    /// A bounded list is already full
    #[error("Capacity exceeded: {what} (max {max})")]
    CapacityExceeded { what: &'static str, max: usize },

    /// Lookup miss or stale handle
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed or inconsistent input
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    /// No timer could be allocated
    #[error("Timer unavailable")]
    TimerUnavailable,

    /// The request builder returned nothing
    #[error("Request build failed: {0}")]
    BuildFailed(String),

    /// The context was already finalized
    #[error("SBI context not initialized")]
    NotInitialized,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP error with status code
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },
}

impl SbiError {
    /// Create an HTTP error from status code
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self::HttpError {
            status,
            message: message.into(),
        }
    }

    /// HTTP status code used when the error is reported to a peer
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpError { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            Self::Conflict(_) => Some(409),
            Self::InvalidParam(_) | Self::SerializationError(_) => Some(400),
            Self::PoolExhausted(_) | Self::CapacityExceeded { .. } | Self::TimerUnavailable => {
                Some(503)
            }
            Self::BuildFailed(_) => Some(500),
            _ => None,
        }
    }

    /// Resource exhaustion: the caller must back off instead of retrying
    pub fn is_capacity(&self) -> bool {
        matches!(
            self,
            Self::PoolExhausted(_) | Self::CapacityExceeded { .. } | Self::TimerUnavailable
        )
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::HttpError { status: 503, .. } | Self::HttpError { status: 429, .. }
        )
    }
}

/// Result type for SBI operations
pub type SbiResult<T> = Result<T, SbiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_code() {
        let err = SbiError::from_status(404, "Not found");
        assert_eq!(err.status_code(), Some(404));

        let err = SbiError::NotFound("resource".to_string());
        assert_eq!(err.status_code(), Some(404));

        assert_eq!(SbiError::PoolExhausted("xact").status_code(), Some(503));
        assert_eq!(SbiError::NotInitialized.status_code(), None);
    }

    #[test]
    fn test_capacity_errors_are_not_retryable() {
        let err = SbiError::CapacityExceeded {
            what: "allowed NF types",
            max: 16,
        };
        assert!(err.is_capacity());
        assert!(!err.is_retryable());
        assert!(SbiError::from_status(503, "busy").is_retryable());
        assert!(!SbiError::NotFound("test".to_string()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = SbiError::CapacityExceeded {
            what: "service versions",
            max: 8,
        };
        assert_eq!(err.to_string(), "Capacity exceeded: service versions (max 8)");
    }
}
