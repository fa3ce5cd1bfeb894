use thiserror::Error;

/// Errors surfaced to callers of the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid field '{field}': {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("{service} unavailable: {message}")]
    Dependency {
        service: &'static str,
        message: String,
    },

    #[error("registry error: {0}")]
    Registry(String),
}

impl RelayError {
    /// True for errors caused by the caller's input (4xx, never retried).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RelayError::MissingField(_)
                | RelayError::InvalidField { .. }
                | RelayError::PayloadTooLarge { .. }
        )
    }

    /// The request field the error refers to, if any.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            RelayError::MissingField(field) | RelayError::InvalidField { field, .. } => {
                Some(field)
            }
            _ => None,
        }
    }
}

/// Errors from the CI trigger and query APIs.
#[derive(Debug, Clone, Error)]
pub enum CiError {
    #[error("CI request timed out")]
    Timeout,

    #[error("CI unreachable: {0}")]
    Unavailable(String),

    #[error("CI rejected request with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("failed to decode CI response: {0}")]
    Decode(String),
}

impl CiError {
    /// Timeouts, transport failures and 5xx responses may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            CiError::Timeout | CiError::Unavailable(_) => true,
            CiError::Rejected { status, .. } => *status >= 500 || *status == 429,
            CiError::Decode(_) => false,
        }
    }
}

/// Errors from the asset store.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("upload timed out")]
    Timeout,

    #[error("storage unreachable: {0}")]
    Unavailable(String),

    #[error("storage rejected upload with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid storage response: {0}")]
    Decode(String),
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Timeout | StorageError::Unavailable(_) => true,
            StorageError::Rejected { status, .. } => *status >= 500 || *status == 429,
            StorageError::Decode(_) => false,
        }
    }
}

/// Errors from registry store operations (used by trait definitions in buildrelay-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<RepositoryError> for RelayError {
    fn from(e: RepositoryError) -> Self {
        RelayError::Registry(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_display_names_field() {
        let err = RelayError::MissingField("package_id");
        assert_eq!(err.to_string(), "missing required field 'package_id'");
        assert_eq!(err.field(), Some("package_id"));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_dependency_is_not_client_error() {
        let err = RelayError::Dependency {
            service: "CI",
            message: "HTTP 502".to_string(),
        };
        assert!(!err.is_client_error());
        assert!(err.field().is_none());
        assert!(err.to_string().contains("HTTP 502"));
    }

    #[test]
    fn test_ci_retryable() {
        assert!(CiError::Timeout.is_retryable());
        assert!(CiError::Unavailable("dns".to_string()).is_retryable());
        assert!(CiError::Rejected { status: 503, message: String::new() }.is_retryable());
        assert!(!CiError::Rejected { status: 422, message: String::new() }.is_retryable());
        assert!(!CiError::Decode("bad json".to_string()).is_retryable());
    }
}
