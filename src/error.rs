use std::fmt;

use thiserror::Error;

/// Classified failure of a review operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    /// No response from the service (connection refused, DNS, timeout)
    #[error("review service is unreachable")]
    Unreachable,

    /// The service responded with an error
    #[error("{message}")]
    Remote { message: String },

    /// The service rejected the submitted input
    #[error("{message}")]
    Validation { message: String },

    #[error("review text must not be empty")]
    EmptyInput,

    /// A conflicting operation is already in flight
    #[error("operation already in progress")]
    Busy,

    #[error("{message}")]
    NotFound { message: String },
}

pub type Result<T> = std::result::Result<T, ReviewError>;

/// Store operation that produced a recorded error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Refresh,
    Submit,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self {
            Operation::Refresh => "load reviews",
            Operation::Submit => "analyze review",
            Operation::Delete => "delete review",
        };
        f.write_str(action)
    }
}

/// Error recorded by the store along with the operation that failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    pub operation: Operation,
    pub error: ReviewError,
}

impl LastError {
    pub fn new(operation: Operation, error: ReviewError) -> Self {
        Self { operation, error }
    }

    /// Message shown to the user; `None` for errors the UI only disables on
    pub fn user_message(&self, service_url: &str) -> Option<String> {
        match &self.error {
            ReviewError::Busy => None,
            ReviewError::Unreachable => Some(format!(
                "The review service is not running. Start it and make sure it is reachable at {}",
                service_url
            )),
            ReviewError::EmptyInput => Some("Please enter review text".to_string()),
            other => Some(format!("Failed to {}: {}", self.operation, other)),
        }
    }
}
