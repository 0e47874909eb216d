use bridge_traits::BridgeError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CorrelationError {
    /// The synchronous part of issuing the foreign call failed; no callback
    /// was awaited.
    #[error("Failed to issue {operation}: {source}")]
    Issue {
        operation: String,
        #[source]
        source: BridgeError,
    },

    /// The foreign side reported a throwable through its callback.
    #[error("{operation} failed due to foreign exception: {message}")]
    Foreign { operation: String, message: String },

    /// The foreign side reported a result the caller cannot accept.
    #[error("{operation} rejected: {message}")]
    Rejected { operation: String, message: String },

    /// Every completer was dropped without delivering a result.
    #[error("{operation} was abandoned before a result was delivered")]
    Abandoned { operation: String },

    #[error("{operation} timed out after {after:?}")]
    TimedOut { operation: String, after: Duration },
}

impl CorrelationError {
    pub fn operation(&self) -> &str {
        match self {
            CorrelationError::Issue { operation, .. }
            | CorrelationError::Foreign { operation, .. }
            | CorrelationError::Rejected { operation, .. }
            | CorrelationError::Abandoned { operation }
            | CorrelationError::TimedOut { operation, .. } => operation,
        }
    }

    /// True for host environment errors that must not be retried.
    pub fn is_not_available(&self) -> bool {
        matches!(
            self,
            CorrelationError::Issue {
                source: BridgeError::NotAvailable(_),
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, CorrelationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_operation() {
        let err = CorrelationError::TimedOut {
            operation: "request_permissions".to_string(),
            after: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "request_permissions timed out after 5s");
        assert_eq!(err.operation(), "request_permissions");
    }

    #[test]
    fn test_not_available_detection() {
        let err = CorrelationError::Issue {
            operation: "inject_interaction_surface".to_string(),
            source: BridgeError::NotAvailable("editor".to_string()),
        };
        assert!(err.is_not_available());

        let err = CorrelationError::Abandoned {
            operation: "inject_interaction_surface".to_string(),
        };
        assert!(!err.is_not_available());
    }
}
