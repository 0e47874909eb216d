use bridge_traits::BridgeError;
use core_correlation::CorrelationError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    #[error("Peer service is already bound or binding")]
    AlreadyBound,

    #[error("Peer service is not bound")]
    NotBound,

    /// The platform bind primitive refused the request synchronously.
    #[error("Platform refused to bind the peer service")]
    BindFailed,

    #[error("A user interaction request is already being resolved")]
    InteractionInProgress,

    #[error("Failed to resolve user interaction request: {0}")]
    Interaction(#[source] CorrelationError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl ConnectionError {
    /// True for host environment errors that must not be retried.
    pub fn is_not_available(&self) -> bool {
        match self {
            ConnectionError::Bridge(BridgeError::NotAvailable(_)) => true,
            ConnectionError::Interaction(err) => err.is_not_available(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConnectionError>;
