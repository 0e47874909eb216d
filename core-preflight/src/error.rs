use bridge_traits::BridgeError;
use core_correlation::CorrelationError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PreflightError {
    /// A host primitive failed synchronously (e.g. not running on a
    /// supported host).
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Correlation(#[from] CorrelationError),
}

impl PreflightError {
    /// True for host environment errors that must not be retried.
    pub fn is_not_available(&self) -> bool {
        match self {
            PreflightError::Bridge(BridgeError::NotAvailable(_)) => true,
            PreflightError::Bridge(_) => false,
            PreflightError::Correlation(err) => err.is_not_available(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PreflightError>;
