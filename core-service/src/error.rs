use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Client initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Pre-flight error: {0}")]
    Preflight(#[from] core_preflight::PreflightError),

    #[error("Connection error: {0}")]
    Connection(#[from] core_connection::ConnectionError),
}

impl CoreError {
    /// True when the operation failed because the host environment does not
    /// support it. Such failures must not be retried.
    pub fn is_not_available(&self) -> bool {
        match self {
            CoreError::Preflight(err) => err.is_not_available(),
            CoreError::Connection(err) => err.is_not_available(),
            CoreError::InitializationFailed(_) | CoreError::Runtime(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
