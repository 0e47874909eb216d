use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Foreign call raised an exception: {0}")]
    ForeignException(String),

    #[error("Unexpected foreign value: {0}")]
    UnexpectedValue(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// An exception raised on the foreign side of the boundary and handed back
/// through a failure callback.
///
/// Rendering the exception is itself a foreign call and may fail, hence
/// `describe` is fallible.
pub trait Throwable: Send + Sync + std::fmt::Debug {
    /// Diagnostic rendering of the exception (the foreign `toString()`).
    fn describe(&self) -> Result<String>;
}

/// Plain throwable carrying an already-rendered diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignException {
    description: String,
}

impl ForeignException {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

impl Throwable for ForeignException {
    fn describe(&self) -> Result<String> {
        Ok(self.description.clone())
    }
}
