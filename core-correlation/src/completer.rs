//! Single-resolution handle handed to foreign callbacks.

use crate::error::{CorrelationError, Result};
use bridge_traits::{ExecutionContext, Throwable};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Identifies one correlated request in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Inner<T> {
    id: RequestId,
    operation: String,
    sender: Mutex<Option<oneshot::Sender<Result<T>>>>,
    context: Option<Arc<dyn ExecutionContext>>,
}

/// Resolves a pending request at most once.
///
/// Clones share the same request; whichever clone completes first wins and
/// every later completion returns `false`. Dropping every clone without
/// completing fails the request with [`CorrelationError::Abandoned`].
///
/// When created with an execution context, the result is handed to the
/// awaiting future from that context.
pub struct Completer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Completer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("id", &self.inner.id)
            .field("operation", &self.inner.operation)
            .field("completed", &self.is_completed())
            .finish()
    }
}

impl<T> Completer<T> {
    pub fn id(&self) -> RequestId {
        self.inner.id
    }

    pub fn operation(&self) -> &str {
        &self.inner.operation
    }

    /// Returns `true` once any clone has completed (or the request was
    /// disarmed after a synchronous issue failure).
    pub fn is_completed(&self) -> bool {
        self.inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    fn take_sender(&self) -> Option<oneshot::Sender<Result<T>>> {
        self.inner
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl<T: Send + 'static> Completer<T> {
    pub(crate) fn new(
        operation: impl Into<String>,
        context: Option<Arc<dyn ExecutionContext>>,
    ) -> (Self, oneshot::Receiver<Result<T>>) {
        let (sender, receiver) = oneshot::channel();
        let completer = Self {
            inner: Arc::new(Inner {
                id: RequestId::new(),
                operation: operation.into(),
                sender: Mutex::new(Some(sender)),
                context,
            }),
        };
        (completer, receiver)
    }

    /// Deliver the success value. Returns `false` if already completed.
    pub fn resolve(&self, value: T) -> bool {
        self.complete(Ok(value))
    }

    /// Fail the request. Returns `false` if already completed.
    pub fn reject(&self, error: CorrelationError) -> bool {
        self.complete(Err(error))
    }

    /// Fail the request with a local diagnostic message.
    pub fn reject_with(&self, message: impl Into<String>) -> bool {
        let error = CorrelationError::Rejected {
            operation: self.inner.operation.clone(),
            message: message.into(),
        };
        self.complete(Err(error))
    }

    /// Fail the request with a throwable reported by the foreign side.
    ///
    /// If the throwable cannot describe itself the request still fails, with
    /// an empty message.
    pub fn reject_throwable(&self, throwable: &dyn Throwable) -> bool {
        let message = describe_throwable(&self.inner.operation, throwable);
        let error = CorrelationError::Foreign {
            operation: self.inner.operation.clone(),
            message,
        };
        self.complete(Err(error))
    }

    /// Drop the sender without delivering anything, so later callbacks are
    /// no-ops.
    pub(crate) fn disarm(&self) {
        self.take_sender();
    }

    fn complete(&self, outcome: Result<T>) -> bool {
        let Some(sender) = self.take_sender() else {
            debug!(
                request_id = %self.inner.id,
                operation = %self.inner.operation,
                "Ignoring repeated completion"
            );
            return false;
        };

        match &self.inner.context {
            None => deliver(sender, outcome, self.inner.id),
            Some(context) => {
                let id = self.inner.id;
                // A context that refuses the task drops it, and with it the
                // sender; the awaiting future then observes `Abandoned`.
                if let Err(err) = context.dispatch(Box::new(move || deliver(sender, outcome, id))) {
                    warn!(
                        request_id = %id,
                        operation = %self.inner.operation,
                        error = %err,
                        "Execution context rejected completion"
                    );
                }
            }
        }

        true
    }
}

fn deliver<T>(sender: oneshot::Sender<Result<T>>, outcome: Result<T>, id: RequestId) {
    if sender.send(outcome).is_err() {
        debug!(request_id = %id, "Requester no longer waiting; result dropped");
    }
}

/// Message of a foreign throwable, or `""` if describing it fails.
pub fn describe_throwable(operation: &str, throwable: &dyn Throwable) -> String {
    match throwable.describe() {
        Ok(message) => message,
        Err(err) => {
            error!(
                operation = %operation,
                error = %err,
                "Failed to describe foreign exception"
            );
            String::new()
        }
    }
}
