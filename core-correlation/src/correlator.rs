//! Turns callback-delivered foreign results into futures.

use crate::completer::Completer;
use crate::error::{CorrelationError, Result};
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::ExecutionContext;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};

/// Issues foreign calls and awaits their single callback.
///
/// A `Correlator` is cheap to clone and carries two policies shared by every
/// request it issues:
///
/// - an optional timeout (none by default, matching a peer that may take
///   arbitrarily long to answer a user prompt)
/// - an optional execution context onto which the result is handed before
///   the awaiting caller resumes
///
/// # Example
///
/// ```ignore
/// let correlator = Correlator::new().with_timeout(Some(Duration::from_secs(30)));
///
/// let granted = correlator
///     .invoke("request_permissions", |completer| {
///         prompter.request_permissions(&ids, Arc::new(move |id, outcome| {
///             completer.resolve((id, outcome));
///         }))
///     })
///     .await?;
/// ```
#[derive(Clone, Default)]
pub struct Correlator {
    timeout: Option<Duration>,
    context: Option<Arc<dyn ExecutionContext>>,
}

impl fmt::Debug for Correlator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Correlator")
            .field("timeout", &self.timeout)
            .field("has_context", &self.context.is_some())
            .finish()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Deliver results through `context` instead of the callback thread.
    pub fn with_context(mut self, context: Arc<dyn ExecutionContext>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Issue a foreign call and await the result its callback delivers.
    ///
    /// `issue` receives the [`Completer`] for this request and performs the
    /// synchronous part of the foreign call. The returned future:
    ///
    /// - fails immediately with [`CorrelationError::Issue`] if `issue`
    ///   returns an error; callbacks arriving afterwards are ignored
    /// - resolves with the first completion; later ones are ignored
    /// - fails with [`CorrelationError::Abandoned`] if every completer is
    ///   dropped without completing
    /// - fails with [`CorrelationError::TimedOut`] if a timeout is configured
    ///   and elapses first
    #[instrument(skip(self, issue), fields(request_id = tracing::field::Empty))]
    pub async fn invoke<T, F>(&self, operation: &str, issue: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Completer<T>) -> BridgeResult<()>,
    {
        let (completer, receiver) = Completer::new(operation, self.context.clone());
        tracing::Span::current().record("request_id", tracing::field::display(completer.id()));

        debug!("Issuing correlated request");
        if let Err(source) = issue(completer.clone()) {
            completer.disarm();
            warn!(error = %source, "Correlated request failed synchronously");
            return Err(CorrelationError::Issue {
                operation: operation.to_string(),
                source,
            });
        }
        drop(completer);

        self.await_outcome(operation, receiver).await
    }

    async fn await_outcome<T>(
        &self,
        operation: &str,
        receiver: oneshot::Receiver<Result<T>>,
    ) -> Result<T> {
        let delivered = match self.timeout {
            None => receiver.await,
            Some(after) => match tokio::time::timeout(after, receiver).await {
                Ok(delivered) => delivered,
                Err(_) => {
                    warn!(timeout = ?after, "Correlated request timed out");
                    return Err(CorrelationError::TimedOut {
                        operation: operation.to_string(),
                        after,
                    });
                }
            },
        };

        match delivered {
            Ok(outcome) => {
                debug!(success = outcome.is_ok(), "Correlated request completed");
                outcome
            }
            Err(_) => {
                warn!("Correlated request abandoned by foreign side");
                Err(CorrelationError::Abandoned {
                    operation: operation.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{BridgeError, ForeignException, InlineContext, Task};
    use mockall::mock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;

    mock! {
        Context {}
        impl ExecutionContext for Context {
            fn dispatch(&self, task: Task) -> BridgeResult<()>;
        }
    }

    #[tokio::test]
    async fn test_resolves_with_callback_value() {
        let correlator = Correlator::new();

        let value = correlator
            .invoke("echo", |completer| {
                thread::spawn(move || {
                    completer.resolve("pong".to_string());
                });
                Ok(())
            })
            .await;

        assert_eq!(value, Ok("pong".to_string()));
    }

    #[tokio::test]
    async fn test_second_callback_is_ignored() {
        let correlator = Correlator::new();
        let late = Arc::new(Mutex::new(None));
        let late_clone = Arc::clone(&late);

        let value = correlator
            .invoke("twice", move |completer| {
                assert!(completer.resolve(1u32));
                *late_clone.lock().unwrap() = Some(completer);
                Ok(())
            })
            .await;

        assert_eq!(value, Ok(1));
        let stored = late.lock().unwrap().take().unwrap();
        assert!(!stored.resolve(2));
    }

    #[tokio::test]
    async fn test_synchronous_failure_fails_immediately() {
        let correlator = Correlator::new();
        let stash = Arc::new(Mutex::new(None));
        let stash_clone = Arc::clone(&stash);

        let result: Result<()> = correlator
            .invoke("bind", move |completer| {
                *stash_clone.lock().unwrap() = Some(completer);
                Err(BridgeError::NotAvailable("not on device".to_string()))
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_not_available());

        let completer = stash.lock().unwrap().take().unwrap();
        assert!(!completer.resolve(()));
    }

    #[tokio::test]
    async fn test_foreign_exception_becomes_failure() {
        let correlator = Correlator::new();

        let result: Result<()> = correlator
            .invoke("inject", |completer| {
                completer.reject_throwable(&ForeignException::new("IllegalStateException"));
                Ok(())
            })
            .await;

        assert_eq!(
            result,
            Err(CorrelationError::Foreign {
                operation: "inject".to_string(),
                message: "IllegalStateException".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_dropped_completer_is_abandoned() {
        let correlator = Correlator::new();

        let result: Result<u8> = correlator.invoke("ignored", |_completer| Ok(())).await;

        assert_eq!(
            result,
            Err(CorrelationError::Abandoned {
                operation: "ignored".to_string()
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_elapses_and_late_callback_is_noop() {
        let correlator = Correlator::new().with_timeout(Some(Duration::from_secs(5)));
        let stash = Arc::new(Mutex::new(None));
        let stash_clone = Arc::clone(&stash);

        let result: Result<u8> = correlator
            .invoke("slow", move |completer| {
                *stash_clone.lock().unwrap() = Some(completer);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(CorrelationError::TimedOut { .. })));

        // Nobody is waiting any more; delivery is silently dropped.
        let completer = stash.lock().unwrap().take().unwrap();
        completer.resolve(7);
        assert!(completer.is_completed());
    }

    #[tokio::test]
    async fn test_result_is_delivered_through_context() {
        let dispatched = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&dispatched);
        let mut context = MockContext::new();
        context.expect_dispatch().times(1).returning(move |task| {
            counter.fetch_add(1, Ordering::SeqCst);
            task();
            Ok(())
        });

        let correlator = Correlator::new().with_context(Arc::new(context));
        let value = correlator
            .invoke("on_ui", |completer| {
                completer.resolve(9u8);
                Ok(())
            })
            .await;

        assert_eq!(value, Ok(9));
        assert_eq!(dispatched.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejecting_context_abandons_request() {
        let mut context = MockContext::new();
        context
            .expect_dispatch()
            .returning(|_task| Err(BridgeError::OperationFailed("looper quit".to_string())));

        let correlator = Correlator::new().with_context(Arc::new(context));
        let result = correlator
            .invoke("on_ui", |completer| {
                completer.resolve(1u8);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(CorrelationError::Abandoned { .. })));
    }

    #[tokio::test]
    async fn test_inline_context_delivers() {
        let correlator = Correlator::new().with_context(Arc::new(InlineContext));
        let value = correlator
            .invoke("inline", |completer| {
                completer.resolve(true);
                Ok(())
            })
            .await;
        assert_eq!(value, Ok(true));
    }
}
