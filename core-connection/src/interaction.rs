//! Interaction Resolver
//!
//! Satisfies a user-interaction request raised by the peer (for example a
//! device association consent). Two correlated calls are chained:
//!
//! 1. `inject_interaction_surface` runs on the activity's UI thread and
//!    yields the surface;
//! 2. `resolve_user_interaction_request` hands the surface back to the peer,
//!    which reports completion through an [`InteractionCallback`].
//!
//! The outer call is only issued once the inner one succeeded.

use crate::error::{ConnectionError, Result};
use bridge_traits::{
    ActivityContext, BridgeError, ForeignException, InteractionCallback, InteractionSurface,
    PeerService,
};
use core_correlation::Correlator;
use core_runtime::events::{ClientEvent, EventBus, InteractionEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const INJECT_OPERATION: &str = "inject_interaction_surface";
const RESOLVE_OPERATION: &str = "resolve_user_interaction_request";

/// Resolves peer interaction requests, one at a time.
pub struct InteractionResolver {
    correlator: Correlator,
    in_flight: AtomicBool,
    event_bus: Option<EventBus>,
}

impl InteractionResolver {
    pub fn new(correlator: Correlator) -> Self {
        Self {
            correlator,
            in_flight: AtomicBool::new(false),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Inject the interaction surface into `activity` and let `peer`
    /// complete the interaction.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::InteractionInProgress`] if another resolution is
    ///   still running
    /// - [`ConnectionError::Interaction`] if either correlated step fails
    #[instrument(skip_all)]
    pub async fn resolve(
        &self,
        peer: Arc<dyn PeerService>,
        activity: Arc<dyn ActivityContext>,
    ) -> Result<()> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            warn!("Interaction resolution already in progress");
            return Err(ConnectionError::InteractionInProgress);
        };

        self.emit(InteractionEvent::Started);

        match self.run(peer, activity).await {
            Ok(()) => {
                info!("User interaction request resolved");
                self.emit(InteractionEvent::Resolved);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "User interaction request failed");
                self.emit(InteractionEvent::Failed {
                    message: err.to_string(),
                });
                Err(ConnectionError::Interaction(err))
            }
        }
    }

    async fn run(
        &self,
        peer: Arc<dyn PeerService>,
        activity: Arc<dyn ActivityContext>,
    ) -> core_correlation::Result<()> {
        let surface: InteractionSurface = self
            .correlator
            .invoke(INJECT_OPERATION, |completer| {
                let ui = Arc::clone(&activity);
                activity.dispatch(Box::new(move || {
                    match ui.inject_interaction_surface() {
                        Ok(surface) => {
                            completer.resolve(surface);
                        }
                        Err(BridgeError::ForeignException(message)) => {
                            completer.reject_throwable(&ForeignException::new(message));
                        }
                        Err(err) => {
                            completer.reject_with(err.to_string());
                        }
                    }
                }))
            })
            .await?;

        debug!(surface = ?surface, "Interaction surface injected");

        self.correlator
            .invoke(RESOLVE_OPERATION, move |completer| {
                let on_failed = completer.clone();
                let callback = InteractionCallback::new(
                    move || {
                        completer.resolve(());
                    },
                    move |throwable| {
                        on_failed.reject_throwable(&*throwable);
                    },
                );
                peer.resolve_user_interaction_request(surface, callback)
            })
            .await
    }

    fn emit(&self, event: InteractionEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(ClientEvent::Interaction(event)).ok();
        }
    }
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{ConnectionState, ExecutionContext, StateListener, Task, Throwable};
    use core_correlation::CorrelationError;
    use mockall::mock;
    use std::sync::Mutex;

    mock! {
        Peer {}
        impl PeerService for Peer {
            fn state(&self) -> BridgeResult<ConnectionState>;
            fn has_user_interaction_request(&self) -> BridgeResult<bool>;
            fn try_send_event(&self) -> BridgeResult<()>;
            fn try_trigger_sync(&self) -> BridgeResult<bool>;
            fn set_state_listener(&self, listener: StateListener) -> BridgeResult<()>;
            fn unset_state_listener(&self) -> BridgeResult<()>;
            fn resolve_user_interaction_request(
                &self,
                surface: InteractionSurface,
                callback: InteractionCallback,
            ) -> BridgeResult<()>;
        }
    }

    /// Runs tasks inline and injects a fixed result.
    struct InlineActivity {
        injection: BridgeResult<()>,
    }

    impl ExecutionContext for InlineActivity {
        fn dispatch(&self, task: Task) -> BridgeResult<()> {
            task();
            Ok(())
        }
    }

    impl ActivityContext for InlineActivity {
        fn inject_interaction_surface(&self) -> BridgeResult<InteractionSurface> {
            self.injection.clone().map(|()| InteractionSurface::new(7_u32))
        }
    }

    fn activity(injection: BridgeResult<()>) -> Arc<dyn ActivityContext> {
        Arc::new(InlineActivity { injection })
    }

    #[tokio::test]
    async fn test_resolves_when_peer_finishes() {
        let mut peer = MockPeer::new();
        peer.expect_resolve_user_interaction_request()
            .times(1)
            .returning(|surface, callback| {
                assert_eq!(surface.downcast_ref::<u32>(), Some(&7));
                std::thread::spawn(move || (callback.on_finished)());
                Ok(())
            });

        let resolver = InteractionResolver::new(Correlator::new());
        resolver
            .resolve(Arc::new(peer), activity(Ok(())))
            .await
            .unwrap();

        assert!(!resolver.is_in_flight());
    }

    #[tokio::test]
    async fn test_peer_failure_carries_diagnostic() {
        let mut peer = MockPeer::new();
        peer.expect_resolve_user_interaction_request()
            .returning(|_, callback| {
                let failure: Box<dyn Throwable> =
                    Box::new(ForeignException::new("AssociationCancelled"));
                (callback.on_failed)(failure);
                (callback.on_finished)();
                Ok(())
            });

        let resolver = InteractionResolver::new(Correlator::new());
        let err = resolver
            .resolve(Arc::new(peer), activity(Ok(())))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ConnectionError::Interaction(CorrelationError::Foreign {
                operation: RESOLVE_OPERATION.to_string(),
                message: "AssociationCancelled".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_injection_failure_skips_peer_call() {
        let mut peer = MockPeer::new();
        peer.expect_resolve_user_interaction_request().times(0);

        let resolver = InteractionResolver::new(Correlator::new());
        let err = resolver
            .resolve(
                Arc::new(peer),
                activity(Err(BridgeError::ForeignException(
                    "Activity is finishing".to_string(),
                ))),
            )
            .await
            .unwrap_err();

        match err {
            ConnectionError::Interaction(CorrelationError::Foreign { operation, message }) => {
                assert_eq!(operation, INJECT_OPERATION);
                assert_eq!(message, "Activity is finishing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_second_resolution_is_rejected_while_first_runs() {
        let held = Arc::new(Mutex::new(None::<InteractionCallback>));
        let stash = Arc::clone(&held);

        let mut peer = MockPeer::new();
        peer.expect_resolve_user_interaction_request()
            .times(1)
            .returning(move |_, callback| {
                *stash.lock().unwrap() = Some(callback);
                Ok(())
            });
        let peer: Arc<dyn PeerService> = Arc::new(peer);

        let resolver = Arc::new(InteractionResolver::new(Correlator::new()));
        let first = {
            let resolver = Arc::clone(&resolver);
            let peer = Arc::clone(&peer);
            tokio::spawn(async move { resolver.resolve(peer, activity(Ok(()))).await })
        };

        while held.lock().unwrap().is_none() {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            resolver.resolve(Arc::clone(&peer), activity(Ok(()))).await,
            Err(ConnectionError::InteractionInProgress)
        );

        let callback = held.lock().unwrap().take().unwrap();
        (callback.on_finished)();
        first.await.unwrap().unwrap();
        assert!(!resolver.is_in_flight());
    }

    #[tokio::test]
    async fn test_synchronous_peer_error_is_reported() {
        let mut peer = MockPeer::new();
        peer.expect_resolve_user_interaction_request()
            .returning(|_, _| Err(BridgeError::OperationFailed("binder died".to_string())));

        let bus = EventBus::new(8);
        let mut events = bus.subscribe();
        let resolver = InteractionResolver::new(Correlator::new()).with_event_bus(bus);

        let err = resolver
            .resolve(Arc::new(peer), activity(Ok(())))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ConnectionError::Interaction(CorrelationError::Issue { .. })
        ));
        assert_eq!(
            events.try_recv().unwrap(),
            ClientEvent::Interaction(InteractionEvent::Started)
        );
        assert!(matches!(
            events.try_recv().unwrap(),
            ClientEvent::Interaction(InteractionEvent::Failed { .. })
        ));
    }
}
