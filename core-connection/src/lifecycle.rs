//! Connection Lifecycle Manager
//!
//! Owns the bound peer handle and the bind/unbind transitions:
//!
//! ```text
//! Unbound --bind()--> Binding --on_connected--> Bound --unbind()--> Unbound
//!                        |                        |
//!                        +-- bind refused --------+-- peer crash --> Unbound
//! ```
//!
//! Every binding attempt gets a new generation number. Callbacks carry the
//! generation they were created for and are ignored once that binding has
//! been unbound or superseded.

use crate::error::{ConnectionError, Result};
use crate::mirror::StateMirror;
use bridge_traits::{
    ConnectionState, DisconnectCause, PeerService, ServiceBinder, ServiceConfiguration,
    ServiceConnection, StateListener,
};
use core_runtime::events::{ClientEvent, ConnectionEvent, EventBus, LifecycleEvent};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tracing::{debug, error, info, instrument, warn};

enum Phase {
    Unbound,
    Binding {
        generation: u64,
    },
    Bound {
        generation: u64,
        peer: Arc<dyn PeerService>,
    },
}

impl Phase {
    fn generation(&self) -> Option<u64> {
        match self {
            Phase::Unbound => None,
            Phase::Binding { generation } | Phase::Bound { generation, .. } => Some(*generation),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Phase::Unbound => "unbound",
            Phase::Binding { .. } => "binding",
            Phase::Bound { .. } => "bound",
        }
    }
}

/// Pushes received for the current binding. Guards the initial snapshot so
/// it never overwrites a newer pushed state.
#[derive(Default)]
struct Delivery {
    generation: u64,
    pushes: u64,
}

struct Shared {
    phase: Mutex<Phase>,
    delivery: Mutex<Delivery>,
    mirror: Arc<StateMirror>,
    event_bus: Option<EventBus>,
}

impl Shared {
    fn is_current(&self, generation: u64) -> bool {
        matches!(
            *lock(&self.phase),
            Phase::Bound { generation: bound, .. } if bound == generation
        )
    }

    fn emit(&self, event: ClientEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(event).ok();
        }
    }

    /// Record `state` in the mirror. Callers hold `delivery`, which keeps the
    /// mirror in push order; listeners run later in `notify_listeners`.
    fn record(&self, state: ConnectionState) {
        self.mirror.record(state.clone());
        self.emit(ClientEvent::Connection(ConnectionEvent::StateChanged {
            state,
        }));
    }

    fn notify_listeners(&self) {
        self.mirror.notify_listeners();
    }

    fn handle_connected(self: &Arc<Self>, generation: u64, peer: Arc<dyn PeerService>) {
        {
            let mut phase = lock(&self.phase);
            match *phase {
                Phase::Binding { generation: binding } if binding == generation => {}
                ref other => {
                    debug!(
                        generation,
                        phase = other.name(),
                        "Ignoring connection callback for stale binding"
                    );
                    return;
                }
            }
            *phase = Phase::Bound {
                generation,
                peer: Arc::clone(&peer),
            };
        }

        *lock(&self.delivery) = Delivery {
            generation,
            pushes: 0,
        };

        let weak = Arc::downgrade(self);
        let listener: StateListener = Arc::new(move |state| {
            if let Some(shared) = weak.upgrade() {
                shared.handle_state(generation, state);
            }
        });
        if let Err(err) = peer.set_state_listener(listener) {
            error!(generation, error = %err, "Failed to install state listener");
        }

        match peer.state() {
            Ok(state) => {
                let delivery = lock(&self.delivery);
                if delivery.generation == generation && delivery.pushes == 0 && self.is_current(generation) {
                    self.record(state);
                }
            }
            Err(err) => warn!(generation, error = %err, "Failed to read initial peer state"),
        }

        // Under the phase lock so a crash cannot slip in between the check
        // and the event.
        {
            let phase = lock(&self.phase);
            if matches!(*phase, Phase::Bound { generation: bound, .. } if bound == generation) {
                info!(generation, "Peer service bound");
                self.emit(ClientEvent::Lifecycle(LifecycleEvent::Bound { generation }));
            } else {
                debug!(generation, "Binding ended before connection completed");
            }
        }

        self.notify_listeners();
    }

    fn handle_state(&self, generation: u64, state: ConnectionState) {
        {
            let mut delivery = lock(&self.delivery);
            if delivery.generation != generation || !self.is_current(generation) {
                debug!(
                    generation,
                    state = state.name(),
                    "Ignoring state push from stale binding"
                );
                return;
            }

            delivery.pushes += 1;
            self.record(state);
        }

        self.notify_listeners();
    }

    fn handle_disconnected(&self, generation: u64) {
        {
            let mut phase = lock(&self.phase);
            if phase.generation() != Some(generation) {
                debug!(generation, "Ignoring disconnect callback for stale binding");
                return;
            }
            *phase = Phase::Unbound;
        }

        error!(generation, "Peer service terminated unexpectedly");

        {
            let mut delivery = lock(&self.delivery);
            delivery.generation = 0;
            self.record(ConnectionState::Disconnected {
                cause: Some(DisconnectCause::PeerTerminated),
            });
        }
        self.emit(ClientEvent::Lifecycle(LifecycleEvent::PeerTerminated {
            generation,
        }));

        self.notify_listeners();
    }
}

/// Binds and unbinds the peer service and keeps the [`StateMirror`] fed.
pub struct ConnectionLifecycle {
    binder: Arc<dyn ServiceBinder>,
    shared: Arc<Shared>,
    next_generation: AtomicU64,
}

impl ConnectionLifecycle {
    pub fn new(binder: Arc<dyn ServiceBinder>, mirror: Arc<StateMirror>) -> Self {
        Self::with_event_bus(binder, mirror, None)
    }

    pub fn with_event_bus(
        binder: Arc<dyn ServiceBinder>,
        mirror: Arc<StateMirror>,
        event_bus: Option<EventBus>,
    ) -> Self {
        Self {
            binder,
            shared: Arc::new(Shared {
                phase: Mutex::new(Phase::Unbound),
                delivery: Mutex::new(Delivery::default()),
                mirror,
                event_bus,
            }),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn mirror(&self) -> &Arc<StateMirror> {
        &self.shared.mirror
    }

    /// Request a binding with `configuration`.
    ///
    /// Returns once the platform accepted the request; the peer handle is
    /// delivered later (or already was) through the connection callback.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::AlreadyBound`] unless currently unbound
    /// - [`ConnectionError::BindFailed`] if the platform refuses; not retried
    /// - [`ConnectionError::Bridge`] if the bind primitive itself fails
    #[instrument(skip(self))]
    pub fn bind(&self, configuration: &ServiceConfiguration) -> Result<()> {
        let generation = {
            let mut phase = lock(&self.shared.phase);
            if !matches!(*phase, Phase::Unbound) {
                warn!(phase = phase.name(), "Bind requested while not unbound");
                return Err(ConnectionError::AlreadyBound);
            }
            let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
            *phase = Phase::Binding { generation };
            generation
        };

        info!(generation, "Binding peer service");
        self.shared
            .emit(ClientEvent::Lifecycle(LifecycleEvent::Binding {
                generation,
                normalization_delay_ms: configuration.normalization_delay_ms,
            }));

        let on_connected = Arc::downgrade(&self.shared);
        let on_disconnected: Weak<Shared> = Arc::downgrade(&self.shared);
        let connection = ServiceConnection::new(
            move |peer| {
                if let Some(shared) = on_connected.upgrade() {
                    shared.handle_connected(generation, peer);
                }
            },
            move || {
                if let Some(shared) = on_disconnected.upgrade() {
                    shared.handle_disconnected(generation);
                }
            },
        );

        let failure = match self.binder.bind_service(configuration, connection) {
            Ok(true) => return Ok(()),
            Ok(false) => ConnectionError::BindFailed,
            Err(err) => ConnectionError::Bridge(err),
        };

        self.reset_if_current(generation);
        error!(generation, error = %failure, "Failed to bind peer service");
        self.shared
            .emit(ClientEvent::Lifecycle(LifecycleEvent::BindFailed {
                message: failure.to_string(),
            }));
        Err(failure)
    }

    /// Release the binding. Idempotent.
    ///
    /// The state listener is removed from the peer before the platform
    /// unbind primitive runs. The mirrored state is left as last reported.
    #[instrument(skip(self))]
    pub fn unbind(&self) -> Result<()> {
        let previous = std::mem::replace(&mut *lock(&self.shared.phase), Phase::Unbound);

        let generation = match previous {
            Phase::Unbound => {
                debug!("Unbind requested while already unbound");
                return Ok(());
            }
            Phase::Binding { generation } => generation,
            Phase::Bound { generation, peer } => {
                if let Err(err) = peer.unset_state_listener() {
                    warn!(generation, error = %err, "Failed to remove state listener");
                }
                generation
            }
        };

        self.binder.unbind_service()?;

        info!(generation, "Peer service unbound");
        self.shared
            .emit(ClientEvent::Lifecycle(LifecycleEvent::Unbound { generation }));
        Ok(())
    }

    pub fn is_bound(&self) -> bool {
        matches!(*lock(&self.shared.phase), Phase::Bound { .. })
    }

    /// Generation of the current binding attempt, if any.
    pub fn generation(&self) -> Option<u64> {
        lock(&self.shared.phase).generation()
    }

    /// The bound peer handle, if any.
    pub fn peer(&self) -> Option<Arc<dyn PeerService>> {
        match &*lock(&self.shared.phase) {
            Phase::Bound { peer, .. } => Some(Arc::clone(peer)),
            _ => None,
        }
    }

    /// Ask the peer to emit an event. No-op when unbound.
    pub fn send_event(&self) -> Result<()> {
        match self.peer() {
            Some(peer) => Ok(peer.try_send_event()?),
            None => {
                debug!("send_event ignored: peer service not bound");
                Ok(())
            }
        }
    }

    /// Ask the peer to resynchronise. `false` when unbound or declined.
    pub fn trigger_sync(&self) -> Result<bool> {
        match self.peer() {
            Some(peer) => Ok(peer.try_trigger_sync()?),
            None => {
                debug!("trigger_sync ignored: peer service not bound");
                Ok(false)
            }
        }
    }

    /// `false` when unbound.
    pub fn has_pending_interaction_request(&self) -> Result<bool> {
        match self.peer() {
            Some(peer) => Ok(peer.has_user_interaction_request()?),
            None => Ok(false),
        }
    }

    fn reset_if_current(&self, generation: u64) {
        let mut phase = lock(&self.shared.phase);
        if phase.generation() == Some(generation) {
            *phase = Phase::Unbound;
        }
    }
}

impl fmt::Debug for ConnectionLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = lock(&self.shared.phase);
        f.debug_struct("ConnectionLifecycle")
            .field("phase", &phase.name())
            .field("generation", &phase.generation())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
