//! Scriptable in-process peer service.

use crate::lock;
use bridge_traits::error::Result;
use bridge_traits::{
    ConnectionState, DeviceInfo, DisconnectCause, ForeignException, InteractionCallback,
    InteractionSurface, PeerService, ServiceConfiguration, StateListener,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use tracing::debug;

/// How the peer answers the next user-interaction resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionScript {
    /// Report completion and clear the pending flag.
    Finish,
    /// Report a foreign exception with this description.
    Fail(String),
    /// Keep the callback without ever calling it.
    Ignore,
    /// Drop the callback without calling it.
    Discard,
}

/// Peer service living in the same process.
///
/// State changes are pushed to the installed listener on the thread that
/// calls [`push_state`](Self::push_state); interaction results are delivered
/// from a separate thread.
pub struct LoopbackPeer {
    state: Mutex<ConnectionState>,
    listener: Mutex<Option<StateListener>>,
    pending_interaction: AtomicBool,
    accept_sync: AtomicBool,
    interaction_script: Mutex<InteractionScript>,
    parked_interaction: Mutex<Option<InteractionCallback>>,
    configuration: Mutex<Option<ServiceConfiguration>>,
    events_sent: AtomicUsize,
    syncs_triggered: AtomicUsize,
    surfaces_received: AtomicUsize,
}

impl LoopbackPeer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::initial()),
            listener: Mutex::new(None),
            pending_interaction: AtomicBool::new(false),
            accept_sync: AtomicBool::new(true),
            interaction_script: Mutex::new(InteractionScript::Finish),
            parked_interaction: Mutex::new(None),
            configuration: Mutex::new(None),
            events_sent: AtomicUsize::new(0),
            syncs_triggered: AtomicUsize::new(0),
            surfaces_received: AtomicUsize::new(0),
        }
    }

    /// Record a new state and push it to the listener, if any.
    pub fn push_state(&self, state: ConnectionState) {
        *lock(&self.state) = state.clone();
        let listener = lock(&self.listener).clone();

        match listener {
            Some(listener) => {
                debug!(state = state.name(), "Loopback peer pushing state");
                listener(state);
            }
            None => debug!(state = state.name(), "Loopback peer state changed without listener"),
        }
    }

    /// Push `Connected` for `device_info`.
    pub fn connect(&self, device_info: DeviceInfo, is_synced: bool) {
        self.push_state(ConnectionState::Connected {
            device_info,
            is_synced,
        });
    }

    /// Push `Disconnected` with a remote cause.
    pub fn disconnect(&self, reason: impl Into<String>) {
        self.push_state(ConnectionState::Disconnected {
            cause: Some(DisconnectCause::Remote(reason.into())),
        });
    }

    pub fn set_pending_interaction(&self, pending: bool) {
        self.pending_interaction.store(pending, Ordering::SeqCst);
    }

    pub fn set_accept_sync(&self, accept: bool) {
        self.accept_sync.store(accept, Ordering::SeqCst);
    }

    pub fn script_interaction(&self, script: InteractionScript) {
        *lock(&self.interaction_script) = script;
    }

    /// Whether an ignored interaction callback is still held.
    pub fn has_parked_interaction(&self) -> bool {
        lock(&self.parked_interaction).is_some()
    }

    pub fn has_listener(&self) -> bool {
        lock(&self.listener).is_some()
    }

    pub fn events_sent(&self) -> usize {
        self.events_sent.load(Ordering::SeqCst)
    }

    pub fn syncs_triggered(&self) -> usize {
        self.syncs_triggered.load(Ordering::SeqCst)
    }

    pub fn surfaces_received(&self) -> usize {
        self.surfaces_received.load(Ordering::SeqCst)
    }

    /// Configuration received with the most recent bind.
    pub fn configuration(&self) -> Option<ServiceConfiguration> {
        *lock(&self.configuration)
    }

    /// Service started by a bind: starts connecting to the device.
    pub(crate) fn on_bound(&self, configuration: ServiceConfiguration) {
        *lock(&self.configuration) = Some(configuration);
        *lock(&self.state) = ConnectionState::Connecting;
    }

    /// Service destroyed by unbind or crash.
    pub(crate) fn on_destroyed(&self) {
        *lock(&self.state) = ConnectionState::initial();
        lock(&self.listener).take();
        lock(&self.parked_interaction).take();
        self.pending_interaction.store(false, Ordering::SeqCst);
    }
}

impl Default for LoopbackPeer {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerService for LoopbackPeer {
    fn state(&self) -> Result<ConnectionState> {
        Ok(lock(&self.state).clone())
    }

    fn has_user_interaction_request(&self) -> Result<bool> {
        Ok(self.pending_interaction.load(Ordering::SeqCst))
    }

    fn try_send_event(&self) -> Result<()> {
        self.events_sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn try_trigger_sync(&self) -> Result<bool> {
        let accepted = self.accept_sync.load(Ordering::SeqCst);
        if accepted {
            self.syncs_triggered.fetch_add(1, Ordering::SeqCst);
        }
        Ok(accepted)
    }

    fn set_state_listener(&self, listener: StateListener) -> Result<()> {
        *lock(&self.listener) = Some(listener);
        Ok(())
    }

    fn unset_state_listener(&self) -> Result<()> {
        lock(&self.listener).take();
        Ok(())
    }

    fn resolve_user_interaction_request(
        &self,
        _surface: InteractionSurface,
        callback: InteractionCallback,
    ) -> Result<()> {
        self.surfaces_received.fetch_add(1, Ordering::SeqCst);
        let script = lock(&self.interaction_script).clone();

        match script {
            InteractionScript::Finish => {
                self.pending_interaction.store(false, Ordering::SeqCst);
                thread::spawn(move || (callback.on_finished)());
            }
            InteractionScript::Fail(description) => {
                thread::spawn(move || {
                    (callback.on_failed)(Box::new(ForeignException::new(description)))
                });
            }
            InteractionScript::Ignore => {
                debug!("Loopback peer ignoring interaction request");
                *lock(&self.parked_interaction) = Some(callback);
            }
            InteractionScript::Discard => {
                debug!("Loopback peer discarding interaction callback");
            }
        }

        Ok(())
    }
}
