//! Peer Service Abstraction
//!
//! The peer is the long-lived, out-of-process service that owns the BLE link to
//! the physical device. Once bound, the host hands the client an opaque handle
//! implementing [`PeerService`]; every call on it crosses the process boundary.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, Throwable};

/// Immutable metadata reported by the connected device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub local_name: String,
    pub hardware_revision: String,
    pub software_revision: String,
}

impl DeviceInfo {
    pub fn new(
        local_name: impl Into<String>,
        hardware_revision: impl Into<String>,
        software_revision: impl Into<String>,
    ) -> Self {
        Self {
            local_name: local_name.into(),
            hardware_revision: hardware_revision.into(),
            software_revision: software_revision.into(),
        }
    }
}

/// Why the peer is (or went) disconnected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum DisconnectCause {
    /// Error reported by the peer, rendered to its diagnostic string.
    Remote(String),
    /// The peer process died while bound. Synthesised locally by the client.
    PeerTerminated,
}

impl fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectCause::Remote(message) => write!(f, "{}", message),
            DisconnectCause::PeerTerminated => write!(f, "peer service terminated"),
        }
    }
}

/// Connection state as reported by the peer.
///
/// Exactly one variant is current at any instant. Only `Connected` exposes
/// device information and sync status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state")]
pub enum ConnectionState {
    Disconnected {
        cause: Option<DisconnectCause>,
    },
    Connecting,
    Connected {
        device_info: DeviceInfo,
        is_synced: bool,
    },
}

impl ConnectionState {
    /// Initial value before any successful bind.
    pub fn initial() -> Self {
        ConnectionState::Disconnected { cause: None }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }

    pub fn device_info(&self) -> Option<&DeviceInfo> {
        match self {
            ConnectionState::Connected { device_info, .. } => Some(device_info),
            _ => None,
        }
    }

    /// Short lowercase name, used in logs and events.
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected { .. } => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected { .. } => "connected",
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Push callback installed on the peer; invoked on whatever thread the peer's
/// interop layer chooses.
pub type StateListener = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// Opaque handle to a peer-side interaction surface (e.g. the injected
/// association fragment). Only the host bridge that created it can look
/// inside.
#[derive(Clone)]
pub struct InteractionSurface {
    inner: Arc<dyn Any + Send + Sync>,
}

impl InteractionSurface {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for InteractionSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionSurface").finish_non_exhaustive()
    }
}

/// Completion callbacks for a user-interaction request.
///
/// The peer is expected to invoke exactly one of them exactly once, but the
/// client tolerates repeated or mixed invocations.
#[derive(Clone)]
pub struct InteractionCallback {
    pub on_finished: Arc<dyn Fn() + Send + Sync>,
    pub on_failed: Arc<dyn Fn(Box<dyn Throwable>) + Send + Sync>,
}

impl InteractionCallback {
    pub fn new(
        on_finished: impl Fn() + Send + Sync + 'static,
        on_failed: impl Fn(Box<dyn Throwable>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_finished: Arc::new(on_finished),
            on_failed: Arc::new(on_failed),
        }
    }
}

impl fmt::Debug for InteractionCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractionCallback").finish_non_exhaustive()
    }
}

/// Handle to a bound peer service.
///
/// All methods are synchronous foreign calls; results that the peer produces
/// later are delivered through the callbacks passed in.
pub trait PeerService: Send + Sync {
    /// Current connection state as held by the peer.
    fn state(&self) -> Result<ConnectionState>;

    /// Whether the peer is waiting for a user interaction (e.g. consent).
    fn has_user_interaction_request(&self) -> Result<bool>;

    /// Ask the peer to emit an event to the device.
    fn try_send_event(&self) -> Result<()>;

    /// Ask the peer to resynchronise with the device. `false` means the peer
    /// declined.
    fn try_trigger_sync(&self) -> Result<bool>;

    /// Install the state-push callback, replacing any previous one.
    fn set_state_listener(&self, listener: StateListener) -> Result<()>;

    /// Remove the state-push callback.
    fn unset_state_listener(&self) -> Result<()>;

    /// Hand an interaction surface back to the peer. Completion is reported
    /// through `callback`.
    fn resolve_user_interaction_request(
        &self,
        surface: InteractionSurface,
        callback: InteractionCallback,
    ) -> Result<()>;
}
