//! Client façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (service binder,
//! permission prompter, platform facts, prerequisites probe) into the client
//! core and exposes the result as one [`SignalboyClient`]. Android hosts
//! inject their own adapters through [`ClientConfig`]; development builds
//! enable the `loopback` feature and call [`bootstrap_loopback`].
//!
//! ```no_run
//! # async fn example(config: core_service::ClientConfig) -> core_service::Result<()> {
//! use core_service::SignalboyClient;
//!
//! let client = SignalboyClient::new(config)?;
//! if client.verify_prerequisites()?.is_satisfied()
//!     && client.request_required_permissions().await?.is_fully_granted()
//! {
//!     client.bind()?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

pub use bridge_traits::{
    ActivityContext, ConnectionState, DeviceInfo, DisconnectCause, PermissionOutcome,
    PrerequisitesResult, ServiceConfiguration,
};
pub use core_connection::ListenerId;
pub use core_preflight::PermissionBatchResult;
pub use core_runtime::config::{ClientConfig, PermissionPolicy, PermissionTier};
pub use core_runtime::events::{ClientEvent, EventStream};

use bridge_traits::{PlatformInfo, StateListener};
use core_connection::{ConnectionError, ConnectionLifecycle, InteractionResolver, StateMirror};
use core_correlation::Correlator;
use core_preflight::{PermissionGate, PrerequisitesChecker};
use core_runtime::events::EventBus;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument};

#[cfg(feature = "loopback")]
use bridge_loopback::{
    LoopbackActivity, LoopbackBinder, LoopbackPeer, ScriptedPermissionPrompter,
    StaticPlatformInfo, StaticPrerequisitesProbe,
};

struct ClientInner {
    config: ClientConfig,
    event_bus: EventBus,
    mirror: Arc<StateMirror>,
    lifecycle: ConnectionLifecycle,
    permission_gate: PermissionGate,
    prerequisites: PrerequisitesChecker,
    interactions: InteractionResolver,
}

/// Primary façade exposed to host applications.
///
/// Cloning is cheap; clones share the same binding and state.
#[derive(Clone)]
pub struct SignalboyClient {
    inner: Arc<ClientInner>,
}

impl SignalboyClient {
    /// Create a client from a validated configuration. Nothing is bound yet.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let correlator = Correlator::new().with_timeout(config.request_timeout);
        let mirror = Arc::new(StateMirror::new());

        let lifecycle = ConnectionLifecycle::with_event_bus(
            Arc::clone(&config.binder),
            Arc::clone(&mirror),
            Some(event_bus.clone()),
        );
        let permission_gate = PermissionGate::new(
            Arc::clone(&config.permission_prompter),
            config.permission_policy.clone(),
            correlator.clone(),
        )
        .with_event_bus(event_bus.clone());
        let prerequisites = PrerequisitesChecker::new(Arc::clone(&config.prerequisites_probe));
        let interactions =
            InteractionResolver::new(correlator.with_context(Arc::clone(&config.callback_context)))
                .with_event_bus(event_bus.clone());

        debug!(config = ?config, "Signalboy client created");

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                event_bus,
                mirror,
                lifecycle,
                permission_gate,
                prerequisites,
                interactions,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // ---------------------------------------------------------------------
    // Bind surface
    // ---------------------------------------------------------------------

    /// Bind the peer service with the configured [`ServiceConfiguration`].
    pub fn bind(&self) -> Result<()> {
        self.bind_with(&self.inner.config.service_configuration)
    }

    /// Bind the peer service with an explicit configuration.
    pub fn bind_with(&self, configuration: &ServiceConfiguration) -> Result<()> {
        Ok(self.inner.lifecycle.bind(configuration)?)
    }

    /// Release the binding. Idempotent.
    pub fn unbind(&self) -> Result<()> {
        Ok(self.inner.lifecycle.unbind()?)
    }

    /// Whether a peer handle is currently held.
    ///
    /// After a peer crash this is `false` and [`current_state`] reports
    /// `Disconnected { cause: Some(DisconnectCause::PeerTerminated) }`.
    ///
    /// [`current_state`]: Self::current_state
    pub fn is_bound(&self) -> bool {
        self.inner.lifecycle.is_bound()
    }

    // ---------------------------------------------------------------------
    // State surface
    // ---------------------------------------------------------------------

    pub fn current_state(&self) -> ConnectionState {
        self.inner.mirror.current()
    }

    /// Register `callback` for every subsequent state change. Invoked on the
    /// configured callback execution context.
    pub fn on_connection_state_changed<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        let listener: StateListener = Arc::new(callback);
        self.inner
            .mirror
            .add_listener(listener, Arc::clone(&self.inner.config.callback_context))
    }

    pub fn remove_state_listener(&self, id: ListenerId) -> bool {
        self.inner.mirror.remove_listener(id)
    }

    /// Receiver for awaiting state transitions, e.g. with `wait_for`.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.mirror.subscribe()
    }

    /// Stream of every client event emitted from now on.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.inner.event_bus.subscribe())
    }

    // ---------------------------------------------------------------------
    // Command surface
    // ---------------------------------------------------------------------

    /// Ask the peer to emit an event. Silently ignored while unbound.
    pub fn send_event(&self) -> Result<()> {
        Ok(self.inner.lifecycle.send_event()?)
    }

    /// Ask the peer to resynchronise. `false` if the peer declined or no
    /// peer is bound.
    pub fn trigger_sync(&self) -> Result<bool> {
        Ok(self.inner.lifecycle.trigger_sync()?)
    }

    // ---------------------------------------------------------------------
    // Permission & prerequisites surface
    // ---------------------------------------------------------------------

    /// Request the runtime permissions the running platform version
    /// requires.
    ///
    /// Denial is reported in the result, not as an error.
    #[instrument(skip(self))]
    pub async fn request_required_permissions(&self) -> Result<PermissionBatchResult> {
        let platform: &dyn PlatformInfo = self.inner.config.platform_info.as_ref();
        let result = self.inner.permission_gate.request_for_platform(platform).await?;
        info!(
            fully_granted = result.is_fully_granted(),
            count = result.len(),
            "Required permissions resolved"
        );
        Ok(result)
    }

    /// Evaluate environment prerequisites. Unmet items keep the probe's
    /// evaluation order.
    pub fn verify_prerequisites(&self) -> Result<PrerequisitesResult> {
        Ok(self.inner.prerequisites.verify()?)
    }

    // ---------------------------------------------------------------------
    // Interaction surface
    // ---------------------------------------------------------------------

    /// Whether the peer waits for a user interaction. `false` while unbound.
    pub fn has_pending_interaction_request(&self) -> Result<bool> {
        Ok(self.inner.lifecycle.has_pending_interaction_request()?)
    }

    /// Resolve the peer's pending interaction request inside `activity`.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotBound` if no peer is bound
    /// - `ConnectionError::InteractionInProgress` if a resolution is running
    /// - `ConnectionError::Interaction` if injection or resolution failed
    #[instrument(skip_all)]
    pub async fn resolve_interaction_request(
        &self,
        activity: Arc<dyn ActivityContext>,
    ) -> Result<()> {
        let peer = self
            .inner
            .lifecycle
            .peer()
            .ok_or(ConnectionError::NotBound)?;
        Ok(self.inner.interactions.resolve(peer, activity).await?)
    }
}

impl std::fmt::Debug for SignalboyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalboyClient")
            .field("lifecycle", &self.inner.lifecycle)
            .field("state", &self.current_state())
            .finish()
    }
}

/// Loopback host adapters backing a client built by [`bootstrap_loopback`].
#[cfg(feature = "loopback")]
pub struct LoopbackHost {
    pub binder: Arc<LoopbackBinder>,
    pub prompter: Arc<ScriptedPermissionPrompter>,
    pub prerequisites: Arc<StaticPrerequisitesProbe>,
    pub activity: Arc<LoopbackActivity>,
}

#[cfg(feature = "loopback")]
impl LoopbackHost {
    pub fn peer(&self) -> &Arc<LoopbackPeer> {
        self.binder.peer()
    }
}

/// Convenience bootstrapper for development off-device.
///
/// Builds a client backed entirely by `bridge-loopback` adapters reporting
/// `api_level`. Connection-state listeners run on the loopback UI thread.
///
/// ```
/// # #[cfg(feature = "loopback")]
/// # fn example() -> core_service::Result<()> {
/// use core_service::bootstrap_loopback;
///
/// let (client, host) = bootstrap_loopback(33)?;
/// client.bind()?;
/// assert!(host.peer().has_listener());
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "loopback")]
pub fn bootstrap_loopback(api_level: u32) -> Result<(SignalboyClient, LoopbackHost)> {
    let activity = LoopbackActivity::new()
        .map(Arc::new)
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;
    let host = LoopbackHost {
        binder: Arc::new(LoopbackBinder::new(Arc::new(LoopbackPeer::new()))),
        prompter: Arc::new(ScriptedPermissionPrompter::new()),
        prerequisites: Arc::new(StaticPrerequisitesProbe::default()),
        activity,
    };

    let config = ClientConfig::builder()
        .binder(host.binder.clone())
        .permission_prompter(host.prompter.clone())
        .platform_info(Arc::new(StaticPlatformInfo::new(api_level)))
        .prerequisites_probe(host.prerequisites.clone())
        .callback_context(host.activity.clone())
        .build()?;

    let client = SignalboyClient::new(config)?;
    Ok((client, host))
}
