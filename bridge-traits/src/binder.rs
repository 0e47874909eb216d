//! Service Binding Abstraction
//!
//! Wraps the platform primitive that starts (if needed) and binds to the peer
//! service. Binding is asynchronous: the primitive returns immediately with an
//! acceptance flag and later reports the bound handle, or much later, an
//! unexpected disconnect.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::peer::PeerService;

/// Default normalization delay handed to the peer, in milliseconds.
pub const DEFAULT_NORMALIZATION_DELAY_MS: u64 = 100;

/// Configuration passed to the peer service when binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    /// Delay the peer applies to normalise event timing, in milliseconds.
    pub normalization_delay_ms: u64,
}

impl ServiceConfiguration {
    pub fn new(normalization_delay_ms: u64) -> Self {
        Self {
            normalization_delay_ms,
        }
    }
}

impl Default for ServiceConfiguration {
    fn default() -> Self {
        Self::new(DEFAULT_NORMALIZATION_DELAY_MS)
    }
}

/// Callbacks the binder invokes over the lifetime of one binding.
#[derive(Clone)]
pub struct ServiceConnection {
    /// The service is bound; the handle stays valid until unbind or crash.
    pub on_connected: Arc<dyn Fn(Arc<dyn PeerService>) + Send + Sync>,
    /// The peer process died while bound.
    pub on_disconnected: Arc<dyn Fn() + Send + Sync>,
}

impl ServiceConnection {
    pub fn new(
        on_connected: impl Fn(Arc<dyn PeerService>) + Send + Sync + 'static,
        on_disconnected: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_connected: Arc::new(on_connected),
            on_disconnected: Arc::new(on_disconnected),
        }
    }
}

impl fmt::Debug for ServiceConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConnection").finish_non_exhaustive()
    }
}

/// Platform service-binding primitive.
///
/// # Platform Support
///
/// - **Android**: `Context#bindService` with `BIND_AUTO_CREATE`
/// - **Loopback**: in-process peer for development and tests
pub trait ServiceBinder: Send + Sync {
    /// Request a binding.
    ///
    /// Returns `Ok(false)` when the platform refuses synchronously (package not
    /// found, security requirements not met), and an error when the platform
    /// primitive itself is unavailable. `connection.on_connected` may be
    /// invoked before this method returns.
    fn bind_service(
        &self,
        configuration: &ServiceConfiguration,
        connection: ServiceConnection,
    ) -> Result<bool>;

    /// Release the current binding. Calling it without a binding is a no-op.
    fn unbind_service(&self) -> Result<()>;
}
