//! Host platform queries and the foreground activity.

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::peer::InteractionSurface;

/// Static facts about the running platform.
pub trait PlatformInfo: Send + Sync {
    /// Platform API level (Android `Build.VERSION.SDK_INT`).
    ///
    /// Fails with [`BridgeError::NotAvailable`](crate::BridgeError::NotAvailable)
    /// when running outside a supported host.
    fn api_level(&self) -> Result<u32>;
}

/// The foreground activity that can host peer-provided UI.
///
/// Dispatching onto an `ActivityContext` runs work on the activity's UI
/// thread.
pub trait ActivityContext: ExecutionContext {
    /// Inject the peer's interaction surface into this activity.
    ///
    /// Must be called on the activity's UI thread.
    fn inject_interaction_surface(&self) -> Result<InteractionSurface>;
}
