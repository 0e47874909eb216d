//! # Loopback Bridge Implementations
//!
//! In-process implementations of every bridge trait, for running the client
//! without a device or host application.
//!
//! ## Overview
//!
//! - [`LoopbackPeer`] - scriptable peer service with state pushes, pending
//!   interaction flag and command counters
//! - [`LoopbackBinder`] - binds the peer, can refuse, defer or crash
//! - [`ScriptedPermissionPrompter`] - answers prompts from a script on a
//!   separate thread
//! - [`StaticPrerequisitesProbe`] / [`StaticPlatformInfo`] - fixed answers
//! - [`ThreadContext`] / [`LoopbackActivity`] - a dedicated "UI" thread
//!
//! Foreign callbacks are delivered from freshly spawned threads wherever the
//! real host would call back asynchronously, so the client sees the same
//! threading it would on a device.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_loopback::{LoopbackBinder, LoopbackPeer};
//! use std::sync::Arc;
//!
//! let peer = Arc::new(LoopbackPeer::new());
//! let binder = Arc::new(LoopbackBinder::new(Arc::clone(&peer)));
//! // hand `binder` to `ClientConfig::builder().binder(..)`
//! peer.connect(DeviceInfo::new("Signalboy-01", "B", "1.4.2"), true);
//! ```

mod binder;
mod context;
mod peer;
mod preflight;

pub use binder::LoopbackBinder;
pub use context::{LoopbackActivity, LoopbackSurface, ThreadContext};
pub use peer::{InteractionScript, LoopbackPeer};
pub use preflight::{ScriptedPermissionPrompter, StaticPlatformInfo, StaticPrerequisitesProbe};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Loopback state stays usable even if a test callback panicked mid-update.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
