//! Execution Context Abstraction
//!
//! Some foreign resources are affine to a single thread (typically the host's
//! UI thread). Work that touches them, and completions that must be observed
//! there, are handed to an [`ExecutionContext`].

use crate::error::Result;

/// A unit of work handed to an execution context.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Caller-designated execution context.
///
/// # Platform Support
///
/// - **Android**: `Activity#runOnUiThread` / main `Looper`
/// - **Game engines**: the engine's main-thread synchronization context
/// - **Tests / loopback**: inline execution or a dedicated thread
pub trait ExecutionContext: Send + Sync {
    /// Schedule `task` to run on this context.
    ///
    /// Returns an error if the context can no longer accept work (e.g. the
    /// owning activity has been destroyed). In that case `task` is dropped
    /// without running.
    fn dispatch(&self, task: Task) -> Result<()>;
}

/// Runs every task immediately on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineContext;

impl ExecutionContext for InlineContext {
    fn dispatch(&self, task: Task) -> Result<()> {
        task();
        Ok(())
    }
}
