//! A dedicated thread standing in for the host's UI thread.

use crate::lock;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::{ActivityContext, ExecutionContext, InteractionSurface, Task};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;
use tracing::{debug, warn};

/// Runs dispatched tasks one at a time on a named worker thread.
///
/// The thread exits when the context is dropped; tasks dispatched after
/// [`shutdown`](Self::shutdown) are rejected.
pub struct ThreadContext {
    name: String,
    sender: Mutex<Option<mpsc::Sender<Task>>>,
}

impl ThreadContext {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<Task>();

        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                while let Ok(task) = receiver.recv() {
                    task();
                }
            })
            .map_err(|e| {
                BridgeError::OperationFailed(format!("Failed to spawn {} thread: {}", name, e))
            })?;

        Ok(Self {
            name,
            sender: Mutex::new(Some(sender)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the calling thread is this context's thread.
    pub fn is_current(&self) -> bool {
        thread::current().name() == Some(self.name.as_str())
    }

    /// Stop accepting work. Already queued tasks still run.
    pub fn shutdown(&self) {
        lock(&self.sender).take();
    }
}

impl ExecutionContext for ThreadContext {
    fn dispatch(&self, task: Task) -> Result<()> {
        let sender = lock(&self.sender);
        let Some(sender) = sender.as_ref() else {
            warn!(context = %self.name, "Dispatch after shutdown");
            return Err(BridgeError::OperationFailed(format!(
                "{} no longer accepts work",
                self.name
            )));
        };

        sender.send(task).map_err(|_| {
            BridgeError::OperationFailed(format!("{} thread has exited", self.name))
        })
    }
}

/// Surface handed out by [`LoopbackActivity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackSurface {
    pub sequence: usize,
}

/// Foreground activity backed by a [`ThreadContext`].
pub struct LoopbackActivity {
    ui: ThreadContext,
    fail_injection: AtomicBool,
    injections: AtomicUsize,
    off_thread_injections: AtomicUsize,
}

impl LoopbackActivity {
    pub fn new() -> Result<Self> {
        Ok(Self {
            ui: ThreadContext::new("loopback-ui")?,
            fail_injection: AtomicBool::new(false),
            injections: AtomicUsize::new(0),
            off_thread_injections: AtomicUsize::new(0),
        })
    }

    pub fn ui_context(&self) -> &ThreadContext {
        &self.ui
    }

    /// Make subsequent injections fail as if the activity were finishing.
    pub fn set_fail_injection(&self, fail: bool) {
        self.fail_injection.store(fail, Ordering::SeqCst);
    }

    pub fn injection_count(&self) -> usize {
        self.injections.load(Ordering::SeqCst)
    }

    /// Injections attempted from a thread other than the UI thread.
    pub fn off_thread_injection_count(&self) -> usize {
        self.off_thread_injections.load(Ordering::SeqCst)
    }
}

impl ExecutionContext for LoopbackActivity {
    fn dispatch(&self, task: Task) -> Result<()> {
        self.ui.dispatch(task)
    }
}

impl ActivityContext for LoopbackActivity {
    fn inject_interaction_surface(&self) -> Result<InteractionSurface> {
        if !self.ui.is_current() {
            self.off_thread_injections.fetch_add(1, Ordering::SeqCst);
        }

        if self.fail_injection.load(Ordering::SeqCst) {
            return Err(BridgeError::ForeignException(
                "IllegalStateException: Activity is finishing".to_string(),
            ));
        }

        let sequence = self.injections.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(sequence, "Injected loopback interaction surface");
        Ok(InteractionSurface::new(LoopbackSurface { sequence }))
    }
}
