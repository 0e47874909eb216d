//! Remote State Mirror
//!
//! Holds the latest [`ConnectionState`] reported by the peer. Written only by
//! the lifecycle manager; read by any number of observers.
//!
//! Snapshots are swapped atomically through a `tokio::sync::watch` channel,
//! so a reader never sees a half-updated state. Rapid back-to-back updates
//! may coalesce for slow readers: the latest delivered value always wins.
//!
//! Registered listeners see every state in publish order. States are queued
//! and dispatched by whichever thread is already draining the queue, with no
//! lock held, so a listener may call back into the client (rebind, trigger a
//! peer push) from inside its callback.

use bridge_traits::{ConnectionState, ExecutionContext, StateListener};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Identifies a registered state listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct RegisteredListener {
    id: ListenerId,
    listener: StateListener,
    context: Arc<dyn ExecutionContext>,
}

#[derive(Default)]
struct Outbox {
    queue: VecDeque<ConnectionState>,
    draining: bool,
}

pub struct StateMirror {
    sender: watch::Sender<ConnectionState>,
    listeners: Mutex<Vec<RegisteredListener>>,
    next_listener_id: AtomicU64,
    // Swaps and enqueues happen under this lock so listener order matches
    // snapshot order.
    outbox: Mutex<Outbox>,
}

impl StateMirror {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(ConnectionState::initial());
        Self {
            sender,
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            outbox: Mutex::new(Outbox::default()),
        }
    }

    /// Non-blocking snapshot of the latest state.
    pub fn current(&self) -> ConnectionState {
        self.sender.borrow().clone()
    }

    /// Receiver that is notified on every publish.
    ///
    /// Use `changed()` / `wait_for()` on the receiver to wait for a
    /// transition; the mirror itself never blocks.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.sender.subscribe()
    }

    /// Invoke `listener` on `context` for every future publish.
    pub fn add_listener(
        &self,
        listener: StateListener,
        context: Arc<dyn ExecutionContext>,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).push(RegisteredListener {
            id,
            listener,
            context,
        });
        debug!(listener = id.0, "State listener registered");
        id
    }

    /// Returns `false` if `id` was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|registered| registered.id != id);
        before != listeners.len()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    #[cfg(test)]
    pub(crate) fn publish(&self, state: ConnectionState) {
        self.record(state);
        self.notify_listeners();
    }

    /// Swap the snapshot and queue `state` for listeners. Never runs
    /// listener code, so callers may hold their own locks.
    pub(crate) fn record(&self, state: ConnectionState) {
        let mut outbox = lock(&self.outbox);
        let previous = self.sender.send_replace(state.clone());
        debug!(from = previous.name(), to = state.name(), "Connection state mirrored");
        outbox.queue.push_back(state);
    }

    /// Dispatch queued states to listeners.
    ///
    /// Returns immediately if another call is already draining; that call
    /// delivers whatever was queued, including states recorded by listeners
    /// it is running.
    pub(crate) fn notify_listeners(&self) {
        {
            let mut outbox = lock(&self.outbox);
            if outbox.draining {
                return;
            }
            outbox.draining = true;
        }
        let _reset = DrainReset(&self.outbox);

        loop {
            let state = {
                let mut outbox = lock(&self.outbox);
                match outbox.queue.pop_front() {
                    Some(state) => state,
                    None => {
                        outbox.draining = false;
                        return;
                    }
                }
            };
            self.dispatch(state);
        }
    }

    fn dispatch(&self, state: ConnectionState) {
        let targets: Vec<(ListenerId, StateListener, Arc<dyn ExecutionContext>)> =
            lock(&self.listeners)
                .iter()
                .map(|registered| {
                    (
                        registered.id,
                        Arc::clone(&registered.listener),
                        Arc::clone(&registered.context),
                    )
                })
                .collect();

        for (id, listener, context) in targets {
            let state = state.clone();
            if let Err(err) = context.dispatch(Box::new(move || listener(state))) {
                warn!(listener = id.0, error = %err, "Failed to deliver state change");
            }
        }
    }
}

/// Releases the drain flag if a listener panics mid-drain.
struct DrainReset<'a>(&'a Mutex<Outbox>);

impl Drop for DrainReset<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            lock(self.0).draining = false;
        }
    }
}

impl Default for StateMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StateMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMirror")
            .field("current", &self.current())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
