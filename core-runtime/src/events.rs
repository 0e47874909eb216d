//! # Event Bus System
//!
//! Provides an event-driven view of the Signalboy client using
//! `tokio::sync::broadcast`. Core crates publish typed events here so that
//! hosts can observe lifecycle, permission and interaction activity without
//! being wired into each component.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies per component
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐   emit    ┌───────────┐
//! │ Lifecycle Mgr  ├──────────>│           │
//! └────────────────┘           │           │
//!                              │ EventBus  │  subscribe  ┌────────────┐
//! ┌────────────────┐   emit    │ (broadcast├────────────>│ Subscriber │
//! │ Permission Gate├──────────>│  channel) │             └────────────┘
//! └────────────────┘           │           │
//! ┌────────────────┐   emit    │           │
//! │ Interaction    ├──────────>│           │
//! └────────────────┘           └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{ClientEvent, EventBus, LifecycleEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(ClientEvent::Lifecycle(LifecycleEvent::Bound { generation: 1 }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Peer service bound");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.
//!
//! Emitters ignore `SendError`: having no subscribers is the normal case for
//! a host that does not observe events.

use bridge_traits::ConnectionState;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Client Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum ClientEvent {
    /// Binding lifecycle of the peer service
    Lifecycle(LifecycleEvent),
    /// Connection-state transitions mirrored from the peer
    Connection(ConnectionEvent),
    /// Runtime permission requests
    Permission(PermissionEvent),
    /// User-interaction resolution
    Interaction(InteractionEvent),
}

impl ClientEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            ClientEvent::Lifecycle(e) => e.description(),
            ClientEvent::Connection(e) => e.description(),
            ClientEvent::Permission(e) => e.description(),
            ClientEvent::Interaction(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            ClientEvent::Lifecycle(LifecycleEvent::BindFailed { .. }) => EventSeverity::Error,
            ClientEvent::Lifecycle(LifecycleEvent::PeerTerminated { .. }) => EventSeverity::Error,
            ClientEvent::Interaction(InteractionEvent::Failed { .. }) => EventSeverity::Error,
            ClientEvent::Permission(PermissionEvent::Resolved { denied, .. })
                if !denied.is_empty() =>
            {
                EventSeverity::Warning
            }
            ClientEvent::Lifecycle(LifecycleEvent::Bound { .. }) => EventSeverity::Info,
            ClientEvent::Connection(ConnectionEvent::StateChanged {
                state: ConnectionState::Connected { .. },
            }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

/// Events describing the bind/unbind lifecycle.
///
/// `generation` identifies one binding attempt; callbacks belonging to an
/// older generation are ignored by the lifecycle manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LifecycleEvent {
    /// Bind primitive is being invoked.
    Binding {
        generation: u64,
        normalization_delay_ms: u64,
    },
    /// Peer handle delivered and state listener installed.
    Bound { generation: u64 },
    /// Explicit unbind completed.
    Unbound { generation: u64 },
    /// Peer terminated unexpectedly.
    PeerTerminated { generation: u64 },
    /// Bind primitive refused the request.
    BindFailed { message: String },
}

impl LifecycleEvent {
    fn description(&self) -> &str {
        match self {
            LifecycleEvent::Binding { .. } => "Binding peer service",
            LifecycleEvent::Bound { .. } => "Peer service bound",
            LifecycleEvent::Unbound { .. } => "Peer service unbound",
            LifecycleEvent::PeerTerminated { .. } => "Peer service terminated unexpectedly",
            LifecycleEvent::BindFailed { .. } => "Failed to bind peer service",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ConnectionEvent {
    /// Mirror published a new snapshot.
    StateChanged { state: ConnectionState },
}

impl ConnectionEvent {
    fn description(&self) -> &str {
        match self {
            ConnectionEvent::StateChanged { .. } => "Connection state changed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PermissionEvent {
    /// A batch prompt was issued for these identifiers.
    Requested { permissions: Vec<String> },
    /// Every requested identifier reported an outcome.
    Resolved {
        granted: Vec<String>,
        denied: Vec<String>,
    },
}

impl PermissionEvent {
    fn description(&self) -> &str {
        match self {
            PermissionEvent::Requested { .. } => "Runtime permissions requested",
            PermissionEvent::Resolved { .. } => "Runtime permission request completed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum InteractionEvent {
    Started,
    Resolved,
    Failed { message: String },
}

impl InteractionEvent {
    fn description(&self) -> &str {
        match self {
            InteractionEvent::Started => "Resolving user interaction request",
            InteractionEvent::Resolved => "User interaction request resolved",
            InteractionEvent::Failed { .. } => "User interaction request failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast channel shared by every client component.
///
/// Clones publish into the same channel. A subscriber that falls more than
/// `capacity` events behind observes `RecvError::Lagged` and resumes with
/// the oldest retained event.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Number of subscribers reached, or `SendError` when there are none.
    pub fn emit(&self, event: ClientEvent) -> Result<usize, SendError<ClientEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<ClientEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&ClientEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{ClientEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let lifecycle_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, ClientEvent::Lifecycle(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<ClientEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<ClientEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ClientEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<ClientEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<ClientEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
