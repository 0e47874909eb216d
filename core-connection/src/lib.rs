//! # Peer Connection
//!
//! Session-scoped state of the bound peer service.
//!
//! - [`ConnectionLifecycle`](lifecycle::ConnectionLifecycle) binds and
//!   unbinds the peer, installs its state-push listener and recovers from
//!   peer crashes.
//! - [`StateMirror`](mirror::StateMirror) holds the latest
//!   [`ConnectionState`](bridge_traits::ConnectionState) for any number of
//!   readers.
//! - [`InteractionResolver`](interaction::InteractionResolver) answers user
//!   interaction requests raised by the peer mid-session.
//!
//! ## Crash handling
//!
//! When the peer dies while bound, the lifecycle returns to unbound and the
//! mirror receives a synthetic
//! `Disconnected { cause: Some(DisconnectCause::PeerTerminated) }`. This is
//! the only state not reported by the peer itself.

pub mod error;
pub mod interaction;
pub mod lifecycle;
pub mod mirror;

pub use error::{ConnectionError, Result};
pub use interaction::InteractionResolver;
pub use lifecycle::ConnectionLifecycle;
pub use mirror::{ListenerId, StateMirror};
