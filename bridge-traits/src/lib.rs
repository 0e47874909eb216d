//! # Host Bridge Traits
//!
//! Platform abstraction traits that every host of the Signalboy client must
//! implement, plus the data model that crosses the boundary.
//!
//! ## Overview
//!
//! The client controls an out-of-process peer service through primitives owned
//! by the host platform. Each trait below is one such primitive. All results
//! that the host produces asynchronously are delivered through callbacks; the
//! core crates turn those callbacks into futures.
//!
//! ## Traits
//!
//! ### Binding & Peer
//! - [`ServiceBinder`](binder::ServiceBinder) - Bind/unbind the peer service
//! - [`PeerService`](peer::PeerService) - Opaque handle to the bound peer
//!
//! ### Pre-flight
//! - [`PermissionPrompter`](permissions::PermissionPrompter) - Runtime permission prompts
//! - [`PrerequisitesProbe`](prerequisites::PrerequisitesProbe) - Environment readiness
//! - [`PlatformInfo`](platform::PlatformInfo) - Platform API level
//!
//! ### Threading & UI
//! - [`ExecutionContext`](context::ExecutionContext) - Hand work to a designated thread
//! - [`ActivityContext`](platform::ActivityContext) - Foreground activity hosting peer UI
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Loopback | `bridge-loopback`   | ✅ Available |
//! | Android  | host application    | 📋 Injected by host |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should map "not running on a supported host" to `BridgeError::NotAvailable`
//! and foreign exceptions raised synchronously to
//! `BridgeError::ForeignException`.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`: foreign callbacks arrive on
//! whatever thread the host's interop layer chooses.

pub mod binder;
pub mod context;
pub mod error;
pub mod logging;
pub mod peer;
pub mod permissions;
pub mod platform;
pub mod prerequisites;

pub use error::{BridgeError, ForeignException, Throwable};

// Re-export commonly used types
pub use binder::{ServiceBinder, ServiceConfiguration, ServiceConnection};
pub use context::{ExecutionContext, InlineContext, Task};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use peer::{
    ConnectionState, DeviceInfo, DisconnectCause, InteractionCallback, InteractionSurface,
    PeerService, StateListener,
};
pub use permissions::{PermissionOutcome, PermissionPrompter, PermissionResultCallback};
pub use platform::{ActivityContext, PlatformInfo};
pub use prerequisites::{Prerequisite, PrerequisitesProbe, PrerequisitesResult};
