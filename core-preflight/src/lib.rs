//! # Pre-flight Checks
//!
//! Everything a host should run before binding the peer service:
//!
//! - [`PermissionGate`](permissions::PermissionGate) selects the runtime
//!   permissions the platform version requires, skips the prompt when they
//!   are already granted, and otherwise awaits one batched prompt until
//!   every identifier has reported an outcome.
//! - [`PrerequisitesChecker`](prerequisites::PrerequisitesChecker) evaluates
//!   environment readiness (adapter enabled, permissions, declared features)
//!   without side effects.
//!
//! Permission denial is a result, not an error: callers branch on
//! [`PermissionBatchResult::is_fully_granted`](permissions::PermissionBatchResult::is_fully_granted).

pub mod error;
pub mod permissions;
pub mod prerequisites;

pub use error::{PreflightError, Result};
pub use permissions::{PermissionBatchResult, PermissionGate};
pub use prerequisites::PrerequisitesChecker;
