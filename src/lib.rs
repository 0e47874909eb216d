//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `core-service`, `bridge-loopback`). Host
//! applications can depend on `signalboy-workspace` and enable the documented
//! features without needing to wire each crate individually.

#[cfg(feature = "client")]
pub use core_service::*;
