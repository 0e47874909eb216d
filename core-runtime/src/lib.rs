//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the Signalboy client:
//! - Logging and tracing infrastructure
//! - Configuration management (bridges, service configuration, permission policy)
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the correlation, pre-flight
//! and connection crates depend on. It establishes the logging conventions and
//! the event broadcasting used throughout the client.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
