//! # Correlation Bridge
//!
//! Converts results that a foreign host delivers through callbacks into
//! futures that ordinary async code can await.
//!
//! ## Overview
//!
//! Every asynchronous host primitive (permission prompts, UI injection,
//! interaction resolution) reports its outcome by invoking a callback at
//! some later time on a thread of the host's choosing. The [`Correlator`]
//! pairs each such request with a [`Completer`] that the callback uses to
//! deliver the outcome:
//!
//! - resolution happens at most once per request
//! - a synchronous failure while issuing the call fails the future at once
//! - foreign throwables become [`CorrelationError::Foreign`] failures
//! - a request whose completers are all dropped fails as abandoned
//! - results can be redirected onto a designated execution context
//!
//! Batches that expect several callbacks before completing keep their own
//! accumulation state inside the callback and resolve the completer once.

pub mod completer;
pub mod correlator;
pub mod error;

pub use completer::{describe_throwable, Completer, RequestId};
pub use correlator::Correlator;
pub use error::{CorrelationError, Result};
