//! Environment Prerequisites
//!
//! Before binding, the peer library can evaluate whether the environment is
//! ready: Bluetooth adapter enabled, runtime permissions granted, required
//! `uses-feature` declarations present.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single unmet environment precondition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Prerequisite {
    /// The Bluetooth adapter is missing or switched off.
    BluetoothEnabled,
    /// Runtime permissions that still need to be granted.
    RuntimePermissions { required: Vec<String> },
    /// Manifest feature declarations that are missing.
    UsesFeatureDeclarations { required: Vec<String> },
}

/// Outcome of a prerequisites evaluation.
///
/// `unmet_prerequisites` keeps the evaluation order of the probe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrerequisitesResult {
    pub unmet_prerequisites: Vec<Prerequisite>,
}

impl PrerequisitesResult {
    pub fn new(unmet_prerequisites: Vec<Prerequisite>) -> Self {
        Self {
            unmet_prerequisites,
        }
    }

    /// Empty list means the client is ready to bind.
    pub fn is_satisfied(&self) -> bool {
        self.unmet_prerequisites.is_empty()
    }

    /// All runtime permissions listed by unmet prerequisites, in order.
    pub fn missing_permissions(&self) -> Vec<&str> {
        self.unmet_prerequisites
            .iter()
            .filter_map(|prerequisite| match prerequisite {
                Prerequisite::RuntimePermissions { required } => Some(required),
                _ => None,
            })
            .flatten()
            .map(String::as_str)
            .collect()
    }
}

/// Side-effect-free probe over the host environment.
///
/// # Platform Support
///
/// - **Android**: the peer library's static `verifyPrerequisites(context, adapter)`
/// - **Loopback**: a fixed list
pub trait PrerequisitesProbe: Send + Sync {
    /// Evaluate all prerequisites. Must not prompt, bind or mutate anything.
    fn verify_prerequisites(&self) -> Result<PrerequisitesResult>;
}
