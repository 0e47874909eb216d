//! Prerequisites Checker

use crate::error::Result;
use bridge_traits::{PrerequisitesProbe, PrerequisitesResult};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Evaluates whether the environment is ready for binding.
///
/// Purely evaluative: no prompt is issued and no state changes. The unmet
/// list is returned in the probe's evaluation order.
pub struct PrerequisitesChecker {
    probe: Arc<dyn PrerequisitesProbe>,
}

impl PrerequisitesChecker {
    pub fn new(probe: Arc<dyn PrerequisitesProbe>) -> Self {
        Self { probe }
    }

    #[instrument(skip(self))]
    pub fn verify(&self) -> Result<PrerequisitesResult> {
        let result = self.probe.verify_prerequisites()?;

        if result.is_satisfied() {
            debug!("All prerequisites met");
        } else {
            for (position, prerequisite) in result.unmet_prerequisites.iter().enumerate() {
                info!(position, prerequisite = ?prerequisite, "Unmet prerequisite");
            }
        }

        Ok(result)
    }
}
