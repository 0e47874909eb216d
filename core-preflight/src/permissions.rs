//! Permission Gate
//!
//! Determines the runtime permissions required on the running platform and
//! obtains them in at most one batched prompt.

use crate::error::Result;
use bridge_traits::{
    PermissionOutcome, PermissionPrompter, PermissionResultCallback, PlatformInfo,
};
use core_correlation::Correlator;
use core_runtime::config::PermissionPolicy;
use core_runtime::events::{ClientEvent, EventBus, PermissionEvent};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, instrument, warn};

const REQUEST_PERMISSIONS: &str = "request_permissions";

/// Outcome per permission identifier.
///
/// Always covers the full required set: identifiers that were already
/// granted before prompting appear as `Granted`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionBatchResult {
    outcomes: BTreeMap<String, PermissionOutcome>,
}

impl PermissionBatchResult {
    pub fn new(outcomes: BTreeMap<String, PermissionOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn all_granted<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            outcomes: permissions
                .into_iter()
                .map(|permission| (permission.into(), PermissionOutcome::Granted))
                .collect(),
        }
    }

    /// True iff every outcome is `Granted`. An empty result is fully granted.
    pub fn is_fully_granted(&self) -> bool {
        self.outcomes.values().all(PermissionOutcome::is_granted)
    }

    pub fn outcome(&self, permission: &str) -> Option<PermissionOutcome> {
        self.outcomes.get(permission).copied()
    }

    pub fn granted(&self) -> Vec<&str> {
        self.filter_by(|outcome| outcome.is_granted())
    }

    /// Identifiers answered `Denied` or `DeniedPermanently`.
    pub fn denied(&self) -> Vec<&str> {
        self.filter_by(|outcome| !outcome.is_granted())
    }

    /// Identifiers the user will no longer be prompted for.
    pub fn permanently_denied(&self) -> Vec<&str> {
        self.filter_by(|outcome| *outcome == PermissionOutcome::DeniedPermanently)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, PermissionOutcome)> {
        self.outcomes
            .iter()
            .map(|(permission, outcome)| (permission.as_str(), *outcome))
    }

    pub fn into_outcomes(self) -> BTreeMap<String, PermissionOutcome> {
        self.outcomes
    }

    fn filter_by(&self, predicate: impl Fn(&PermissionOutcome) -> bool) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| predicate(outcome))
            .map(|(permission, _)| permission.as_str())
            .collect()
    }
}

/// Accumulates per-identifier callbacks until the batch is complete.
#[derive(Debug)]
struct BatchCollector {
    pending: BTreeSet<String>,
    outcomes: BTreeMap<String, PermissionOutcome>,
}

impl BatchCollector {
    fn new(requested: &[String]) -> Self {
        Self {
            pending: requested.iter().cloned().collect(),
            outcomes: BTreeMap::new(),
        }
    }

    /// Returns the full outcome map once the last pending identifier
    /// reports. Unknown and repeated identifiers are ignored.
    fn record(
        &mut self,
        permission: String,
        outcome: PermissionOutcome,
    ) -> Option<BTreeMap<String, PermissionOutcome>> {
        if !self.pending.remove(&permission) {
            debug!(
                permission = %permission,
                "Ignoring outcome for unrequested or already reported permission"
            );
            return None;
        }

        if outcome.is_granted() {
            info!(permission = %permission, "Permission granted");
        } else {
            warn!(permission = %permission, outcome = %outcome, "Permission denied");
        }

        self.outcomes.insert(permission, outcome);

        if self.pending.is_empty() {
            Some(std::mem::take(&mut self.outcomes))
        } else {
            debug!(remaining = self.pending.len(), "Awaiting remaining permission outcomes");
            None
        }
    }
}

/// Requests the runtime permissions the platform version requires.
pub struct PermissionGate {
    prompter: Arc<dyn PermissionPrompter>,
    policy: PermissionPolicy,
    correlator: Correlator,
    event_bus: Option<EventBus>,
}

impl PermissionGate {
    pub fn new(
        prompter: Arc<dyn PermissionPrompter>,
        policy: PermissionPolicy,
        correlator: Correlator,
    ) -> Self {
        Self {
            prompter,
            policy,
            correlator,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Permission identifiers required at `api_level`, deduplicated in
    /// policy order.
    pub fn required_permissions(&self, api_level: u32) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.policy
            .required_for(api_level)
            .iter()
            .filter(|permission| seen.insert(permission.as_str()))
            .cloned()
            .collect()
    }

    /// Look up the platform API level and request what it requires.
    ///
    /// A failing lookup (e.g. `NotAvailable` off-device) is returned as is.
    pub async fn request_for_platform(
        &self,
        platform: &dyn PlatformInfo,
    ) -> Result<PermissionBatchResult> {
        let api_level = platform.api_level()?;
        self.request_required(api_level).await
    }

    /// Request every permission required at `api_level`.
    ///
    /// Resolves immediately, without prompting, when the required set is
    /// empty or already granted. Otherwise prompts once for the missing
    /// identifiers and resolves only after each of them reported an outcome.
    #[instrument(skip(self))]
    pub async fn request_required(&self, api_level: u32) -> Result<PermissionBatchResult> {
        let required = self.required_permissions(api_level);
        if required.is_empty() {
            debug!("No runtime permissions required");
            return Ok(PermissionBatchResult::default());
        }

        let (already_granted, missing): (Vec<String>, Vec<String>) = required
            .into_iter()
            .partition(|permission| self.prompter.is_granted(permission));

        if missing.is_empty() {
            debug!(
                count = already_granted.len(),
                "All required permissions already granted"
            );
            return Ok(PermissionBatchResult::all_granted(already_granted));
        }

        info!(permissions = ?missing, "Requesting runtime permissions");
        self.emit(PermissionEvent::Requested {
            permissions: missing.clone(),
        });

        let collected = self
            .correlator
            .invoke(REQUEST_PERMISSIONS, |completer| {
                let collector = Mutex::new(BatchCollector::new(&missing));
                let on_result: PermissionResultCallback = Arc::new(move |permission, outcome| {
                    let complete = collector
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .record(permission, outcome);
                    if let Some(outcomes) = complete {
                        completer.resolve(outcomes);
                    }
                });
                self.prompter.request_permissions(&missing, on_result)
            })
            .await?;

        let mut outcomes = collected;
        outcomes.extend(
            already_granted
                .into_iter()
                .map(|permission| (permission, PermissionOutcome::Granted)),
        );
        let result = PermissionBatchResult::new(outcomes);

        self.emit(PermissionEvent::Resolved {
            granted: result.granted().into_iter().map(String::from).collect(),
            denied: result.denied().into_iter().map(String::from).collect(),
        });

        Ok(result)
    }

    fn emit(&self, event: PermissionEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(ClientEvent::Permission(event)).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn test_collector_waits_for_every_identifier() {
        let mut collector = BatchCollector::new(&ids(&["a", "b"]));

        assert!(collector.record("a".into(), PermissionOutcome::Denied).is_none());
        let complete = collector
            .record("b".into(), PermissionOutcome::Granted)
            .unwrap();

        assert_eq!(complete.len(), 2);
        assert_eq!(complete["a"], PermissionOutcome::Denied);
        assert_eq!(complete["b"], PermissionOutcome::Granted);
    }

    #[test]
    fn test_collector_ignores_unknown_and_repeated_identifiers() {
        let mut collector = BatchCollector::new(&ids(&["a", "b"]));

        assert!(collector.record("a".into(), PermissionOutcome::Granted).is_none());
        assert!(collector.record("a".into(), PermissionOutcome::Denied).is_none());
        assert!(collector.record("zzz".into(), PermissionOutcome::Granted).is_none());

        let complete = collector
            .record("b".into(), PermissionOutcome::Granted)
            .unwrap();
        assert_eq!(complete["a"], PermissionOutcome::Granted);
        assert_eq!(complete.len(), 2);

        assert!(collector.record("b".into(), PermissionOutcome::Denied).is_none());
    }

    #[test]
    fn test_batch_result_aggregation() {
        let mut outcomes = BTreeMap::new();
        outcomes.insert("a".to_string(), PermissionOutcome::Granted);
        outcomes.insert("b".to_string(), PermissionOutcome::DeniedPermanently);
        outcomes.insert("c".to_string(), PermissionOutcome::Denied);
        let result = PermissionBatchResult::new(outcomes);

        assert!(!result.is_fully_granted());
        assert_eq!(result.len(), 3);
        assert_eq!(result.granted(), vec!["a"]);
        assert_eq!(result.denied(), vec!["b", "c"]);
        assert_eq!(result.permanently_denied(), vec!["b"]);
        assert_eq!(result.outcome("c"), Some(PermissionOutcome::Denied));
    }

    #[test]
    fn test_empty_result_is_fully_granted() {
        let result = PermissionBatchResult::default();
        assert!(result.is_empty());
        assert!(result.is_fully_granted());
    }
}
