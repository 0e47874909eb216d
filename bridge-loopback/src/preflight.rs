//! Permission prompter, prerequisites probe and platform facts with fixed
//! answers.

use crate::lock;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::{
    PermissionOutcome, PermissionPrompter, PermissionResultCallback, PlatformInfo,
    PrerequisitesProbe, PrerequisitesResult,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use tracing::debug;

/// Answers permission prompts from a script.
///
/// Identifiers without a scripted answer are denied. Answers are delivered
/// one callback per identifier, in request order, from a separate thread;
/// granted identifiers are remembered for later `is_granted` checks.
#[derive(Default)]
pub struct ScriptedPermissionPrompter {
    granted: Mutex<HashSet<String>>,
    answers: Mutex<HashMap<String, PermissionOutcome>>,
    requests: AtomicUsize,
}

impl ScriptedPermissionPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `permission` as granted before any prompt.
    pub fn grant(&self, permission: impl Into<String>) {
        lock(&self.granted).insert(permission.into());
    }

    /// Script the answer the user gives when prompted for `permission`.
    pub fn answer(&self, permission: impl Into<String>, outcome: PermissionOutcome) {
        lock(&self.answers).insert(permission.into(), outcome);
    }

    /// Number of prompts issued so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PermissionPrompter for ScriptedPermissionPrompter {
    fn is_granted(&self, permission: &str) -> bool {
        lock(&self.granted).contains(permission)
    }

    fn request_permissions(
        &self,
        permissions: &[String],
        on_result: PermissionResultCallback,
    ) -> Result<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let answers: Vec<(String, PermissionOutcome)> = {
            let scripted = lock(&self.answers);
            permissions
                .iter()
                .map(|permission| {
                    let outcome = scripted
                        .get(permission)
                        .copied()
                        .unwrap_or(PermissionOutcome::Denied);
                    (permission.clone(), outcome)
                })
                .collect()
        };

        {
            let mut granted = lock(&self.granted);
            for (permission, outcome) in &answers {
                if outcome.is_granted() {
                    granted.insert(permission.clone());
                }
            }
        }

        debug!(count = answers.len(), "Loopback prompter answering permissions");
        thread::spawn(move || {
            for (permission, outcome) in answers {
                on_result(permission, outcome);
            }
        });

        Ok(())
    }
}

/// Returns a fixed prerequisites result.
#[derive(Default)]
pub struct StaticPrerequisitesProbe {
    result: Mutex<PrerequisitesResult>,
}

impl StaticPrerequisitesProbe {
    pub fn new(result: PrerequisitesResult) -> Self {
        Self {
            result: Mutex::new(result),
        }
    }

    pub fn set_result(&self, result: PrerequisitesResult) {
        *lock(&self.result) = result;
    }
}

impl PrerequisitesProbe for StaticPrerequisitesProbe {
    fn verify_prerequisites(&self) -> Result<PrerequisitesResult> {
        Ok(lock(&self.result).clone())
    }
}

/// Reports a fixed API level, or `NotAvailable` when built without one.
#[derive(Debug, Clone, Copy)]
pub struct StaticPlatformInfo {
    api_level: Option<u32>,
}

impl StaticPlatformInfo {
    pub fn new(api_level: u32) -> Self {
        Self {
            api_level: Some(api_level),
        }
    }

    /// A platform that behaves like running outside the supported host.
    pub fn unavailable() -> Self {
        Self { api_level: None }
    }
}

impl PlatformInfo for StaticPlatformInfo {
    fn api_level(&self) -> Result<u32> {
        self.api_level.ok_or_else(|| {
            BridgeError::NotAvailable("Platform API level is only available on device".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;

    #[test]
    fn test_prompter_answers_in_request_order() {
        let prompter = ScriptedPermissionPrompter::new();
        prompter.answer("a", PermissionOutcome::Granted);
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);

        prompter
            .request_permissions(
                &["b".to_string(), "a".to_string()],
                Arc::new(move |permission, outcome| {
                    tx.lock().unwrap().send((permission, outcome)).unwrap();
                }),
            )
            .unwrap();

        assert_eq!(rx.recv().unwrap(), ("b".to_string(), PermissionOutcome::Denied));
        assert_eq!(rx.recv().unwrap(), ("a".to_string(), PermissionOutcome::Granted));
        assert!(prompter.is_granted("a"));
        assert!(!prompter.is_granted("b"));
        assert_eq!(prompter.request_count(), 1);
    }

    #[test]
    fn test_unavailable_platform() {
        assert_eq!(StaticPlatformInfo::new(33).api_level(), Ok(33));
        assert!(matches!(
            StaticPlatformInfo::unavailable().api_level(),
            Err(BridgeError::NotAvailable(_))
        ));
    }
}
