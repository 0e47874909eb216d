//! Runtime Permission Abstraction
//!
//! The host's permission-prompt primitive: given a set of permission
//! identifiers it eventually reports one outcome per identifier, each through
//! its own callback invocation.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Well-known Android permission identifiers.
pub mod ids {
    pub const ACCESS_FINE_LOCATION: &str = "android.permission.ACCESS_FINE_LOCATION";
    pub const BLUETOOTH_SCAN: &str = "android.permission.BLUETOOTH_SCAN";
    pub const BLUETOOTH_CONNECT: &str = "android.permission.BLUETOOTH_CONNECT";
    pub const BLUETOOTH_ADVERTISE: &str = "android.permission.BLUETOOTH_ADVERTISE";
}

/// Result of prompting for a single permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermissionOutcome {
    Granted,
    Denied,
    /// Denied with "don't ask again"; further prompts will not be shown.
    DeniedPermanently,
}

impl PermissionOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionOutcome::Granted)
    }
}

impl fmt::Display for PermissionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionOutcome::Granted => write!(f, "granted"),
            PermissionOutcome::Denied => write!(f, "denied"),
            PermissionOutcome::DeniedPermanently => write!(f, "denied permanently"),
        }
    }
}

/// Invoked once per requested identifier as the user answers.
pub type PermissionResultCallback = Arc<dyn Fn(String, PermissionOutcome) + Send + Sync>;

/// Permission-prompt primitive.
///
/// # Platform Support
///
/// - **Android**: `ContextCompat.checkSelfPermission` / `requestPermissions`
/// - **Loopback**: scripted answers
pub trait PermissionPrompter: Send + Sync {
    /// Whether the user has already authorised `permission`.
    fn is_granted(&self, permission: &str) -> bool;

    /// Prompt for `permissions` in one batch. Outcomes arrive later through
    /// `on_result`, one invocation per identifier, in any order.
    fn request_permissions(
        &self,
        permissions: &[String],
        on_result: PermissionResultCallback,
    ) -> Result<()>;
}
