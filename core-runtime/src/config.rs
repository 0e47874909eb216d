//! # Client Configuration Module
//!
//! Provides configuration management for the Signalboy client.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! [`ClientConfig`] holding every host bridge and setting the client needs.
//! It is built once at the composition root and passed down; there is no
//! global default instance.
//!
//! ## Required Dependencies
//!
//! - `ServiceBinder` - binds the peer service
//! - `PermissionPrompter` - runtime permission prompts
//! - `PlatformInfo` - platform API level for the permission policy
//! - `PrerequisitesProbe` - environment readiness evaluation
//!
//! ## Optional Settings
//!
//! - Callback execution context (default: inline on the delivering thread)
//! - [`ServiceConfiguration`] (default normalization delay)
//! - [`PermissionPolicy`] (default: Android BLE tiers)
//! - Correlated-request timeout (default: none, requests may wait forever)
//! - Event bus buffer size
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::ClientConfig;
//! use std::sync::Arc;
//!
//! let config = ClientConfig::builder()
//!     .binder(Arc::new(MyBinder))
//!     .permission_prompter(Arc::new(MyPrompter))
//!     .platform_info(Arc::new(MyPlatform))
//!     .prerequisites_probe(Arc::new(MyProbe))
//!     .normalization_delay_ms(50)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::permissions::ids;
use bridge_traits::{
    ExecutionContext, InlineContext, PermissionPrompter, PlatformInfo, PrerequisitesProbe,
    ServiceBinder, ServiceConfiguration,
};
use std::sync::Arc;
use std::time::Duration;

/// API level from which Android requires the dedicated Bluetooth permissions
/// instead of location access.
pub const BLUETOOTH_PERMISSIONS_API_LEVEL: u32 = 31;

/// One row of the permission policy table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionTier {
    /// Lowest platform API level this tier applies to (inclusive).
    pub min_api_level: u32,
    /// Permission identifiers required on this tier.
    pub permissions: Vec<String>,
}

impl PermissionTier {
    pub fn new<I, S>(min_api_level: u32, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            min_api_level,
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }
}

/// Version-tiered table selecting the runtime permissions to request.
///
/// The tier with the highest `min_api_level` not exceeding the running API
/// level wins. A platform below every tier requires nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionPolicy {
    /// Sorted by descending `min_api_level`.
    tiers: Vec<PermissionTier>,
}

impl PermissionPolicy {
    /// Build a policy from arbitrary tiers.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if two tiers share the same `min_api_level`.
    pub fn new(mut tiers: Vec<PermissionTier>) -> Result<Self> {
        tiers.sort_by(|a, b| b.min_api_level.cmp(&a.min_api_level));

        if let Some(pair) = tiers
            .windows(2)
            .find(|pair| pair[0].min_api_level == pair[1].min_api_level)
        {
            return Err(Error::Config(format!(
                "Permission policy has duplicate tiers for API level {}",
                pair[0].min_api_level
            )));
        }

        Ok(Self { tiers })
    }

    /// Policy without any required permission.
    pub fn empty() -> Self {
        Self { tiers: Vec::new() }
    }

    /// Android BLE policy: Bluetooth scan/connect from API 31, fine location
    /// below.
    pub fn android_default() -> Self {
        Self {
            tiers: vec![
                PermissionTier::new(
                    BLUETOOTH_PERMISSIONS_API_LEVEL,
                    [ids::BLUETOOTH_CONNECT, ids::BLUETOOTH_SCAN],
                ),
                PermissionTier::new(0, [ids::ACCESS_FINE_LOCATION]),
            ],
        }
    }

    /// Permission identifiers required at `api_level`.
    pub fn required_for(&self, api_level: u32) -> &[String] {
        self.tiers
            .iter()
            .find(|tier| tier.min_api_level <= api_level)
            .map(|tier| tier.permissions.as_slice())
            .unwrap_or(&[])
    }

    pub fn tiers(&self) -> &[PermissionTier] {
        &self.tiers
    }
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        Self::android_default()
    }
}

/// Client configuration.
///
/// Holds every host bridge and setting required by the client. Use
/// [`ClientConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct ClientConfig {
    /// Platform service-binding primitive (required)
    pub binder: Arc<dyn ServiceBinder>,

    /// Runtime permission prompt primitive (required)
    pub permission_prompter: Arc<dyn PermissionPrompter>,

    /// Platform facts such as the API level (required)
    pub platform_info: Arc<dyn PlatformInfo>,

    /// Environment prerequisites evaluation (required)
    pub prerequisites_probe: Arc<dyn PrerequisitesProbe>,

    /// Context on which connection-state listeners are invoked
    pub callback_context: Arc<dyn ExecutionContext>,

    /// Configuration handed to the peer on bind
    pub service_configuration: ServiceConfiguration,

    /// Version-tiered permission table
    pub permission_policy: PermissionPolicy,

    /// Upper bound for correlated requests; `None` waits indefinitely
    pub request_timeout: Option<Duration>,

    /// Capacity of the event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("binder", &"ServiceBinder { ... }")
            .field("permission_prompter", &"PermissionPrompter { ... }")
            .field("platform_info", &"PlatformInfo { ... }")
            .field("prerequisites_probe", &"PrerequisitesProbe { ... }")
            .field("callback_context", &"ExecutionContext { ... }")
            .field("service_configuration", &self.service_configuration)
            .field("permission_policy", &self.permission_policy)
            .field("request_timeout", &self.request_timeout)
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl ClientConfig {
    /// Creates a new builder for constructing a `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The request timeout, when set, is non-zero
    /// - The event buffer can hold at least one event
    pub fn validate(&self) -> Result<()> {
        if let Some(timeout) = self.request_timeout {
            if timeout.is_zero() {
                return Err(Error::Config(
                    "Request timeout must be greater than zero; use None to disable it"
                        .to_string(),
                ));
            }
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn capability_missing(capability: &str, purpose: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required {}. \
             Android: inject the host adapter. \
             Development: use the adapters from `bridge-loopback`.",
            capability, purpose
        ),
    }
}

/// Builder for constructing [`ClientConfig`] instances.
///
/// Call [`build()`](ClientConfigBuilder::build) once every required bridge
/// has been set.
#[derive(Default)]
pub struct ClientConfigBuilder {
    binder: Option<Arc<dyn ServiceBinder>>,
    permission_prompter: Option<Arc<dyn PermissionPrompter>>,
    platform_info: Option<Arc<dyn PlatformInfo>>,
    prerequisites_probe: Option<Arc<dyn PrerequisitesProbe>>,
    callback_context: Option<Arc<dyn ExecutionContext>>,
    service_configuration: Option<ServiceConfiguration>,
    permission_policy: Option<PermissionPolicy>,
    request_timeout: Option<Duration>,
    event_buffer_size: Option<usize>,
}

impl ClientConfigBuilder {
    pub fn binder(mut self, binder: Arc<dyn ServiceBinder>) -> Self {
        self.binder = Some(binder);
        self
    }

    pub fn permission_prompter(mut self, prompter: Arc<dyn PermissionPrompter>) -> Self {
        self.permission_prompter = Some(prompter);
        self
    }

    pub fn platform_info(mut self, platform_info: Arc<dyn PlatformInfo>) -> Self {
        self.platform_info = Some(platform_info);
        self
    }

    pub fn prerequisites_probe(mut self, probe: Arc<dyn PrerequisitesProbe>) -> Self {
        self.prerequisites_probe = Some(probe);
        self
    }

    /// Sets the context on which state listeners run (e.g. the UI thread).
    pub fn callback_context(mut self, context: Arc<dyn ExecutionContext>) -> Self {
        self.callback_context = Some(context);
        self
    }

    pub fn service_configuration(mut self, configuration: ServiceConfiguration) -> Self {
        self.service_configuration = Some(configuration);
        self
    }

    /// Shorthand for a service configuration with the given delay.
    pub fn normalization_delay_ms(mut self, delay_ms: u64) -> Self {
        self.service_configuration = Some(ServiceConfiguration::new(delay_ms));
        self
    }

    pub fn permission_policy(mut self, policy: PermissionPolicy) -> Self {
        self.permission_policy = Some(policy);
        self
    }

    /// Bounds every correlated request. Not set by default.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final configuration.
    ///
    /// # Errors
    ///
    /// - `Error::CapabilityMissing` if a required bridge was not provided
    /// - `Error::Config` if validation fails
    pub fn build(self) -> Result<ClientConfig> {
        let binder = self
            .binder
            .ok_or_else(|| capability_missing("ServiceBinder", "to bind the peer service"))?;
        let permission_prompter = self.permission_prompter.ok_or_else(|| {
            capability_missing("PermissionPrompter", "to request runtime permissions")
        })?;
        let platform_info = self.platform_info.ok_or_else(|| {
            capability_missing("PlatformInfo", "to select the permission policy tier")
        })?;
        let prerequisites_probe = self.prerequisites_probe.ok_or_else(|| {
            capability_missing("PrerequisitesProbe", "to verify environment prerequisites")
        })?;

        let config = ClientConfig {
            binder,
            permission_prompter,
            platform_info,
            prerequisites_probe,
            callback_context: self
                .callback_context
                .unwrap_or_else(|| Arc::new(InlineContext)),
            service_configuration: self.service_configuration.unwrap_or_default(),
            permission_policy: self.permission_policy.unwrap_or_default(),
            request_timeout: self.request_timeout,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;
        Ok(config)
    }
}
