//! Instance extension gate
//!
//! Decides, before any driver resource is committed, which of the extensions
//! an application requested are enabled on a new instance.  An instance spans
//! every discovered driver, so an extension is only accepted when all of them
//! advertise it, unless the loader emulates the extension entirely by itself.

use log::debug;
use rustc_hash::FxHashSet;

use crate::driver::{DriverCapabilitySet, DriverHandle};
use crate::error::{LoaderError, Result};
use crate::registry::{ExtensionClass, ExtensionRegistry, REGISTRY};

/// Extension state of one instance, fixed at creation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstanceExtensionState {
    enabled_extensions: Vec<String>,
    driver_refs: Vec<DriverHandle>,
}

impl InstanceExtensionState {
    /// Enabled extensions, deduplicated, in request order.
    pub fn enabled_extensions(&self) -> &[String] {
        &self.enabled_extensions
    }

    pub fn driver_refs(&self) -> &[DriverHandle] {
        &self.driver_refs
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled_extensions.iter().any(|e| e == name)
    }

    /// Narrow the driver list to the drivers the instance ended up spanning.
    /// Enabled extensions stay as gated.
    pub(crate) fn retain_drivers(&mut self, spanned: &[DriverHandle]) {
        self.driver_refs.retain(|driver| spanned.contains(driver));
    }
}

pub struct InstanceExtensionGate<'r> {
    registry: &'r ExtensionRegistry,
}

impl<'r> InstanceExtensionGate<'r> {
    pub fn new(registry: &'r ExtensionRegistry) -> Self {
        Self { registry }
    }

    /// Compute the enabled set, or name the first requested extension (in
    /// request order) that cannot be honoured.
    pub fn gate<S: AsRef<str>>(
        &self,
        requested: &[S],
        drivers: &[DriverCapabilitySet],
    ) -> Result<InstanceExtensionState> {
        let mut seen = FxHashSet::default();
        let mut enabled_extensions = Vec::new();

        for name in requested.iter().map(AsRef::as_ref) {
            if !seen.insert(name) {
                continue;
            }

            let emulated = self
                .registry
                .lookup(name, ExtensionClass::Instance)
                .map_or(false, |entry| entry.is_loader_emulated());
            let everywhere = !drivers.is_empty() && drivers.iter().all(|d| d.supports(name));

            if !(everywhere || emulated) {
                debug!(
                    "Rejecting {}: supported by {}/{} driver(s)",
                    name,
                    drivers.iter().filter(|d| d.supports(name)).count(),
                    drivers.len()
                );
                return Err(LoaderError::ExtensionNotPresent(name.to_string()));
            }

            enabled_extensions.push(name.to_string());
        }

        Ok(InstanceExtensionState {
            enabled_extensions,
            driver_refs: drivers.iter().map(|d| d.driver).collect(),
        })
    }
}

/// Gate `requested` against the built-in registry.
pub fn gate_instance_extensions<S: AsRef<str>>(
    requested: &[S],
    drivers: &[DriverCapabilitySet],
) -> Result<InstanceExtensionState> {
    InstanceExtensionGate::new(&REGISTRY).gate(requested, drivers)
}
