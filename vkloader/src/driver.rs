//! Driver-side collaborators consumed by the loader core
//!
//! Discovery produces one `DriverCapabilitySet` per driver; the symbol loader
//! turns a driver handle plus a symbol name into an entry point.  Both are
//! written once while discovery runs and only read afterwards.

use std::ffi::CStr;
use std::os::raw::c_char;
use std::sync::Arc;

use ash::vk;
use log::{debug, info};

use crate::error::Result;
use crate::pfn::VoidFunction;

/// Opaque, non-owning reference to a driver loaded by the discovery collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DriverHandle(pub u64);

/// One instance extension as reported by a driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverExtension {
    pub name: String,
    pub spec_version: u32,
}

impl DriverExtension {
    pub fn new(name: impl Into<String>, spec_version: u32) -> Self {
        Self {
            name: name.into(),
            spec_version,
        }
    }

    pub fn from_properties(properties: &vk::ExtensionProperties) -> Self {
        let name: Vec<u8> = properties
            .extension_name
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        Self::new(String::from_utf8_lossy(&name).into_owned(), properties.spec_version)
    }

    /// The C form; names too long for the fixed array are truncated.
    pub fn to_properties(&self) -> vk::ExtensionProperties {
        let mut properties = vk::ExtensionProperties {
            spec_version: self.spec_version,
            ..Default::default()
        };
        // leave room for the terminating NUL
        let len = self.name.len().min(vk::MAX_EXTENSION_NAME_SIZE - 1);
        for (dst, src) in properties.extension_name.iter_mut().zip(&self.name.as_bytes()[..len]) {
            *dst = *src as c_char;
        }
        properties
    }
}

/// Per-driver snapshot of supported instance extensions.
#[derive(Clone, Debug)]
pub struct DriverCapabilitySet {
    pub driver: DriverHandle,
    pub supported_instance_extensions: Vec<DriverExtension>,
}

impl DriverCapabilitySet {
    pub fn new(driver: DriverHandle, supported_instance_extensions: Vec<DriverExtension>) -> Self {
        Self {
            driver,
            supported_instance_extensions,
        }
    }

    /// Capability set advertising `names` at spec version 1.
    pub fn with_names<'a>(driver: DriverHandle, names: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(
            driver,
            names.into_iter().map(|n| DriverExtension::new(n, 1)).collect(),
        )
    }

    pub fn supports(&self, name: &str) -> bool {
        self.extension(name).is_some()
    }

    pub fn extension(&self, name: &str) -> Option<&DriverExtension> {
        self.supported_instance_extensions
            .iter()
            .find(|ext| ext.name == name)
    }
}

/// `enumerate_drivers() -> [(driver_handle, supported_instance_extensions)]`
pub trait DriverDiscovery {
    fn enumerate_drivers(&self) -> Result<Vec<DriverCapabilitySet>>;
}

/// `load_symbol(driver_handle, name) -> pointer | not_found`
pub trait SymbolLoader: Send + Sync {
    fn load_symbol(&self, driver: DriverHandle, name: &CStr) -> Option<VoidFunction>;
}

/// Every discovered driver together with the means to reach its symbols.
#[derive(Clone)]
pub struct DriverSet {
    capabilities: Vec<DriverCapabilitySet>,
    symbols: Arc<dyn SymbolLoader>,
}

impl DriverSet {
    pub fn new(capabilities: Vec<DriverCapabilitySet>, symbols: Arc<dyn SymbolLoader>) -> Self {
        Self {
            capabilities,
            symbols,
        }
    }

    /// Run discovery once and keep its result.
    pub fn discover(discovery: &dyn DriverDiscovery, symbols: Arc<dyn SymbolLoader>) -> Result<Self> {
        let capabilities = discovery.enumerate_drivers()?;
        info!("Discovered {} driver(s)", capabilities.len());
        for caps in &capabilities {
            debug!(
                "Driver {:?} advertises {:?}",
                caps.driver,
                caps.supported_instance_extensions
                    .iter()
                    .map(|e| e.name.as_str())
                    .collect::<Vec<_>>()
            );
        }
        Ok(Self::new(capabilities, symbols))
    }

    pub fn capabilities(&self) -> &[DriverCapabilitySet] {
        &self.capabilities
    }

    pub fn symbols(&self) -> &Arc<dyn SymbolLoader> {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}
