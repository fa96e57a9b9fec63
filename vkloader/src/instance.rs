//! Loader instances and physical devices
//!
//! A loader instance owns one driver instance per surviving driver, the
//! immutable extension state decided by the gate, and its dispatch table.
//! Physical devices are enumerated from every driver once, at creation, and
//! wrapped into loader handles that remember the owning driver.

use ash::vk::{self, Handle};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use std::sync::Arc;

use crate::config::LoaderConfig;
use crate::dispatch::{build_dispatch_table, DispatchTable, ProcChain};
use crate::driver::{DriverExtension, DriverHandle, DriverSet};
use crate::error::{LoaderError, Result};
use crate::gate::{gate_instance_extensions, InstanceExtensionState};
use crate::handle::{alloc_dispatchable, free_dispatchable, HandleAllocator};
use crate::icd::{DriverEntry, DriverInstance};
use crate::registry::{is_known_instance_extension, REGISTRY};

/// Global instance allocator
pub static INSTANCE_ALLOCATOR: Lazy<HandleAllocator<LoaderInstance>> = Lazy::new(HandleAllocator::new);

/// Global physical device allocator
pub static PHYSICAL_DEVICE_ALLOCATOR: Lazy<HandleAllocator<PhysicalDeviceTerm>> =
    Lazy::new(HandleAllocator::new);

pub struct LoaderInstance {
    pub state: InstanceExtensionState,
    pub dispatch: Arc<DispatchTable>,
    pub chain: Arc<dyn ProcChain>,
    pub drivers: Vec<Arc<DriverInstance>>,
    /// Loader handles, grouped by driver in driver order
    pub physical_devices: Vec<vk::PhysicalDevice>,
}

/// What a terminator needs to reach the driver behind a loader physical device.
pub struct PhysicalDeviceTerm {
    pub dispatch: Arc<DispatchTable>,
    pub driver: Arc<DriverInstance>,
    /// Position of `driver` in the owning instance's driver list
    pub driver_index: usize,
    pub raw: vk::PhysicalDevice,
}

pub fn get_instance(instance: vk::Instance) -> Option<Arc<LoaderInstance>> {
    INSTANCE_ALLOCATOR.get_dispatchable(instance.as_raw())
}

pub fn get_physical_device(physical_device: vk::PhysicalDevice) -> Option<Arc<PhysicalDeviceTerm>> {
    PHYSICAL_DEVICE_ALLOCATOR.get_dispatchable(physical_device.as_raw())
}

pub unsafe fn create_instance<S: AsRef<str>>(
    drivers: &DriverSet,
    requested_extensions: &[S],
    application_info: Option<&vk::ApplicationInfo>,
    chain: Arc<dyn ProcChain>,
) -> Result<vk::Instance> {
    // Nothing is committed on a driver before both of these succeed
    let mut state = gate_instance_extensions(requested_extensions, drivers.capabilities())?;
    let dispatch = build_dispatch_table(&state, chain.as_ref())?;

    let mut created = Vec::new();
    for capabilities in drivers.capabilities() {
        let result = DriverEntry::load(capabilities.driver, drivers.symbols().as_ref())
            .and_then(|entry| DriverInstance::create(&entry, capabilities, &state, application_info))
            .and_then(|driver_instance| {
                let devices = driver_instance.enumerate_physical_devices()?;
                Ok((driver_instance, devices))
            });

        match result {
            Ok(pair) => created.push(pair),
            Err(e) => warn!("Skipping driver {:?}: {}", capabilities.driver, e),
        }
    }

    if created.is_empty() {
        return Err(LoaderError::IncompatibleDriver(format!(
            "none of {} driver(s) could create an instance",
            drivers.len()
        )));
    }

    let spanned: Vec<DriverHandle> = created.iter().map(|(driver_instance, _)| driver_instance.driver).collect();
    state.retain_drivers(&spanned);

    let mut driver_instances = Vec::with_capacity(created.len());
    let mut physical_devices = Vec::new();
    for (driver_index, (driver_instance, raw_devices)) in created.into_iter().enumerate() {
        let driver_instance = Arc::new(driver_instance);
        for raw in raw_devices {
            let index = PHYSICAL_DEVICE_ALLOCATOR.allocate(PhysicalDeviceTerm {
                dispatch: Arc::clone(&dispatch),
                driver: Arc::clone(&driver_instance),
                driver_index,
                raw,
            });
            physical_devices.push(vk::PhysicalDevice::from_raw(alloc_dispatchable(index)));
        }
        driver_instances.push(driver_instance);
    }

    info!(
        "Creating instance: extensions {:?}, {} driver(s), {} physical device(s)",
        state.enabled_extensions(),
        driver_instances.len(),
        physical_devices.len()
    );

    let index = INSTANCE_ALLOCATOR.allocate(LoaderInstance {
        state,
        dispatch,
        chain,
        drivers: driver_instances,
        physical_devices,
    });
    Ok(vk::Instance::from_raw(alloc_dispatchable(index)))
}

pub unsafe fn destroy_instance(instance: vk::Instance) {
    if instance == vk::Instance::null() {
        return;
    }

    let raw = instance.as_raw();
    let Some(loader_instance) = INSTANCE_ALLOCATOR.remove_dispatchable(raw) else {
        warn!("vkDestroyInstance on unknown instance {:?}", instance);
        return;
    };

    for physical_device in &loader_instance.physical_devices {
        PHYSICAL_DEVICE_ALLOCATOR.remove_dispatchable(physical_device.as_raw());
        free_dispatchable(physical_device.as_raw());
    }
    free_dispatchable(raw);

    info!(
        "Instance destroyed, releasing {} driver instance(s)",
        loader_instance.drivers.len()
    );
}

/// Instance extensions reported to the application: those every driver
/// advertises (at the lowest advertised spec version) plus the ones the loader
/// emulates, restricted to the extensions this loader knows about.
pub fn enumerate_instance_extension_properties(drivers: &DriverSet, config: &LoaderConfig) -> Vec<DriverExtension> {
    let mut extensions: Vec<DriverExtension> = Vec::new();

    if let Some((first, rest)) = drivers.capabilities().split_first() {
        for ext in &first.supported_instance_extensions {
            if extensions.iter().any(|e| e.name == ext.name) {
                continue;
            }
            let spec_version = rest
                .iter()
                .map(|caps| caps.extension(&ext.name).map(|e| e.spec_version))
                .try_fold(ext.spec_version, |min, version| version.map(|v| min.min(v)));
            if let Some(spec_version) = spec_version {
                extensions.push(DriverExtension::new(ext.name.clone(), spec_version));
            }
        }
    }

    for entry in REGISTRY.emulated_instance_extensions() {
        if !extensions.iter().any(|e| e.name == entry.name) {
            extensions.push(DriverExtension::new(entry.name, entry.spec_version));
        }
    }

    if !config.disable_instance_extension_filter {
        extensions.retain(|ext| {
            let known = is_known_instance_extension(&ext.name);
            if !known {
                debug!("Hiding unknown instance extension {}", ext.name);
            }
            known
        });
    }

    extensions
}
