//! Loader side of the ICD interface
//!
//! Everything the loader needs from one driver: its `vk_icdGetInstanceProcAddr`,
//! the negotiated interface version, and per loader instance a driver instance
//! with the entry points the terminators call.

use ash::vk;
use log::{debug, info, warn};
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::driver::{DriverCapabilitySet, DriverExtension, DriverHandle, SymbolLoader};
use crate::error::{check, LoaderError, Result};
use crate::gate::InstanceExtensionState;
use crate::pfn::{self, VoidFunction};
use crate::typed_fn;

/// Highest ICD interface version this loader speaks
pub const LOADER_ICD_INTERFACE_VERSION: u32 = 5;

/// A driver's loader-facing entry points.
#[derive(Clone, Copy)]
pub struct DriverEntry {
    pub driver: DriverHandle,
    pub get_instance_proc_addr: pfn::PFN_vkGetInstanceProcAddr,
    pub interface_version: u32,
}

impl DriverEntry {
    /// Resolve the driver's `GetInstanceProcAddr` and negotiate the interface version.
    pub unsafe fn load(driver: DriverHandle, symbols: &dyn SymbolLoader) -> Result<Self> {
        let icd_gipa = symbols.load_symbol(driver, c"vk_icdGetInstanceProcAddr");
        let exports_icd_gipa = icd_gipa.is_some();
        let gipa = icd_gipa
            .or_else(|| symbols.load_symbol(driver, c"vkGetInstanceProcAddr"))
            .ok_or_else(|| LoaderError::MissingEntryPoint("vk_icdGetInstanceProcAddr".to_string()))?;

        let interface_version = match symbols.load_symbol(driver, c"vk_icdNegotiateLoaderICDInterfaceVersion") {
            Some(negotiate) => {
                let negotiate = typed_fn!(negotiate, pfn::PFN_vkNegotiateLoaderICDInterfaceVersion);
                let mut version = LOADER_ICD_INTERFACE_VERSION;
                let result = negotiate(&mut version);
                if result != vk::Result::SUCCESS {
                    return Err(LoaderError::IncompatibleDriver(format!(
                        "{:?} refused interface negotiation: {:?}",
                        driver, result
                    )));
                }
                version.min(LOADER_ICD_INTERFACE_VERSION)
            }
            None if exports_icd_gipa => 1,
            None => 0,
        };

        info!("Driver {:?} speaks ICD interface v{}", driver, interface_version);

        Ok(Self {
            driver,
            get_instance_proc_addr: typed_fn!(gipa, pfn::PFN_vkGetInstanceProcAddr),
            interface_version,
        })
    }

    /// First of `names` the driver resolves on `instance`.
    pub unsafe fn proc_addr(&self, instance: vk::Instance, names: &[&CStr]) -> Option<VoidFunction> {
        names
            .iter()
            .find_map(|name| (self.get_instance_proc_addr)(instance, name.as_ptr()))
    }

    /// Instance extensions the driver advertises.
    pub unsafe fn instance_extensions(&self) -> Result<Vec<DriverExtension>> {
        let enumerate = self
            .proc_addr(vk::Instance::null(), &[c"vkEnumerateInstanceExtensionProperties"])
            .ok_or_else(|| LoaderError::MissingEntryPoint("vkEnumerateInstanceExtensionProperties".to_string()))?;
        let enumerate = typed_fn!(enumerate, pfn::PFN_vkEnumerateInstanceExtensionProperties);

        let mut count = 0u32;
        check(enumerate(ptr::null(), &mut count, ptr::null_mut()))?;
        let mut properties = vec![vk::ExtensionProperties::default(); count as usize];
        match enumerate(ptr::null(), &mut count, properties.as_mut_ptr()) {
            vk::Result::SUCCESS | vk::Result::INCOMPLETE => {}
            other => return Err(LoaderError::Driver(other)),
        }
        properties.truncate(count as usize);

        Ok(properties.iter().map(DriverExtension::from_properties).collect())
    }
}

macro_rules! required {
    ($entry:expr, $instance:expr, $name:expr, $pfn:ty) => {
        match $entry.proc_addr($instance, &[$name]) {
            Some(f) => typed_fn!(f, $pfn),
            None => return Err(LoaderError::MissingEntryPoint($name.to_string_lossy().into_owned())),
        }
    };
}

macro_rules! optional {
    ($entry:expr, $instance:expr, [$($name:expr),+], $pfn:ty) => {
        $entry
            .proc_addr($instance, &[$($name),+])
            .map(|f| typed_fn!(f, $pfn))
    };
}

/// Driver entry points for one driver instance.
pub struct DriverDispatch {
    pub destroy_instance: pfn::PFN_vkDestroyInstance,
    pub enumerate_physical_devices: pfn::PFN_vkEnumeratePhysicalDevices,
    pub get_physical_device_features: pfn::PFN_vkGetPhysicalDeviceFeatures,
    pub get_physical_device_properties: pfn::PFN_vkGetPhysicalDeviceProperties,
    pub get_physical_device_format_properties: pfn::PFN_vkGetPhysicalDeviceFormatProperties,
    pub get_physical_device_image_format_properties: pfn::PFN_vkGetPhysicalDeviceImageFormatProperties,
    pub get_physical_device_memory_properties: pfn::PFN_vkGetPhysicalDeviceMemoryProperties,
    pub get_physical_device_queue_family_properties: pfn::PFN_vkGetPhysicalDeviceQueueFamilyProperties,
    pub create_device: pfn::PFN_vkCreateDevice,
    pub get_device_proc_addr: pfn::PFN_vkGetDeviceProcAddr,

    pub destroy_surface: Option<pfn::PFN_vkDestroySurfaceKHR>,
    pub get_physical_device_surface_support: Option<pfn::PFN_vkGetPhysicalDeviceSurfaceSupportKHR>,
    pub get_physical_device_surface_capabilities: Option<pfn::PFN_vkGetPhysicalDeviceSurfaceCapabilitiesKHR>,
    pub get_physical_device_surface_formats: Option<pfn::PFN_vkGetPhysicalDeviceSurfaceFormatsKHR>,
    pub get_physical_device_surface_present_modes: Option<pfn::PFN_vkGetPhysicalDeviceSurfacePresentModesKHR>,

    pub get_physical_device_features2: Option<pfn::PFN_vkGetPhysicalDeviceFeatures2>,
    pub get_physical_device_properties2: Option<pfn::PFN_vkGetPhysicalDeviceProperties2>,
    pub get_physical_device_format_properties2: Option<pfn::PFN_vkGetPhysicalDeviceFormatProperties2>,
    pub get_physical_device_memory_properties2: Option<pfn::PFN_vkGetPhysicalDeviceMemoryProperties2>,

    pub get_physical_device_external_buffer_properties: Option<pfn::PFN_vkGetPhysicalDeviceExternalBufferProperties>,
    pub get_physical_device_external_semaphore_properties:
        Option<pfn::PFN_vkGetPhysicalDeviceExternalSemaphoreProperties>,
    pub get_physical_device_external_fence_properties: Option<pfn::PFN_vkGetPhysicalDeviceExternalFenceProperties>,
    pub get_physical_device_external_image_format_properties_nv:
        Option<pfn::PFN_vkGetPhysicalDeviceExternalImageFormatPropertiesNV>,

    pub release_display: Option<pfn::PFN_vkReleaseDisplayEXT>,
    pub enumerate_physical_device_groups: Option<pfn::PFN_vkEnumeratePhysicalDeviceGroups>,
}

impl DriverDispatch {
    /// Core entries are mandatory; for promoted commands the core name is
    /// tried before the extension alias.
    pub unsafe fn load(entry: &DriverEntry, instance: vk::Instance) -> Result<Self> {
        Ok(Self {
            destroy_instance: required!(entry, instance, c"vkDestroyInstance", pfn::PFN_vkDestroyInstance),
            enumerate_physical_devices: required!(
                entry,
                instance,
                c"vkEnumeratePhysicalDevices",
                pfn::PFN_vkEnumeratePhysicalDevices
            ),
            get_physical_device_features: required!(
                entry,
                instance,
                c"vkGetPhysicalDeviceFeatures",
                pfn::PFN_vkGetPhysicalDeviceFeatures
            ),
            get_physical_device_properties: required!(
                entry,
                instance,
                c"vkGetPhysicalDeviceProperties",
                pfn::PFN_vkGetPhysicalDeviceProperties
            ),
            get_physical_device_format_properties: required!(
                entry,
                instance,
                c"vkGetPhysicalDeviceFormatProperties",
                pfn::PFN_vkGetPhysicalDeviceFormatProperties
            ),
            get_physical_device_image_format_properties: required!(
                entry,
                instance,
                c"vkGetPhysicalDeviceImageFormatProperties",
                pfn::PFN_vkGetPhysicalDeviceImageFormatProperties
            ),
            get_physical_device_memory_properties: required!(
                entry,
                instance,
                c"vkGetPhysicalDeviceMemoryProperties",
                pfn::PFN_vkGetPhysicalDeviceMemoryProperties
            ),
            get_physical_device_queue_family_properties: required!(
                entry,
                instance,
                c"vkGetPhysicalDeviceQueueFamilyProperties",
                pfn::PFN_vkGetPhysicalDeviceQueueFamilyProperties
            ),
            create_device: required!(entry, instance, c"vkCreateDevice", pfn::PFN_vkCreateDevice),
            get_device_proc_addr: required!(entry, instance, c"vkGetDeviceProcAddr", pfn::PFN_vkGetDeviceProcAddr),

            destroy_surface: optional!(entry, instance, [c"vkDestroySurfaceKHR"], pfn::PFN_vkDestroySurfaceKHR),
            get_physical_device_surface_support: optional!(
                entry,
                instance,
                [c"vkGetPhysicalDeviceSurfaceSupportKHR"],
                pfn::PFN_vkGetPhysicalDeviceSurfaceSupportKHR
            ),
            get_physical_device_surface_capabilities: optional!(
                entry,
                instance,
                [c"vkGetPhysicalDeviceSurfaceCapabilitiesKHR"],
                pfn::PFN_vkGetPhysicalDeviceSurfaceCapabilitiesKHR
            ),
            get_physical_device_surface_formats: optional!(
                entry,
                instance,
                [c"vkGetPhysicalDeviceSurfaceFormatsKHR"],
                pfn::PFN_vkGetPhysicalDeviceSurfaceFormatsKHR
            ),
            get_physical_device_surface_present_modes: optional!(
                entry,
                instance,
                [c"vkGetPhysicalDeviceSurfacePresentModesKHR"],
                pfn::PFN_vkGetPhysicalDeviceSurfacePresentModesKHR
            ),

            get_physical_device_features2: optional!(
                entry,
                instance,
                [c"vkGetPhysicalDeviceFeatures2", c"vkGetPhysicalDeviceFeatures2KHR"],
                pfn::PFN_vkGetPhysicalDeviceFeatures2
            ),
            get_physical_device_properties2: optional!(
                entry,
                instance,
                [c"vkGetPhysicalDeviceProperties2", c"vkGetPhysicalDeviceProperties2KHR"],
                pfn::PFN_vkGetPhysicalDeviceProperties2
            ),
            get_physical_device_format_properties2: optional!(
                entry,
                instance,
                [c"vkGetPhysicalDeviceFormatProperties2", c"vkGetPhysicalDeviceFormatProperties2KHR"],
                pfn::PFN_vkGetPhysicalDeviceFormatProperties2
            ),
            get_physical_device_memory_properties2: optional!(
                entry,
                instance,
                [c"vkGetPhysicalDeviceMemoryProperties2", c"vkGetPhysicalDeviceMemoryProperties2KHR"],
                pfn::PFN_vkGetPhysicalDeviceMemoryProperties2
            ),

            get_physical_device_external_buffer_properties: optional!(
                entry,
                instance,
                [
                    c"vkGetPhysicalDeviceExternalBufferProperties",
                    c"vkGetPhysicalDeviceExternalBufferPropertiesKHR"
                ],
                pfn::PFN_vkGetPhysicalDeviceExternalBufferProperties
            ),
            get_physical_device_external_semaphore_properties: optional!(
                entry,
                instance,
                [
                    c"vkGetPhysicalDeviceExternalSemaphoreProperties",
                    c"vkGetPhysicalDeviceExternalSemaphorePropertiesKHR"
                ],
                pfn::PFN_vkGetPhysicalDeviceExternalSemaphoreProperties
            ),
            get_physical_device_external_fence_properties: optional!(
                entry,
                instance,
                [
                    c"vkGetPhysicalDeviceExternalFenceProperties",
                    c"vkGetPhysicalDeviceExternalFencePropertiesKHR"
                ],
                pfn::PFN_vkGetPhysicalDeviceExternalFenceProperties
            ),
            get_physical_device_external_image_format_properties_nv: optional!(
                entry,
                instance,
                [c"vkGetPhysicalDeviceExternalImageFormatPropertiesNV"],
                pfn::PFN_vkGetPhysicalDeviceExternalImageFormatPropertiesNV
            ),

            release_display: optional!(entry, instance, [c"vkReleaseDisplayEXT"], pfn::PFN_vkReleaseDisplayEXT),
            enumerate_physical_device_groups: optional!(
                entry,
                instance,
                [c"vkEnumeratePhysicalDeviceGroups", c"vkEnumeratePhysicalDeviceGroupsKHR"],
                pfn::PFN_vkEnumeratePhysicalDeviceGroups
            ),
        })
    }
}

/// A driver's own instance, created on behalf of one loader instance.
/// Dropping it destroys the driver instance.
pub struct DriverInstance {
    pub driver: DriverHandle,
    pub instance: vk::Instance,
    pub interface_version: u32,
    /// Subset of the loader instance's extensions this driver was given
    pub enabled_extensions: Vec<String>,
    pub dispatch: DriverDispatch,
}

impl DriverInstance {
    pub unsafe fn create(
        entry: &DriverEntry,
        capabilities: &DriverCapabilitySet,
        state: &InstanceExtensionState,
        application_info: Option<&vk::ApplicationInfo>,
    ) -> Result<Self> {
        let create_instance = entry
            .proc_addr(vk::Instance::null(), &[c"vkCreateInstance"])
            .ok_or_else(|| LoaderError::MissingEntryPoint("vkCreateInstance".to_string()))?;
        let create_instance = typed_fn!(create_instance, pfn::PFN_vkCreateInstance);

        // Emulated extensions the driver never advertised are not passed down
        let enabled_extensions: Vec<String> = state
            .enabled_extensions()
            .iter()
            .filter(|name| capabilities.supports(name))
            .cloned()
            .collect();
        let names: Vec<CString> = enabled_extensions
            .iter()
            .filter_map(|name| CString::new(name.as_str()).ok())
            .collect();
        let name_ptrs: Vec<*const c_char> = names.iter().map(|name| name.as_ptr()).collect();

        let mut create_info = vk::InstanceCreateInfo::default().enabled_extension_names(&name_ptrs);
        if let Some(application_info) = application_info {
            create_info = create_info.application_info(application_info);
        }

        let mut instance = vk::Instance::null();
        check(create_instance(&create_info, ptr::null(), &mut instance))?;
        debug!(
            "Driver {:?} created instance {:?} with {:?}",
            entry.driver, instance, enabled_extensions
        );

        let dispatch = match DriverDispatch::load(entry, instance) {
            Ok(dispatch) => dispatch,
            Err(e) => {
                if let Some(destroy) = entry.proc_addr(instance, &[c"vkDestroyInstance"]) {
                    typed_fn!(destroy, pfn::PFN_vkDestroyInstance)(instance, ptr::null());
                }
                return Err(e);
            }
        };

        Ok(Self {
            driver: entry.driver,
            instance,
            interface_version: entry.interface_version,
            enabled_extensions,
            dispatch,
        })
    }

    /// The driver's physical devices, in the order it reports them.
    pub unsafe fn enumerate_physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>> {
        let mut count = 0u32;
        check((self.dispatch.enumerate_physical_devices)(
            self.instance,
            &mut count,
            ptr::null_mut(),
        ))?;

        let mut devices = vec![vk::PhysicalDevice::null(); count as usize];
        match (self.dispatch.enumerate_physical_devices)(self.instance, &mut count, devices.as_mut_ptr()) {
            vk::Result::SUCCESS => {}
            vk::Result::INCOMPLETE => warn!("Driver {:?} grew its device list mid-enumeration", self.driver),
            other => return Err(LoaderError::Driver(other)),
        }
        devices.truncate(count as usize);
        Ok(devices)
    }
}

impl Drop for DriverInstance {
    fn drop(&mut self) {
        debug!("Destroying driver instance {:?} of {:?}", self.instance, self.driver);
        unsafe { (self.dispatch.destroy_instance)(self.instance, ptr::null()) };
    }
}
