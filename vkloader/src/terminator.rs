//! Instance-level terminators
//!
//! Terminators end the dispatch chain.  They receive loader handles, translate
//! them into the owning driver's handles and call that driver, falling back to
//! loader emulation where a driver lacks an entry point.

#![allow(non_snake_case)]

use ash::vk;
use log::{debug, error, warn};
use std::ptr;
use std::sync::Arc;

use crate::device;
use crate::instance::{self, LoaderInstance, PhysicalDeviceTerm};
use crate::pfn::{self, VoidFunction};
use crate::surface;
use crate::void_fn;

/// Terminators every dispatch table carries, whatever the enabled extensions.
pub fn core_terminators() -> Vec<(&'static str, VoidFunction)> {
    vec![
        (
            "vkEnumeratePhysicalDevices",
            void_fn!(terminator_EnumeratePhysicalDevices, pfn::PFN_vkEnumeratePhysicalDevices),
        ),
        (
            "vkCreateDevice",
            void_fn!(device::terminator_CreateDevice, pfn::PFN_vkCreateDevice),
        ),
        (
            "vkGetPhysicalDeviceFeatures",
            void_fn!(terminator_GetPhysicalDeviceFeatures, pfn::PFN_vkGetPhysicalDeviceFeatures),
        ),
        (
            "vkGetPhysicalDeviceProperties",
            void_fn!(terminator_GetPhysicalDeviceProperties, pfn::PFN_vkGetPhysicalDeviceProperties),
        ),
        (
            "vkGetPhysicalDeviceFormatProperties",
            void_fn!(
                terminator_GetPhysicalDeviceFormatProperties,
                pfn::PFN_vkGetPhysicalDeviceFormatProperties
            ),
        ),
        (
            "vkGetPhysicalDeviceImageFormatProperties",
            void_fn!(
                terminator_GetPhysicalDeviceImageFormatProperties,
                pfn::PFN_vkGetPhysicalDeviceImageFormatProperties
            ),
        ),
        (
            "vkGetPhysicalDeviceMemoryProperties",
            void_fn!(
                terminator_GetPhysicalDeviceMemoryProperties,
                pfn::PFN_vkGetPhysicalDeviceMemoryProperties
            ),
        ),
        (
            "vkGetPhysicalDeviceQueueFamilyProperties",
            void_fn!(
                terminator_GetPhysicalDeviceQueueFamilyProperties,
                pfn::PFN_vkGetPhysicalDeviceQueueFamilyProperties
            ),
        ),
    ]
}

/// Write `items` out following the count/`VK_INCOMPLETE` convention.
pub(crate) unsafe fn fill_out_array<T: Copy>(items: &[T], p_count: *mut u32, p_items: *mut T) -> vk::Result {
    if p_items.is_null() {
        *p_count = items.len() as u32;
        return vk::Result::SUCCESS;
    }

    let count = (*p_count as usize).min(items.len());
    ptr::copy_nonoverlapping(items.as_ptr(), p_items, count);
    *p_count = count as u32;

    if count < items.len() {
        vk::Result::INCOMPLETE
    } else {
        vk::Result::SUCCESS
    }
}

fn physical_device(physical_device: vk::PhysicalDevice, command: &str) -> Option<Arc<PhysicalDeviceTerm>> {
    let term = instance::get_physical_device(physical_device);
    if term.is_none() {
        error!("{}: invalid physical device {:?}", command, physical_device);
    }
    term
}

fn loader_instance(instance: vk::Instance, command: &str) -> Option<Arc<LoaderInstance>> {
    let loader_instance = instance::get_instance(instance);
    if loader_instance.is_none() {
        error!("{}: invalid instance {:?}", command, instance);
    }
    loader_instance
}

fn missing(command: &str, term: &PhysicalDeviceTerm) -> vk::Result {
    error!("Driver {:?} does not implement {}", term.driver.driver, command);
    vk::Result::ERROR_EXTENSION_NOT_PRESENT
}

// Core

pub unsafe extern "system" fn terminator_EnumeratePhysicalDevices(
    instance: vk::Instance,
    p_physical_device_count: *mut u32,
    p_physical_devices: *mut vk::PhysicalDevice,
) -> vk::Result {
    let Some(loader_instance) = loader_instance(instance, "vkEnumeratePhysicalDevices") else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    fill_out_array(
        &loader_instance.physical_devices,
        p_physical_device_count,
        p_physical_devices,
    )
}

pub unsafe extern "system" fn terminator_GetPhysicalDeviceFeatures(
    physical_device: vk::PhysicalDevice,
    p_features: *mut vk::PhysicalDeviceFeatures,
) {
    if let Some(term) = self::physical_device(physical_device, "vkGetPhysicalDeviceFeatures") {
        (term.driver.dispatch.get_physical_device_features)(term.raw, p_features);
    }
}

pub unsafe extern "system" fn terminator_GetPhysicalDeviceProperties(
    physical_device: vk::PhysicalDevice,
    p_properties: *mut vk::PhysicalDeviceProperties,
) {
    if let Some(term) = self::physical_device(physical_device, "vkGetPhysicalDeviceProperties") {
        (term.driver.dispatch.get_physical_device_properties)(term.raw, p_properties);
    }
}

pub unsafe extern "system" fn terminator_GetPhysicalDeviceFormatProperties(
    physical_device: vk::PhysicalDevice,
    format: vk::Format,
    p_format_properties: *mut vk::FormatProperties,
) {
    if let Some(term) = self::physical_device(physical_device, "vkGetPhysicalDeviceFormatProperties") {
        (term.driver.dispatch.get_physical_device_format_properties)(term.raw, format, p_format_properties);
    }
}

pub unsafe extern "system" fn terminator_GetPhysicalDeviceImageFormatProperties(
    physical_device: vk::PhysicalDevice,
    format: vk::Format,
    image_type: vk::ImageType,
    tiling: vk::ImageTiling,
    usage: vk::ImageUsageFlags,
    flags: vk::ImageCreateFlags,
    p_image_format_properties: *mut vk::ImageFormatProperties,
) -> vk::Result {
    let Some(term) = self::physical_device(physical_device, "vkGetPhysicalDeviceImageFormatProperties") else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    (term.driver.dispatch.get_physical_device_image_format_properties)(
        term.raw,
        format,
        image_type,
        tiling,
        usage,
        flags,
        p_image_format_properties,
    )
}

pub unsafe extern "system" fn terminator_GetPhysicalDeviceMemoryProperties(
    physical_device: vk::PhysicalDevice,
    p_memory_properties: *mut vk::PhysicalDeviceMemoryProperties,
) {
    if let Some(term) = self::physical_device(physical_device, "vkGetPhysicalDeviceMemoryProperties") {
        (term.driver.dispatch.get_physical_device_memory_properties)(term.raw, p_memory_properties);
    }
}

pub unsafe extern "system" fn terminator_GetPhysicalDeviceQueueFamilyProperties(
    physical_device: vk::PhysicalDevice,
    p_queue_family_property_count: *mut u32,
    p_queue_family_properties: *mut vk::QueueFamilyProperties,
) {
    if let Some(term) = self::physical_device(physical_device, "vkGetPhysicalDeviceQueueFamilyProperties") {
        (term.driver.dispatch.get_physical_device_queue_family_properties)(
            term.raw,
            p_queue_family_property_count,
            p_queue_family_properties,
        );
    }
}

// VK_KHR_surface

pub unsafe extern "system" fn terminator_DestroySurfaceKHR(
    instance: vk::Instance,
    surface: vk::SurfaceKHR,
    p_allocator: *const vk::AllocationCallbacks,
) {
    if surface == vk::SurfaceKHR::null() {
        return;
    }
    let Some(loader_instance) = loader_instance(instance, "vkDestroySurfaceKHR") else {
        return;
    };

    match surface::unregister_surface(surface) {
        Some(data) => {
            for (driver, driver_surface) in loader_instance.drivers.iter().zip(&data.per_driver) {
                if *driver_surface == vk::SurfaceKHR::null() {
                    continue;
                }
                match driver.dispatch.destroy_surface {
                    Some(destroy) => destroy(driver.instance, *driver_surface, p_allocator),
                    None => error!("Driver {:?} does not implement vkDestroySurfaceKHR", driver.driver),
                }
            }
            debug!("Destroyed surface {:?}", surface);
        }
        None => match loader_instance.drivers.as_slice() {
            [driver] => match driver.dispatch.destroy_surface {
                Some(destroy) => destroy(driver.instance, surface, p_allocator),
                None => error!("Driver {:?} does not implement vkDestroySurfaceKHR", driver.driver),
            },
            drivers => error!(
                "vkDestroySurfaceKHR: surface {:?} was never registered, cannot tell which of {} drivers owns it",
                surface,
                drivers.len()
            ),
        },
    }
}

pub unsafe extern "system" fn terminator_GetPhysicalDeviceSurfaceSupportKHR(
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
    surface: vk::SurfaceKHR,
    p_supported: *mut vk::Bool32,
) -> vk::Result {
    const COMMAND: &str = "vkGetPhysicalDeviceSurfaceSupportKHR";
    let Some(term) = self::physical_device(physical_device, COMMAND) else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    let Some(support) = term.driver.dispatch.get_physical_device_surface_support else {
        return missing(COMMAND, &term);
    };
    support(
        term.raw,
        queue_family_index,
        surface::real_surface(surface, term.driver_index),
        p_supported,
    )
}

pub unsafe extern "system" fn terminator_GetPhysicalDeviceSurfaceCapabilitiesKHR(
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    p_surface_capabilities: *mut vk::SurfaceCapabilitiesKHR,
) -> vk::Result {
    const COMMAND: &str = "vkGetPhysicalDeviceSurfaceCapabilitiesKHR";
    let Some(term) = self::physical_device(physical_device, COMMAND) else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    let Some(capabilities) = term.driver.dispatch.get_physical_device_surface_capabilities else {
        return missing(COMMAND, &term);
    };
    capabilities(
        term.raw,
        surface::real_surface(surface, term.driver_index),
        p_surface_capabilities,
    )
}

pub unsafe extern "system" fn terminator_GetPhysicalDeviceSurfaceFormatsKHR(
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    p_surface_format_count: *mut u32,
    p_surface_formats: *mut vk::SurfaceFormatKHR,
) -> vk::Result {
    const COMMAND: &str = "vkGetPhysicalDeviceSurfaceFormatsKHR";
    let Some(term) = self::physical_device(physical_device, COMMAND) else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    let Some(formats) = term.driver.dispatch.get_physical_device_surface_formats else {
        return missing(COMMAND, &term);
    };
    formats(
        term.raw,
        surface::real_surface(surface, term.driver_index),
        p_surface_format_count,
        p_surface_formats,
    )
}

pub unsafe extern "system" fn terminator_GetPhysicalDeviceSurfacePresentModesKHR(
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    p_present_mode_count: *mut u32,
    p_present_modes: *mut vk::PresentModeKHR,
) -> vk::Result {
    const COMMAND: &str = "vkGetPhysicalDeviceSurfacePresentModesKHR";
    let Some(term) = self::physical_device(physical_device, COMMAND) else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    let Some(present_modes) = term.driver.dispatch.get_physical_device_surface_present_modes else {
        return missing(COMMAND, &term);
    };
    present_modes(
        term.raw,
        surface::real_surface(surface, term.driver_index),
        p_present_mode_count,
        p_present_modes,
    )
}

// VK_KHR_get_physical_device_properties2
//
// Drivers without the *2 entry points get the core query; extension structs
// chained through pNext are left as the application passed them.

pub unsafe extern "system" fn terminator_GetPhysicalDeviceFeatures2(
    physical_device: vk::PhysicalDevice,
    p_features: *mut vk::PhysicalDeviceFeatures2,
) {
    let Some(term) = self::physical_device(physical_device, "vkGetPhysicalDeviceFeatures2") else {
        return;
    };
    match term.driver.dispatch.get_physical_device_features2 {
        Some(features2) => features2(term.raw, p_features),
        None => {
            let features = &mut *p_features;
            if !features.p_next.is_null() {
                debug!("vkGetPhysicalDeviceFeatures2 emulation ignores the pNext chain");
            }
            (term.driver.dispatch.get_physical_device_features)(term.raw, &mut features.features);
        }
    }
}

pub unsafe extern "system" fn terminator_GetPhysicalDeviceProperties2(
    physical_device: vk::PhysicalDevice,
    p_properties: *mut vk::PhysicalDeviceProperties2,
) {
    let Some(term) = self::physical_device(physical_device, "vkGetPhysicalDeviceProperties2") else {
        return;
    };
    match term.driver.dispatch.get_physical_device_properties2 {
        Some(properties2) => properties2(term.raw, p_properties),
        None => {
            let properties = &mut *p_properties;
            (term.driver.dispatch.get_physical_device_properties)(term.raw, &mut properties.properties);
        }
    }
}

pub unsafe extern "system" fn terminator_GetPhysicalDeviceFormatProperties2(
    physical_device: vk::PhysicalDevice,
    format: vk::Format,
    p_format_properties: *mut vk::FormatProperties2,
) {
    let Some(term) = self::physical_device(physical_device, "vkGetPhysicalDeviceFormatProperties2") else {
        return;
    };
    match term.driver.dispatch.get_physical_device_format_properties2 {
        Some(format_properties2) => format_properties2(term.raw, format, p_format_properties),
        None => {
            let properties = &mut *p_format_properties;
            (term.driver.dispatch.get_physical_device_format_properties)(
                term.raw,
                format,
                &mut properties.format_properties,
            );
        }
    }
}

pub unsafe extern "system" fn terminator_GetPhysicalDeviceMemoryProperties2(
    physical_device: vk::PhysicalDevice,
    p_memory_properties: *mut vk::PhysicalDeviceMemoryProperties2,
) {
    let Some(term) = self::physical_device(physical_device, "vkGetPhysicalDeviceMemoryProperties2") else {
        return;
    };
    match term.driver.dispatch.get_physical_device_memory_properties2 {
        Some(memory_properties2) => memory_properties2(term.raw, p_memory_properties),
        None => {
            let properties = &mut *p_memory_properties;
            (term.driver.dispatch.get_physical_device_memory_properties)(
                term.raw,
                &mut properties.memory_properties,
            );
        }
    }
}

// External memory, semaphore and fence capabilities: without driver support
// nothing can be exported or imported.

pub unsafe extern "system" fn terminator_GetPhysicalDeviceExternalBufferProperties(
    physical_device: vk::PhysicalDevice,
    p_external_buffer_info: *const vk::PhysicalDeviceExternalBufferInfo,
    p_external_buffer_properties: *mut vk::ExternalBufferProperties,
) {
    let Some(term) = self::physical_device(physical_device, "vkGetPhysicalDeviceExternalBufferProperties") else {
        return;
    };
    match term.driver.dispatch.get_physical_device_external_buffer_properties {
        Some(query) => query(term.raw, p_external_buffer_info, p_external_buffer_properties),
        None => {
            (*p_external_buffer_properties).external_memory_properties = vk::ExternalMemoryProperties::default();
        }
    }
}

pub unsafe extern "system" fn terminator_GetPhysicalDeviceExternalSemaphoreProperties(
    physical_device: vk::PhysicalDevice,
    p_external_semaphore_info: *const vk::PhysicalDeviceExternalSemaphoreInfo,
    p_external_semaphore_properties: *mut vk::ExternalSemaphoreProperties,
) {
    let Some(term) = self::physical_device(physical_device, "vkGetPhysicalDeviceExternalSemaphoreProperties")
    else {
        return;
    };
    match term.driver.dispatch.get_physical_device_external_semaphore_properties {
        Some(query) => query(term.raw, p_external_semaphore_info, p_external_semaphore_properties),
        None => {
            let properties = &mut *p_external_semaphore_properties;
            properties.export_from_imported_handle_types = vk::ExternalSemaphoreHandleTypeFlags::empty();
            properties.compatible_handle_types = vk::ExternalSemaphoreHandleTypeFlags::empty();
            properties.external_semaphore_features = vk::ExternalSemaphoreFeatureFlags::empty();
        }
    }
}

pub unsafe extern "system" fn terminator_GetPhysicalDeviceExternalFenceProperties(
    physical_device: vk::PhysicalDevice,
    p_external_fence_info: *const vk::PhysicalDeviceExternalFenceInfo,
    p_external_fence_properties: *mut vk::ExternalFenceProperties,
) {
    let Some(term) = self::physical_device(physical_device, "vkGetPhysicalDeviceExternalFenceProperties") else {
        return;
    };
    match term.driver.dispatch.get_physical_device_external_fence_properties {
        Some(query) => query(term.raw, p_external_fence_info, p_external_fence_properties),
        None => {
            let properties = &mut *p_external_fence_properties;
            properties.export_from_imported_handle_types = vk::ExternalFenceHandleTypeFlags::empty();
            properties.compatible_handle_types = vk::ExternalFenceHandleTypeFlags::empty();
            properties.external_fence_features = vk::ExternalFenceFeatureFlags::empty();
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub unsafe extern "system" fn terminator_GetPhysicalDeviceExternalImageFormatPropertiesNV(
    physical_device: vk::PhysicalDevice,
    format: vk::Format,
    image_type: vk::ImageType,
    tiling: vk::ImageTiling,
    usage: vk::ImageUsageFlags,
    flags: vk::ImageCreateFlags,
    external_handle_type: vk::ExternalMemoryHandleTypeFlagsNV,
    p_external_image_format_properties: *mut vk::ExternalImageFormatPropertiesNV,
) -> vk::Result {
    let Some(term) = self::physical_device(
        physical_device,
        "vkGetPhysicalDeviceExternalImageFormatPropertiesNV",
    ) else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };

    if let Some(query) = term.driver.dispatch.get_physical_device_external_image_format_properties_nv {
        return query(
            term.raw,
            format,
            image_type,
            tiling,
            usage,
            flags,
            external_handle_type,
            p_external_image_format_properties,
        );
    }

    if !external_handle_type.is_empty() {
        return vk::Result::ERROR_FORMAT_NOT_SUPPORTED;
    }

    let properties = &mut *p_external_image_format_properties;
    properties.external_memory_features = vk::ExternalMemoryFeatureFlagsNV::empty();
    properties.export_from_imported_handle_types = vk::ExternalMemoryHandleTypeFlagsNV::empty();
    properties.compatible_handle_types = vk::ExternalMemoryHandleTypeFlagsNV::empty();

    (term.driver.dispatch.get_physical_device_image_format_properties)(
        term.raw,
        format,
        image_type,
        tiling,
        usage,
        flags,
        &mut properties.image_format_properties,
    )
}

// VK_EXT_direct_mode_display

pub unsafe extern "system" fn terminator_ReleaseDisplayEXT(
    physical_device: vk::PhysicalDevice,
    display: vk::DisplayKHR,
) -> vk::Result {
    const COMMAND: &str = "vkReleaseDisplayEXT";
    let Some(term) = self::physical_device(physical_device, COMMAND) else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    match term.driver.dispatch.release_display {
        Some(release) => release(term.raw, display),
        None => missing(COMMAND, &term),
    }
}

// VK_KHR_device_group_creation

struct DeviceGroup {
    devices: Vec<vk::PhysicalDevice>,
    subset_allocation: vk::Bool32,
}

/// Groups reported by one driver, in loader handles.  Drivers that cannot
/// report groups get one single-device group per physical device.
unsafe fn driver_device_groups(loader_instance: &LoaderInstance, driver_index: usize) -> Vec<DeviceGroup> {
    let owned: Vec<(vk::PhysicalDevice, vk::PhysicalDevice)> = loader_instance
        .physical_devices
        .iter()
        .filter_map(|pd| {
            instance::get_physical_device(*pd)
                .filter(|term| term.driver_index == driver_index)
                .map(|term| (term.raw, *pd))
        })
        .collect();

    let driver = &loader_instance.drivers[driver_index];
    let single = |owned: &[(vk::PhysicalDevice, vk::PhysicalDevice)]| -> Vec<DeviceGroup> {
        owned
            .iter()
            .map(|(_, pd)| DeviceGroup {
                devices: vec![*pd],
                subset_allocation: vk::FALSE,
            })
            .collect()
    };

    let Some(enumerate_groups) = driver.dispatch.enumerate_physical_device_groups else {
        return single(&owned);
    };

    let mut count = 0u32;
    if enumerate_groups(driver.instance, &mut count, ptr::null_mut()) != vk::Result::SUCCESS {
        warn!("Driver {:?} failed to count device groups", driver.driver);
        return single(&owned);
    }
    let mut groups = vec![vk::PhysicalDeviceGroupProperties::default(); count as usize];
    match enumerate_groups(driver.instance, &mut count, groups.as_mut_ptr()) {
        vk::Result::SUCCESS | vk::Result::INCOMPLETE => {}
        other => {
            warn!("Driver {:?} failed to enumerate device groups: {:?}", driver.driver, other);
            return single(&owned);
        }
    }
    groups.truncate(count as usize);

    groups
        .iter()
        .map(|group| DeviceGroup {
            devices: group.physical_devices[..(group.physical_device_count as usize).min(vk::MAX_DEVICE_GROUP_SIZE)]
                .iter()
                .filter_map(|raw| owned.iter().find(|(r, _)| r == raw).map(|(_, pd)| *pd))
                .collect(),
            subset_allocation: group.subset_allocation,
        })
        .filter(|group| !group.devices.is_empty())
        .collect()
}

pub unsafe extern "system" fn terminator_EnumeratePhysicalDeviceGroups(
    instance: vk::Instance,
    p_physical_device_group_count: *mut u32,
    p_physical_device_group_properties: *mut vk::PhysicalDeviceGroupProperties,
) -> vk::Result {
    let Some(loader_instance) = loader_instance(instance, "vkEnumeratePhysicalDeviceGroups") else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };

    let groups: Vec<DeviceGroup> = (0..loader_instance.drivers.len())
        .flat_map(|driver_index| driver_device_groups(&loader_instance, driver_index))
        .collect();

    if p_physical_device_group_properties.is_null() {
        *p_physical_device_group_count = groups.len() as u32;
        return vk::Result::SUCCESS;
    }

    let count = (*p_physical_device_group_count as usize).min(groups.len());
    for (i, group) in groups.iter().take(count).enumerate() {
        // sType and pNext belong to the application
        let out = &mut *p_physical_device_group_properties.add(i);
        let n = group.devices.len().min(vk::MAX_DEVICE_GROUP_SIZE);
        out.physical_device_count = n as u32;
        out.physical_devices = [vk::PhysicalDevice::null(); vk::MAX_DEVICE_GROUP_SIZE];
        out.physical_devices[..n].copy_from_slice(&group.devices[..n]);
        out.subset_allocation = group.subset_allocation;
    }
    *p_physical_device_group_count = count as u32;

    if count < groups.len() {
        vk::Result::INCOMPLETE
    } else {
        vk::Result::SUCCESS
    }
}
