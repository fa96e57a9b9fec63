//! Loader trampolines
//!
//! A trampoline is what the application calls.  It finds the dispatch table of
//! the instance a handle belongs to and jumps to the slot for its command,
//! which is either a loader terminator or the next element of the layer chain.
//! Handles are passed on unchanged; terminators do the unwrapping.

#![allow(non_snake_case)]

use ash::vk;
use log::error;
use std::sync::Arc;

use crate::dispatch::DispatchTable;
use crate::instance;
use crate::pfn;
use crate::typed_fn;

fn instance_dispatch(instance: vk::Instance, command: &str) -> Option<Arc<DispatchTable>> {
    let dispatch = instance::get_instance(instance).map(|loader_instance| Arc::clone(&loader_instance.dispatch));
    if dispatch.is_none() {
        error!("{}: invalid instance {:?}", command, instance);
    }
    dispatch
}

fn physical_device_dispatch(physical_device: vk::PhysicalDevice, command: &str) -> Option<Arc<DispatchTable>> {
    let dispatch = instance::get_physical_device(physical_device).map(|term| Arc::clone(&term.dispatch));
    if dispatch.is_none() {
        error!("{}: invalid physical device {:?}", command, physical_device);
    }
    dispatch
}

/// Call the dispatch slot for `$command`, or evaluate `$unbound` when the
/// instance has no such slot (its extension was not enabled).
macro_rules! forward {
    ($dispatch:expr, $command:expr, $pfn:ty, $unbound:expr, ($($arg:expr),* $(,)?)) => {
        match $dispatch.get($command) {
            Some(f) => typed_fn!(f, $pfn)($($arg),*),
            None => {
                error!("{} called but not enabled on this instance", $command);
                $unbound
            }
        }
    };
}

/// Instance-level trampoline: `$unbound` is returned for a bad handle too.
macro_rules! instance_trampoline {
    ($instance:expr, $command:expr, $pfn:ty, $unbound:expr, $invalid:expr, ($($arg:expr),* $(,)?)) => {{
        let Some(dispatch) = instance_dispatch($instance, $command) else {
            return $invalid;
        };
        forward!(dispatch, $command, $pfn, $unbound, ($($arg),*))
    }};
}

macro_rules! physical_device_trampoline {
    ($physical_device:expr, $command:expr, $pfn:ty, $unbound:expr, $invalid:expr, ($($arg:expr),* $(,)?)) => {{
        let Some(dispatch) = physical_device_dispatch($physical_device, $command) else {
            return $invalid;
        };
        forward!(dispatch, $command, $pfn, $unbound, ($($arg),*))
    }};
}

// Core commands exported by the loader library

#[no_mangle]
pub unsafe extern "system" fn vkEnumeratePhysicalDevices(
    instance: vk::Instance,
    p_physical_device_count: *mut u32,
    p_physical_devices: *mut vk::PhysicalDevice,
) -> vk::Result {
    instance_trampoline!(
        instance,
        "vkEnumeratePhysicalDevices",
        pfn::PFN_vkEnumeratePhysicalDevices,
        vk::Result::ERROR_INITIALIZATION_FAILED,
        vk::Result::ERROR_INITIALIZATION_FAILED,
        (instance, p_physical_device_count, p_physical_devices)
    )
}

#[no_mangle]
pub unsafe extern "system" fn vkGetPhysicalDeviceFeatures(
    physical_device: vk::PhysicalDevice,
    p_features: *mut vk::PhysicalDeviceFeatures,
) {
    physical_device_trampoline!(
        physical_device,
        "vkGetPhysicalDeviceFeatures",
        pfn::PFN_vkGetPhysicalDeviceFeatures,
        (),
        (),
        (physical_device, p_features)
    )
}

#[no_mangle]
pub unsafe extern "system" fn vkGetPhysicalDeviceProperties(
    physical_device: vk::PhysicalDevice,
    p_properties: *mut vk::PhysicalDeviceProperties,
) {
    physical_device_trampoline!(
        physical_device,
        "vkGetPhysicalDeviceProperties",
        pfn::PFN_vkGetPhysicalDeviceProperties,
        (),
        (),
        (physical_device, p_properties)
    )
}

#[no_mangle]
pub unsafe extern "system" fn vkGetPhysicalDeviceFormatProperties(
    physical_device: vk::PhysicalDevice,
    format: vk::Format,
    p_format_properties: *mut vk::FormatProperties,
) {
    physical_device_trampoline!(
        physical_device,
        "vkGetPhysicalDeviceFormatProperties",
        pfn::PFN_vkGetPhysicalDeviceFormatProperties,
        (),
        (),
        (physical_device, format, p_format_properties)
    )
}

#[no_mangle]
pub unsafe extern "system" fn vkGetPhysicalDeviceImageFormatProperties(
    physical_device: vk::PhysicalDevice,
    format: vk::Format,
    image_type: vk::ImageType,
    tiling: vk::ImageTiling,
    usage: vk::ImageUsageFlags,
    flags: vk::ImageCreateFlags,
    p_image_format_properties: *mut vk::ImageFormatProperties,
) -> vk::Result {
    physical_device_trampoline!(
        physical_device,
        "vkGetPhysicalDeviceImageFormatProperties",
        pfn::PFN_vkGetPhysicalDeviceImageFormatProperties,
        vk::Result::ERROR_INITIALIZATION_FAILED,
        vk::Result::ERROR_INITIALIZATION_FAILED,
        (physical_device, format, image_type, tiling, usage, flags, p_image_format_properties)
    )
}

#[no_mangle]
pub unsafe extern "system" fn vkGetPhysicalDeviceMemoryProperties(
    physical_device: vk::PhysicalDevice,
    p_memory_properties: *mut vk::PhysicalDeviceMemoryProperties,
) {
    physical_device_trampoline!(
        physical_device,
        "vkGetPhysicalDeviceMemoryProperties",
        pfn::PFN_vkGetPhysicalDeviceMemoryProperties,
        (),
        (),
        (physical_device, p_memory_properties)
    )
}

#[no_mangle]
pub unsafe extern "system" fn vkGetPhysicalDeviceQueueFamilyProperties(
    physical_device: vk::PhysicalDevice,
    p_queue_family_property_count: *mut u32,
    p_queue_family_properties: *mut vk::QueueFamilyProperties,
) {
    physical_device_trampoline!(
        physical_device,
        "vkGetPhysicalDeviceQueueFamilyProperties",
        pfn::PFN_vkGetPhysicalDeviceQueueFamilyProperties,
        (),
        (),
        (physical_device, p_queue_family_property_count, p_queue_family_properties)
    )
}

#[no_mangle]
pub unsafe extern "system" fn vkCreateDevice(
    physical_device: vk::PhysicalDevice,
    p_create_info: *const vk::DeviceCreateInfo,
    p_allocator: *const vk::AllocationCallbacks,
    p_device: *mut vk::Device,
) -> vk::Result {
    physical_device_trampoline!(
        physical_device,
        "vkCreateDevice",
        pfn::PFN_vkCreateDevice,
        vk::Result::ERROR_INITIALIZATION_FAILED,
        vk::Result::ERROR_INITIALIZATION_FAILED,
        (physical_device, p_create_info, p_allocator, p_device)
    )
}

// VK_KHR_surface

pub unsafe extern "system" fn vkDestroySurfaceKHR(
    instance: vk::Instance,
    surface: vk::SurfaceKHR,
    p_allocator: *const vk::AllocationCallbacks,
) {
    instance_trampoline!(
        instance,
        "vkDestroySurfaceKHR",
        pfn::PFN_vkDestroySurfaceKHR,
        (),
        (),
        (instance, surface, p_allocator)
    )
}

pub unsafe extern "system" fn vkGetPhysicalDeviceSurfaceSupportKHR(
    physical_device: vk::PhysicalDevice,
    queue_family_index: u32,
    surface: vk::SurfaceKHR,
    p_supported: *mut vk::Bool32,
) -> vk::Result {
    physical_device_trampoline!(
        physical_device,
        "vkGetPhysicalDeviceSurfaceSupportKHR",
        pfn::PFN_vkGetPhysicalDeviceSurfaceSupportKHR,
        vk::Result::ERROR_EXTENSION_NOT_PRESENT,
        vk::Result::ERROR_INITIALIZATION_FAILED,
        (physical_device, queue_family_index, surface, p_supported)
    )
}

pub unsafe extern "system" fn vkGetPhysicalDeviceSurfaceCapabilitiesKHR(
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    p_surface_capabilities: *mut vk::SurfaceCapabilitiesKHR,
) -> vk::Result {
    physical_device_trampoline!(
        physical_device,
        "vkGetPhysicalDeviceSurfaceCapabilitiesKHR",
        pfn::PFN_vkGetPhysicalDeviceSurfaceCapabilitiesKHR,
        vk::Result::ERROR_EXTENSION_NOT_PRESENT,
        vk::Result::ERROR_INITIALIZATION_FAILED,
        (physical_device, surface, p_surface_capabilities)
    )
}

pub unsafe extern "system" fn vkGetPhysicalDeviceSurfaceFormatsKHR(
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    p_surface_format_count: *mut u32,
    p_surface_formats: *mut vk::SurfaceFormatKHR,
) -> vk::Result {
    physical_device_trampoline!(
        physical_device,
        "vkGetPhysicalDeviceSurfaceFormatsKHR",
        pfn::PFN_vkGetPhysicalDeviceSurfaceFormatsKHR,
        vk::Result::ERROR_EXTENSION_NOT_PRESENT,
        vk::Result::ERROR_INITIALIZATION_FAILED,
        (physical_device, surface, p_surface_format_count, p_surface_formats)
    )
}

pub unsafe extern "system" fn vkGetPhysicalDeviceSurfacePresentModesKHR(
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    p_present_mode_count: *mut u32,
    p_present_modes: *mut vk::PresentModeKHR,
) -> vk::Result {
    physical_device_trampoline!(
        physical_device,
        "vkGetPhysicalDeviceSurfacePresentModesKHR",
        pfn::PFN_vkGetPhysicalDeviceSurfacePresentModesKHR,
        vk::Result::ERROR_EXTENSION_NOT_PRESENT,
        vk::Result::ERROR_INITIALIZATION_FAILED,
        (physical_device, surface, p_present_mode_count, p_present_modes)
    )
}

// VK_KHR_get_physical_device_properties2

pub unsafe extern "system" fn vkGetPhysicalDeviceFeatures2KHR(
    physical_device: vk::PhysicalDevice,
    p_features: *mut vk::PhysicalDeviceFeatures2,
) {
    physical_device_trampoline!(
        physical_device,
        "vkGetPhysicalDeviceFeatures2KHR",
        pfn::PFN_vkGetPhysicalDeviceFeatures2,
        (),
        (),
        (physical_device, p_features)
    )
}

pub unsafe extern "system" fn vkGetPhysicalDeviceProperties2KHR(
    physical_device: vk::PhysicalDevice,
    p_properties: *mut vk::PhysicalDeviceProperties2,
) {
    physical_device_trampoline!(
        physical_device,
        "vkGetPhysicalDeviceProperties2KHR",
        pfn::PFN_vkGetPhysicalDeviceProperties2,
        (),
        (),
        (physical_device, p_properties)
    )
}

pub unsafe extern "system" fn vkGetPhysicalDeviceFormatProperties2KHR(
    physical_device: vk::PhysicalDevice,
    format: vk::Format,
    p_format_properties: *mut vk::FormatProperties2,
) {
    physical_device_trampoline!(
        physical_device,
        "vkGetPhysicalDeviceFormatProperties2KHR",
        pfn::PFN_vkGetPhysicalDeviceFormatProperties2,
        (),
        (),
        (physical_device, format, p_format_properties)
    )
}

pub unsafe extern "system" fn vkGetPhysicalDeviceMemoryProperties2KHR(
    physical_device: vk::PhysicalDevice,
    p_memory_properties: *mut vk::PhysicalDeviceMemoryProperties2,
) {
    physical_device_trampoline!(
        physical_device,
        "vkGetPhysicalDeviceMemoryProperties2KHR",
        pfn::PFN_vkGetPhysicalDeviceMemoryProperties2,
        (),
        (),
        (physical_device, p_memory_properties)
    )
}

// External capabilities

pub unsafe extern "system" fn vkGetPhysicalDeviceExternalBufferPropertiesKHR(
    physical_device: vk::PhysicalDevice,
    p_external_buffer_info: *const vk::PhysicalDeviceExternalBufferInfo,
    p_external_buffer_properties: *mut vk::ExternalBufferProperties,
) {
    physical_device_trampoline!(
        physical_device,
        "vkGetPhysicalDeviceExternalBufferPropertiesKHR",
        pfn::PFN_vkGetPhysicalDeviceExternalBufferProperties,
        (),
        (),
        (physical_device, p_external_buffer_info, p_external_buffer_properties)
    )
}

pub unsafe extern "system" fn vkGetPhysicalDeviceExternalSemaphorePropertiesKHR(
    physical_device: vk::PhysicalDevice,
    p_external_semaphore_info: *const vk::PhysicalDeviceExternalSemaphoreInfo,
    p_external_semaphore_properties: *mut vk::ExternalSemaphoreProperties,
) {
    physical_device_trampoline!(
        physical_device,
        "vkGetPhysicalDeviceExternalSemaphorePropertiesKHR",
        pfn::PFN_vkGetPhysicalDeviceExternalSemaphoreProperties,
        (),
        (),
        (physical_device, p_external_semaphore_info, p_external_semaphore_properties)
    )
}

pub unsafe extern "system" fn vkGetPhysicalDeviceExternalFencePropertiesKHR(
    physical_device: vk::PhysicalDevice,
    p_external_fence_info: *const vk::PhysicalDeviceExternalFenceInfo,
    p_external_fence_properties: *mut vk::ExternalFenceProperties,
) {
    physical_device_trampoline!(
        physical_device,
        "vkGetPhysicalDeviceExternalFencePropertiesKHR",
        pfn::PFN_vkGetPhysicalDeviceExternalFenceProperties,
        (),
        (),
        (physical_device, p_external_fence_info, p_external_fence_properties)
    )
}

#[allow(clippy::too_many_arguments)]
pub unsafe extern "system" fn vkGetPhysicalDeviceExternalImageFormatPropertiesNV(
    physical_device: vk::PhysicalDevice,
    format: vk::Format,
    image_type: vk::ImageType,
    tiling: vk::ImageTiling,
    usage: vk::ImageUsageFlags,
    flags: vk::ImageCreateFlags,
    external_handle_type: vk::ExternalMemoryHandleTypeFlagsNV,
    p_external_image_format_properties: *mut vk::ExternalImageFormatPropertiesNV,
) -> vk::Result {
    physical_device_trampoline!(
        physical_device,
        "vkGetPhysicalDeviceExternalImageFormatPropertiesNV",
        pfn::PFN_vkGetPhysicalDeviceExternalImageFormatPropertiesNV,
        vk::Result::ERROR_EXTENSION_NOT_PRESENT,
        vk::Result::ERROR_INITIALIZATION_FAILED,
        (
            physical_device,
            format,
            image_type,
            tiling,
            usage,
            flags,
            external_handle_type,
            p_external_image_format_properties,
        )
    )
}

// VK_EXT_direct_mode_display

pub unsafe extern "system" fn vkReleaseDisplayEXT(
    physical_device: vk::PhysicalDevice,
    display: vk::DisplayKHR,
) -> vk::Result {
    physical_device_trampoline!(
        physical_device,
        "vkReleaseDisplayEXT",
        pfn::PFN_vkReleaseDisplayEXT,
        vk::Result::ERROR_EXTENSION_NOT_PRESENT,
        vk::Result::ERROR_INITIALIZATION_FAILED,
        (physical_device, display)
    )
}

// VK_KHR_device_group_creation

pub unsafe extern "system" fn vkEnumeratePhysicalDeviceGroupsKHR(
    instance: vk::Instance,
    p_physical_device_group_count: *mut u32,
    p_physical_device_group_properties: *mut vk::PhysicalDeviceGroupProperties,
) -> vk::Result {
    instance_trampoline!(
        instance,
        "vkEnumeratePhysicalDeviceGroupsKHR",
        pfn::PFN_vkEnumeratePhysicalDeviceGroups,
        vk::Result::ERROR_EXTENSION_NOT_PRESENT,
        vk::Result::ERROR_INITIALIZATION_FAILED,
        (instance, p_physical_device_group_count, p_physical_device_group_properties)
    )
}

// VK_EXT_debug_utils, answered by the layer chain

pub unsafe extern "system" fn vkCreateDebugUtilsMessengerEXT(
    instance: vk::Instance,
    p_create_info: *const vk::DebugUtilsMessengerCreateInfoEXT,
    p_allocator: *const vk::AllocationCallbacks,
    p_messenger: *mut vk::DebugUtilsMessengerEXT,
) -> vk::Result {
    instance_trampoline!(
        instance,
        "vkCreateDebugUtilsMessengerEXT",
        pfn::PFN_vkCreateDebugUtilsMessengerEXT,
        vk::Result::ERROR_EXTENSION_NOT_PRESENT,
        vk::Result::ERROR_INITIALIZATION_FAILED,
        (instance, p_create_info, p_allocator, p_messenger)
    )
}

pub unsafe extern "system" fn vkDestroyDebugUtilsMessengerEXT(
    instance: vk::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
    p_allocator: *const vk::AllocationCallbacks,
) {
    instance_trampoline!(
        instance,
        "vkDestroyDebugUtilsMessengerEXT",
        pfn::PFN_vkDestroyDebugUtilsMessengerEXT,
        (),
        (),
        (instance, messenger, p_allocator)
    )
}

pub unsafe extern "system" fn vkSubmitDebugUtilsMessageEXT(
    instance: vk::Instance,
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_types: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
) {
    instance_trampoline!(
        instance,
        "vkSubmitDebugUtilsMessageEXT",
        pfn::PFN_vkSubmitDebugUtilsMessageEXT,
        (),
        (),
        (instance, message_severity, message_types, p_callback_data)
    )
}
