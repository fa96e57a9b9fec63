//! Function pointer signatures for every command the loader routes
//!
//! Pointers travel through the registry, dispatch tables and the
//! `vkGet*ProcAddr` path type-erased as `VoidFunction`; the macros below move
//! between the erased form and the concrete signatures.

#![allow(non_camel_case_types)]

use ash::vk;
use std::os::raw::c_char;

/// Type-erased entry point, the payload of `vk::PFN_vkVoidFunction`.
pub type VoidFunction = unsafe extern "system" fn();

/// Erase a concrete entry point: `void_fn!(f, pfn::PFN_x)`.
#[macro_export]
macro_rules! void_fn {
    ($func:expr, $pfn:ty) => {
        unsafe { std::mem::transmute::<$pfn, $crate::pfn::VoidFunction>($func as $pfn) }
    };
}

/// Give an erased entry point back its signature: `typed_fn!(f, pfn::PFN_x)`.
#[macro_export]
macro_rules! typed_fn {
    ($func:expr, $pfn:ty) => {
        std::mem::transmute::<$crate::pfn::VoidFunction, $pfn>($func)
    };
}

// Loader/ICD interface

pub type PFN_vkGetInstanceProcAddr =
    unsafe extern "system" fn(vk::Instance, *const c_char) -> vk::PFN_vkVoidFunction;
pub type PFN_vkGetDeviceProcAddr =
    unsafe extern "system" fn(vk::Device, *const c_char) -> vk::PFN_vkVoidFunction;
pub type PFN_vkNegotiateLoaderICDInterfaceVersion = unsafe extern "system" fn(*mut u32) -> vk::Result;
pub type PFN_vkEnumerateInstanceExtensionProperties =
    unsafe extern "system" fn(*const c_char, *mut u32, *mut vk::ExtensionProperties) -> vk::Result;

// Core instance commands

pub type PFN_vkCreateInstance = unsafe extern "system" fn(
    *const vk::InstanceCreateInfo,
    *const vk::AllocationCallbacks,
    *mut vk::Instance,
) -> vk::Result;
pub type PFN_vkDestroyInstance = unsafe extern "system" fn(vk::Instance, *const vk::AllocationCallbacks);
pub type PFN_vkEnumeratePhysicalDevices =
    unsafe extern "system" fn(vk::Instance, *mut u32, *mut vk::PhysicalDevice) -> vk::Result;
pub type PFN_vkGetPhysicalDeviceFeatures =
    unsafe extern "system" fn(vk::PhysicalDevice, *mut vk::PhysicalDeviceFeatures);
pub type PFN_vkGetPhysicalDeviceProperties =
    unsafe extern "system" fn(vk::PhysicalDevice, *mut vk::PhysicalDeviceProperties);
pub type PFN_vkGetPhysicalDeviceFormatProperties =
    unsafe extern "system" fn(vk::PhysicalDevice, vk::Format, *mut vk::FormatProperties);
pub type PFN_vkGetPhysicalDeviceImageFormatProperties = unsafe extern "system" fn(
    vk::PhysicalDevice,
    vk::Format,
    vk::ImageType,
    vk::ImageTiling,
    vk::ImageUsageFlags,
    vk::ImageCreateFlags,
    *mut vk::ImageFormatProperties,
) -> vk::Result;
pub type PFN_vkGetPhysicalDeviceMemoryProperties =
    unsafe extern "system" fn(vk::PhysicalDevice, *mut vk::PhysicalDeviceMemoryProperties);
pub type PFN_vkGetPhysicalDeviceQueueFamilyProperties =
    unsafe extern "system" fn(vk::PhysicalDevice, *mut u32, *mut vk::QueueFamilyProperties);
pub type PFN_vkCreateDevice = unsafe extern "system" fn(
    vk::PhysicalDevice,
    *const vk::DeviceCreateInfo,
    *const vk::AllocationCallbacks,
    *mut vk::Device,
) -> vk::Result;
pub type PFN_vkDestroyDevice = unsafe extern "system" fn(vk::Device, *const vk::AllocationCallbacks);

// VK_KHR_surface

pub type PFN_vkDestroySurfaceKHR =
    unsafe extern "system" fn(vk::Instance, vk::SurfaceKHR, *const vk::AllocationCallbacks);
pub type PFN_vkGetPhysicalDeviceSurfaceSupportKHR = unsafe extern "system" fn(
    vk::PhysicalDevice,
    u32,
    vk::SurfaceKHR,
    *mut vk::Bool32,
) -> vk::Result;
pub type PFN_vkGetPhysicalDeviceSurfaceCapabilitiesKHR = unsafe extern "system" fn(
    vk::PhysicalDevice,
    vk::SurfaceKHR,
    *mut vk::SurfaceCapabilitiesKHR,
) -> vk::Result;
pub type PFN_vkGetPhysicalDeviceSurfaceFormatsKHR = unsafe extern "system" fn(
    vk::PhysicalDevice,
    vk::SurfaceKHR,
    *mut u32,
    *mut vk::SurfaceFormatKHR,
) -> vk::Result;
pub type PFN_vkGetPhysicalDeviceSurfacePresentModesKHR = unsafe extern "system" fn(
    vk::PhysicalDevice,
    vk::SurfaceKHR,
    *mut u32,
    *mut vk::PresentModeKHR,
) -> vk::Result;

// VK_KHR_get_physical_device_properties2 (identical to the 1.1 core signatures)

pub type PFN_vkGetPhysicalDeviceFeatures2 =
    unsafe extern "system" fn(vk::PhysicalDevice, *mut vk::PhysicalDeviceFeatures2);
pub type PFN_vkGetPhysicalDeviceProperties2 =
    unsafe extern "system" fn(vk::PhysicalDevice, *mut vk::PhysicalDeviceProperties2);
pub type PFN_vkGetPhysicalDeviceFormatProperties2 =
    unsafe extern "system" fn(vk::PhysicalDevice, vk::Format, *mut vk::FormatProperties2);
pub type PFN_vkGetPhysicalDeviceMemoryProperties2 =
    unsafe extern "system" fn(vk::PhysicalDevice, *mut vk::PhysicalDeviceMemoryProperties2);

// External memory / semaphore / fence capabilities

pub type PFN_vkGetPhysicalDeviceExternalBufferProperties = unsafe extern "system" fn(
    vk::PhysicalDevice,
    *const vk::PhysicalDeviceExternalBufferInfo,
    *mut vk::ExternalBufferProperties,
);
pub type PFN_vkGetPhysicalDeviceExternalSemaphoreProperties = unsafe extern "system" fn(
    vk::PhysicalDevice,
    *const vk::PhysicalDeviceExternalSemaphoreInfo,
    *mut vk::ExternalSemaphoreProperties,
);
pub type PFN_vkGetPhysicalDeviceExternalFenceProperties = unsafe extern "system" fn(
    vk::PhysicalDevice,
    *const vk::PhysicalDeviceExternalFenceInfo,
    *mut vk::ExternalFenceProperties,
);
pub type PFN_vkGetPhysicalDeviceExternalImageFormatPropertiesNV = unsafe extern "system" fn(
    vk::PhysicalDevice,
    vk::Format,
    vk::ImageType,
    vk::ImageTiling,
    vk::ImageUsageFlags,
    vk::ImageCreateFlags,
    vk::ExternalMemoryHandleTypeFlagsNV,
    *mut vk::ExternalImageFormatPropertiesNV,
) -> vk::Result;

// VK_EXT_direct_mode_display

pub type PFN_vkReleaseDisplayEXT =
    unsafe extern "system" fn(vk::PhysicalDevice, vk::DisplayKHR) -> vk::Result;

// VK_KHR_device_group_creation

pub type PFN_vkEnumeratePhysicalDeviceGroups = unsafe extern "system" fn(
    vk::Instance,
    *mut u32,
    *mut vk::PhysicalDeviceGroupProperties,
) -> vk::Result;

// VK_EXT_debug_utils (instance commands)

pub type PFN_vkCreateDebugUtilsMessengerEXT = unsafe extern "system" fn(
    vk::Instance,
    *const vk::DebugUtilsMessengerCreateInfoEXT,
    *const vk::AllocationCallbacks,
    *mut vk::DebugUtilsMessengerEXT,
) -> vk::Result;
pub type PFN_vkDestroyDebugUtilsMessengerEXT = unsafe extern "system" fn(
    vk::Instance,
    vk::DebugUtilsMessengerEXT,
    *const vk::AllocationCallbacks,
);
pub type PFN_vkSubmitDebugUtilsMessageEXT = unsafe extern "system" fn(
    vk::Instance,
    vk::DebugUtilsMessageSeverityFlagsEXT,
    vk::DebugUtilsMessageTypeFlagsEXT,
    *const vk::DebugUtilsMessengerCallbackDataEXT,
);

// Device commands that need a terminator

pub type PFN_vkCreateSwapchainKHR = unsafe extern "system" fn(
    vk::Device,
    *const vk::SwapchainCreateInfoKHR,
    *const vk::AllocationCallbacks,
    *mut vk::SwapchainKHR,
) -> vk::Result;
pub type PFN_vkCreateSharedSwapchainsKHR = unsafe extern "system" fn(
    vk::Device,
    u32,
    *const vk::SwapchainCreateInfoKHR,
    *const vk::AllocationCallbacks,
    *mut vk::SwapchainKHR,
) -> vk::Result;
pub type PFN_vkDebugMarkerSetObjectTagEXT =
    unsafe extern "system" fn(vk::Device, *const vk::DebugMarkerObjectTagInfoEXT) -> vk::Result;
pub type PFN_vkDebugMarkerSetObjectNameEXT =
    unsafe extern "system" fn(vk::Device, *const vk::DebugMarkerObjectNameInfoEXT) -> vk::Result;
