//! `vkGet*ProcAddr` resolution
//!
//! Lookup order for instance procs:
//!
//! 1. loader intrinsics (global ones even without an instance)
//! 2. registry instance-extension commands: the trampoline when the extension
//!    is enabled on the instance, null otherwise
//! 3. the instance's layer chain
//!
//! Nothing here takes a lock on a dispatch table; tables are immutable once
//! their instance is published.

use ash::vk;
use log::{debug, warn};
use std::ffi::CStr;

use crate::device;
use crate::exports;
use crate::instance;
use crate::pfn::{self, VoidFunction};
use crate::registry::{ExtensionClass, REGISTRY};
use crate::trampoline;
use crate::void_fn;

/// Entry points that resolve without an instance.
fn global_intrinsic(name: &str) -> Option<VoidFunction> {
    Some(match name {
        "vkGetInstanceProcAddr" => void_fn!(exports::vkGetInstanceProcAddr, pfn::PFN_vkGetInstanceProcAddr),
        "vkCreateInstance" => void_fn!(exports::vkCreateInstance, pfn::PFN_vkCreateInstance),
        "vkEnumerateInstanceExtensionProperties" => void_fn!(
            exports::vkEnumerateInstanceExtensionProperties,
            pfn::PFN_vkEnumerateInstanceExtensionProperties
        ),
        _ => return None,
    })
}

fn instance_intrinsic(name: &str) -> Option<VoidFunction> {
    Some(match name {
        "vkDestroyInstance" => void_fn!(exports::vkDestroyInstance, pfn::PFN_vkDestroyInstance),
        "vkGetDeviceProcAddr" => void_fn!(exports::vkGetDeviceProcAddr, pfn::PFN_vkGetDeviceProcAddr),
        "vkEnumeratePhysicalDevices" => {
            void_fn!(trampoline::vkEnumeratePhysicalDevices, pfn::PFN_vkEnumeratePhysicalDevices)
        }
        "vkCreateDevice" => void_fn!(trampoline::vkCreateDevice, pfn::PFN_vkCreateDevice),
        "vkGetPhysicalDeviceFeatures" => {
            void_fn!(trampoline::vkGetPhysicalDeviceFeatures, pfn::PFN_vkGetPhysicalDeviceFeatures)
        }
        "vkGetPhysicalDeviceProperties" => {
            void_fn!(trampoline::vkGetPhysicalDeviceProperties, pfn::PFN_vkGetPhysicalDeviceProperties)
        }
        "vkGetPhysicalDeviceFormatProperties" => void_fn!(
            trampoline::vkGetPhysicalDeviceFormatProperties,
            pfn::PFN_vkGetPhysicalDeviceFormatProperties
        ),
        "vkGetPhysicalDeviceImageFormatProperties" => void_fn!(
            trampoline::vkGetPhysicalDeviceImageFormatProperties,
            pfn::PFN_vkGetPhysicalDeviceImageFormatProperties
        ),
        "vkGetPhysicalDeviceMemoryProperties" => void_fn!(
            trampoline::vkGetPhysicalDeviceMemoryProperties,
            pfn::PFN_vkGetPhysicalDeviceMemoryProperties
        ),
        "vkGetPhysicalDeviceQueueFamilyProperties" => void_fn!(
            trampoline::vkGetPhysicalDeviceQueueFamilyProperties,
            pfn::PFN_vkGetPhysicalDeviceQueueFamilyProperties
        ),
        _ => return None,
    })
}

fn device_intrinsic(name: &str) -> Option<VoidFunction> {
    Some(match name {
        "vkGetDeviceProcAddr" => void_fn!(exports::vkGetDeviceProcAddr, pfn::PFN_vkGetDeviceProcAddr),
        "vkDestroyDevice" => void_fn!(exports::vkDestroyDevice, pfn::PFN_vkDestroyDevice),
        _ => return None,
    })
}

pub fn resolve_instance_proc(instance: vk::Instance, name: &str) -> vk::PFN_vkVoidFunction {
    if let Some(function) = global_intrinsic(name) {
        return Some(function);
    }

    let Some(loader_instance) = instance::get_instance(instance) else {
        debug!("{} needs an instance", name);
        return None;
    };

    if let Some(function) = instance_intrinsic(name) {
        return Some(function);
    }

    if let Some((entry, command)) = REGISTRY.find_command(name) {
        if entry.class == ExtensionClass::Instance {
            if loader_instance.state.is_enabled(entry.name) {
                return command.trampoline;
            }
            debug!("{} belongs to {}, which is not enabled", name, entry.name);
            return None;
        }
    }

    let function = loader_instance.chain.next_in_chain(name);
    if function.is_none() {
        debug!("Nothing claims {}", name);
    }
    function
}

/// Device commands the loader itself answers for, whatever the device.
pub fn resolve_device_proc(name: &str) -> vk::PFN_vkVoidFunction {
    device_intrinsic(name).or_else(|| REGISTRY.device_proc_terminator(name))
}

/// `vkGetDeviceProcAddr` on a live device: loader-owned commands first, then
/// the owning driver.
pub unsafe fn resolve_device_proc_on(device: vk::Device, name: &CStr) -> vk::PFN_vkVoidFunction {
    let Some(loader_device) = device::get_device(device) else {
        warn!("vkGetDeviceProcAddr on unknown device {:?}", device);
        return None;
    };

    if let Ok(utf8) = name.to_str() {
        if let Some(function) = device_intrinsic(utf8) {
            return Some(function);
        }
        if let Some(terminator) = REGISTRY.device_proc_terminator(utf8) {
            return loader_device.serves(utf8).then_some(terminator);
        }
    }

    (loader_device.get_device_proc_addr)(device, name.as_ptr())
}
