//! Logical devices
//!
//! Devices are the driver's own objects: the application receives the raw
//! driver `VkDevice` and device commands go straight to the driver.  The loader
//! only remembers which driver owns each device, for the handful of device
//! commands that still end in a loader terminator.

#![allow(non_snake_case)]

use ash::vk::{self, Handle};
use log::{debug, error, info};
use once_cell::sync::Lazy;
use std::ffi::CStr;
use std::sync::Arc;

use crate::error::{check, LoaderError, Result};
use crate::handle::HandleAllocator;
use crate::icd::DriverInstance;
use crate::instance;
use crate::pfn::{self, VoidFunction};
use crate::registry::REGISTRY;
use crate::surface;
use crate::typed_fn;

/// Global device registry, keyed by the driver's raw device handle
pub static DEVICE_ALLOCATOR: Lazy<HandleAllocator<LoaderDevice>> = Lazy::new(HandleAllocator::new);

pub struct LoaderDevice {
    pub driver: Arc<DriverInstance>,
    pub driver_index: usize,
    pub enabled_extensions: Vec<String>,
    pub get_device_proc_addr: pfn::PFN_vkGetDeviceProcAddr,
    pub destroy_device: Option<pfn::PFN_vkDestroyDevice>,
    pub create_swapchain: Option<pfn::PFN_vkCreateSwapchainKHR>,
    pub create_shared_swapchains: Option<pfn::PFN_vkCreateSharedSwapchainsKHR>,
    pub debug_marker_set_object_tag: Option<pfn::PFN_vkDebugMarkerSetObjectTagEXT>,
    pub debug_marker_set_object_name: Option<pfn::PFN_vkDebugMarkerSetObjectNameEXT>,
}

impl LoaderDevice {
    /// Whether `name` is a terminated device command this device can serve.
    pub fn serves(&self, name: &str) -> bool {
        let Some((entry, _)) = REGISTRY.find_command(name) else {
            return false;
        };
        let driver_has_it = match name {
            "vkCreateSwapchainKHR" => self.create_swapchain.is_some(),
            "vkCreateSharedSwapchainsKHR" => self.create_shared_swapchains.is_some(),
            // emulated as a no-op when the driver lacks them
            "vkDebugMarkerSetObjectTagEXT" | "vkDebugMarkerSetObjectNameEXT" => true,
            _ => false,
        };
        driver_has_it && self.enabled_extensions.iter().any(|e| e == entry.name)
    }
}

pub fn get_device(device: vk::Device) -> Option<Arc<LoaderDevice>> {
    DEVICE_ALLOCATOR.get(device.as_raw())
}

unsafe fn device_proc(
    get_device_proc_addr: pfn::PFN_vkGetDeviceProcAddr,
    device: vk::Device,
    name: &CStr,
) -> Option<VoidFunction> {
    get_device_proc_addr(device, name.as_ptr())
}

pub unsafe fn create_device(
    physical_device: vk::PhysicalDevice,
    p_create_info: *const vk::DeviceCreateInfo,
    p_allocator: *const vk::AllocationCallbacks,
    p_device: *mut vk::Device,
) -> Result<()> {
    let term = instance::get_physical_device(physical_device)
        .ok_or_else(|| LoaderError::InvalidHandle("Invalid physical device".to_string()))?;
    let create_info = &*p_create_info;

    let enabled_extensions: Vec<String> = if create_info.enabled_extension_count > 0
        && !create_info.pp_enabled_extension_names.is_null()
    {
        std::slice::from_raw_parts(
            create_info.pp_enabled_extension_names,
            create_info.enabled_extension_count as usize,
        )
        .iter()
        .map(|&ext| CStr::from_ptr(ext).to_string_lossy().into_owned())
        .collect()
    } else {
        Vec::new()
    };

    check((term.driver.dispatch.create_device)(
        term.raw,
        p_create_info,
        p_allocator,
        p_device,
    ))?;
    let device = *p_device;

    let gdpa = term.driver.dispatch.get_device_proc_addr;
    let loader_device = LoaderDevice {
        driver: Arc::clone(&term.driver),
        driver_index: term.driver_index,
        enabled_extensions,
        get_device_proc_addr: gdpa,
        destroy_device: device_proc(gdpa, device, c"vkDestroyDevice").map(|f| typed_fn!(f, pfn::PFN_vkDestroyDevice)),
        create_swapchain: device_proc(gdpa, device, c"vkCreateSwapchainKHR")
            .map(|f| typed_fn!(f, pfn::PFN_vkCreateSwapchainKHR)),
        create_shared_swapchains: device_proc(gdpa, device, c"vkCreateSharedSwapchainsKHR")
            .map(|f| typed_fn!(f, pfn::PFN_vkCreateSharedSwapchainsKHR)),
        debug_marker_set_object_tag: device_proc(gdpa, device, c"vkDebugMarkerSetObjectTagEXT")
            .map(|f| typed_fn!(f, pfn::PFN_vkDebugMarkerSetObjectTagEXT)),
        debug_marker_set_object_name: device_proc(gdpa, device, c"vkDebugMarkerSetObjectNameEXT")
            .map(|f| typed_fn!(f, pfn::PFN_vkDebugMarkerSetObjectNameEXT)),
    };

    info!(
        "Device {:?} created on driver {:?}, extensions {:?}",
        device, term.driver.driver, loader_device.enabled_extensions
    );
    if DEVICE_ALLOCATOR.insert(device.as_raw(), loader_device).is_some() {
        error!("Driver {:?} reused live device handle {:?}", term.driver.driver, device);
    }
    Ok(())
}

pub unsafe fn destroy_device(device: vk::Device, p_allocator: *const vk::AllocationCallbacks) {
    if device == vk::Device::null() {
        return;
    }
    match DEVICE_ALLOCATOR.remove(device.as_raw()) {
        Some(loader_device) => {
            if let Some(destroy) = loader_device.destroy_device {
                destroy(device, p_allocator);
            }
            info!("Device {:?} destroyed", device);
        }
        None => error!("vkDestroyDevice on unknown device {:?}", device),
    }
}

pub unsafe extern "system" fn terminator_CreateDevice(
    physical_device: vk::PhysicalDevice,
    p_create_info: *const vk::DeviceCreateInfo,
    p_allocator: *const vk::AllocationCallbacks,
    p_device: *mut vk::Device,
) -> vk::Result {
    match create_device(physical_device, p_create_info, p_allocator, p_device) {
        Ok(()) => vk::Result::SUCCESS,
        Err(e) => {
            error!("vkCreateDevice failed: {}", e);
            e.to_vk_result()
        }
    }
}

fn loader_device(device: vk::Device, command: &str) -> Option<Arc<LoaderDevice>> {
    let loader_device = get_device(device);
    if loader_device.is_none() {
        error!("{}: invalid device {:?}", command, device);
    }
    loader_device
}

pub unsafe extern "system" fn terminator_CreateSwapchainKHR(
    device: vk::Device,
    p_create_info: *const vk::SwapchainCreateInfoKHR,
    p_allocator: *const vk::AllocationCallbacks,
    p_swapchain: *mut vk::SwapchainKHR,
) -> vk::Result {
    let Some(loader_device) = loader_device(device, "vkCreateSwapchainKHR") else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    let Some(create_swapchain) = loader_device.create_swapchain else {
        error!("Driver {:?} does not implement vkCreateSwapchainKHR", loader_device.driver.driver);
        return vk::Result::ERROR_EXTENSION_NOT_PRESENT;
    };

    let mut create_info = *p_create_info;
    create_info.surface = surface::real_surface(create_info.surface, loader_device.driver_index);
    create_swapchain(device, &create_info, p_allocator, p_swapchain)
}

pub unsafe extern "system" fn terminator_CreateSharedSwapchainsKHR(
    device: vk::Device,
    swapchain_count: u32,
    p_create_infos: *const vk::SwapchainCreateInfoKHR,
    p_allocator: *const vk::AllocationCallbacks,
    p_swapchains: *mut vk::SwapchainKHR,
) -> vk::Result {
    let Some(loader_device) = loader_device(device, "vkCreateSharedSwapchainsKHR") else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    let Some(create_shared_swapchains) = loader_device.create_shared_swapchains else {
        error!(
            "Driver {:?} does not implement vkCreateSharedSwapchainsKHR",
            loader_device.driver.driver
        );
        return vk::Result::ERROR_EXTENSION_NOT_PRESENT;
    };

    let mut create_infos = std::slice::from_raw_parts(p_create_infos, swapchain_count as usize).to_vec();
    for create_info in &mut create_infos {
        create_info.surface = surface::real_surface(create_info.surface, loader_device.driver_index);
    }
    create_shared_swapchains(
        device,
        swapchain_count,
        create_infos.as_ptr(),
        p_allocator,
        p_swapchains,
    )
}

/// Translate loader handles named by a debug-marker object into driver handles.
fn unwrap_marker_object(object_type: vk::DebugReportObjectTypeEXT, object: u64, driver_index: usize) -> u64 {
    match object_type {
        vk::DebugReportObjectTypeEXT::PHYSICAL_DEVICE => instance::get_physical_device(vk::PhysicalDevice::from_raw(object))
            .map_or(object, |term| term.raw.as_raw()),
        vk::DebugReportObjectTypeEXT::SURFACE_KHR => {
            surface::real_surface(vk::SurfaceKHR::from_raw(object), driver_index).as_raw()
        }
        _ => object,
    }
}

pub unsafe extern "system" fn terminator_DebugMarkerSetObjectTagEXT(
    device: vk::Device,
    p_tag_info: *const vk::DebugMarkerObjectTagInfoEXT,
) -> vk::Result {
    let Some(loader_device) = loader_device(device, "vkDebugMarkerSetObjectTagEXT") else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    let Some(set_object_tag) = loader_device.debug_marker_set_object_tag else {
        debug!("Driver lacks vkDebugMarkerSetObjectTagEXT, ignoring tag");
        return vk::Result::SUCCESS;
    };

    let mut tag_info = *p_tag_info;
    tag_info.object = unwrap_marker_object(tag_info.object_type, tag_info.object, loader_device.driver_index);
    set_object_tag(device, &tag_info)
}

pub unsafe extern "system" fn terminator_DebugMarkerSetObjectNameEXT(
    device: vk::Device,
    p_name_info: *const vk::DebugMarkerObjectNameInfoEXT,
) -> vk::Result {
    let Some(loader_device) = loader_device(device, "vkDebugMarkerSetObjectNameEXT") else {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    let Some(set_object_name) = loader_device.debug_marker_set_object_name else {
        debug!("Driver lacks vkDebugMarkerSetObjectNameEXT, ignoring name");
        return vk::Result::SUCCESS;
    };

    let mut name_info = *p_name_info;
    name_info.object = unwrap_marker_object(name_info.object_type, name_info.object, loader_device.driver_index);
    set_object_name(device, &name_info)
}
