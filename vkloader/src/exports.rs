//! C ABI entry points exported by the loader library

#![allow(non_snake_case)]

use ash::vk;
use log::{debug, error, warn};
use std::ffi::CStr;
use std::os::raw::c_char;

use crate::device;
use crate::driver::DriverExtension;
use crate::instance;
use crate::loader::Loader;
use crate::resolver;
use crate::terminator::fill_out_array;

#[no_mangle]
pub unsafe extern "system" fn vkGetInstanceProcAddr(
    instance: vk::Instance,
    p_name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    if p_name.is_null() {
        return None;
    }
    let name = CStr::from_ptr(p_name).to_str().ok()?;
    resolver::resolve_instance_proc(instance, name)
}

#[no_mangle]
pub unsafe extern "system" fn vkGetDeviceProcAddr(device: vk::Device, p_name: *const c_char) -> vk::PFN_vkVoidFunction {
    if p_name.is_null() {
        return None;
    }
    resolver::resolve_device_proc_on(device, CStr::from_ptr(p_name))
}

#[no_mangle]
pub unsafe extern "system" fn vkCreateInstance(
    p_create_info: *const vk::InstanceCreateInfo,
    _p_allocator: *const vk::AllocationCallbacks,
    p_instance: *mut vk::Instance,
) -> vk::Result {
    crate::init();

    let Some(loader) = Loader::get() else {
        error!("vkCreateInstance called before a loader was installed");
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };
    if p_create_info.is_null() || p_instance.is_null() {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }
    let create_info = &*p_create_info;

    if create_info.enabled_layer_count > 0 {
        warn!("{} layer(s) requested, none available", create_info.enabled_layer_count);
        return vk::Result::ERROR_LAYER_NOT_PRESENT;
    }

    let extensions: Vec<String> = if create_info.enabled_extension_count > 0
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
    debug!("vkCreateInstance with {:?}", extensions);

    match loader.create_instance(&extensions, create_info.p_application_info.as_ref()) {
        Ok(instance) => {
            *p_instance = instance;
            vk::Result::SUCCESS
        }
        Err(e) => {
            error!("vkCreateInstance failed: {}", e);
            e.to_vk_result()
        }
    }
}

#[no_mangle]
pub unsafe extern "system" fn vkDestroyInstance(instance: vk::Instance, _p_allocator: *const vk::AllocationCallbacks) {
    instance::destroy_instance(instance);
}

#[no_mangle]
pub unsafe extern "system" fn vkEnumerateInstanceExtensionProperties(
    p_layer_name: *const c_char,
    p_property_count: *mut u32,
    p_properties: *mut vk::ExtensionProperties,
) -> vk::Result {
    if !p_layer_name.is_null() {
        return vk::Result::ERROR_LAYER_NOT_PRESENT;
    }
    let Some(loader) = Loader::get() else {
        error!("vkEnumerateInstanceExtensionProperties called before a loader was installed");
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    };

    let properties: Vec<vk::ExtensionProperties> = loader
        .enumerate_instance_extension_properties()
        .iter()
        .map(DriverExtension::to_properties)
        .collect();

    fill_out_array(&properties, p_property_count, p_properties)
}

#[no_mangle]
pub unsafe extern "system" fn vkDestroyDevice(device: vk::Device, p_allocator: *const vk::AllocationCallbacks) {
    device::destroy_device(device, p_allocator);
}
