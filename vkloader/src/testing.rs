//! In-process fake drivers for unit tests
//!
//! `FakeSymbols` serves C-ABI entry points of a few driver flavours so the
//! whole loader path (negotiation, driver instances, terminators, devices)
//! runs without a real ICD.  Handles the fakes hand out live in fixed numeric
//! ranges and are never dereferenced.

#![allow(non_snake_case)]

use ash::vk::{self, Handle};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::LoaderConfig;
use crate::dispatch::ProcChain;
use crate::driver::{DriverCapabilitySet, DriverExtension, DriverHandle, DriverSet, SymbolLoader};
use crate::loader::Loader;
use crate::pfn::{self, VoidFunction};
use crate::registry::{KHR_GET_PHYSICAL_DEVICE_PROPERTIES_2, KHR_SURFACE};
use crate::terminator::fill_out_array;
use crate::void_fn;

pub const FAKE_INTERFACE_VERSION: u32 = 4;
pub const FAKE_DEVICES_PER_INSTANCE: usize = 2;
pub const FAKE_VENDOR_ID: u32 = 0x1D1E;
pub const FAKE_MAX_MIP_LEVELS: u32 = 7;
pub const FAKE_INSTANCE_EXTENSIONS: &[&str] =
    &["VK_KHR_surface", "VK_KHR_get_physical_device_properties2", "VK_KHR_xcb_surface"];
/// Set on a swapchain handle derived from the surface it was created for
pub const FAKE_SWAPCHAIN_BIT: u64 = 1 << 40;

const PHYSICAL_DEVICES: [u64; FAKE_DEVICES_PER_INSTANCE] = [0xD001, 0xD002];
const PHYSICAL_DEVICE_RANGE: std::ops::Range<u64> = 0xD000..0xE000;
const SURFACE_BASE: u64 = 0x5000_0000;
const DEVICE_BASE: u64 = 0x7000_0000;
const INSTANCE_BASE: u64 = 0x100_0000;
const RANGE_SPAN: u64 = 0x1000_0000;

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);
static NEXT_SURFACE: AtomicU64 = AtomicU64::new(1);
static NEXT_DEVICE: AtomicU64 = AtomicU64::new(1);
static BROKEN_DESTROYED: AtomicUsize = AtomicUsize::new(0);
static DEBUG_MESSAGES: AtomicUsize = AtomicUsize::new(0);

static DESTROYED_INSTANCES: Lazy<Mutex<FxHashSet<u64>>> = Lazy::new(Default::default);
static DESTROYED_SURFACES: Lazy<Mutex<FxHashSet<u64>>> = Lazy::new(Default::default);
static DESTROYED_DEVICES: Lazy<Mutex<FxHashSet<u64>>> = Lazy::new(Default::default);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FakeDriverKind {
    /// Negotiates, and has every entry point the loader can use
    Full,
    /// Only core 1.0 commands, no negotiation entry point
    CoreOnly,
    /// Like `Full`, but fails `vkEnumeratePhysicalDevices`
    BrokenEnumerate,
    /// Exports nothing
    NoEntryPoint,
}

pub struct FakeSymbols {
    kinds: Vec<FakeDriverKind>,
}

impl FakeSymbols {
    /// Driver `DriverHandle(i + 1)` behaves as `kinds[i]`.
    pub fn new(kinds: Vec<FakeDriverKind>) -> Self {
        Self { kinds }
    }

    fn kind(&self, driver: DriverHandle) -> Option<FakeDriverKind> {
        let index = usize::try_from(driver.0).ok()?.checked_sub(1)?;
        self.kinds.get(index).copied()
    }
}

impl SymbolLoader for FakeSymbols {
    fn load_symbol(&self, driver: DriverHandle, name: &CStr) -> Option<VoidFunction> {
        let kind = self.kind(driver)?;
        match (kind, name.to_bytes()) {
            (FakeDriverKind::NoEntryPoint, _) => None,
            (FakeDriverKind::Full, b"vk_icdGetInstanceProcAddr") => {
                Some(void_fn!(fake_gipa_full, pfn::PFN_vkGetInstanceProcAddr))
            }
            (FakeDriverKind::CoreOnly, b"vk_icdGetInstanceProcAddr") => {
                Some(void_fn!(fake_gipa_core, pfn::PFN_vkGetInstanceProcAddr))
            }
            (FakeDriverKind::BrokenEnumerate, b"vk_icdGetInstanceProcAddr") => {
                Some(void_fn!(fake_gipa_broken, pfn::PFN_vkGetInstanceProcAddr))
            }
            (
                FakeDriverKind::Full | FakeDriverKind::BrokenEnumerate,
                b"vk_icdNegotiateLoaderICDInterfaceVersion",
            ) => Some(void_fn!(
                fake_negotiate,
                pfn::PFN_vkNegotiateLoaderICDInterfaceVersion
            )),
            _ => None,
        }
    }
}

/// Drivers `1..=n` with the given kinds, each advertising its name list.
pub fn driver_set(drivers: &[(FakeDriverKind, &[&str])]) -> DriverSet {
    let capabilities = drivers
        .iter()
        .enumerate()
        .map(|(i, (_, names))| DriverCapabilitySet::with_names(DriverHandle(i as u64 + 1), names.iter().copied()))
        .collect();
    let kinds = drivers.iter().map(|(kind, _)| *kind).collect();
    DriverSet::new(capabilities, Arc::new(FakeSymbols::new(kinds)))
}

/// The process-wide loader the exported entry points see in tests: two full
/// drivers advertising surfaces and properties2, behind `FakeChain`.
pub fn installed_loader() -> &'static Loader {
    static INSTALLED: Lazy<&'static Loader> = Lazy::new(|| {
        const ADVERTISED: &[&str] = &[KHR_SURFACE, KHR_GET_PHYSICAL_DEVICE_PROPERTIES_2];
        let drivers = driver_set(&[(FakeDriverKind::Full, ADVERTISED), (FakeDriverKind::Full, ADVERTISED)]);
        Loader::new(drivers, LoaderConfig::default())
            .with_chain(Arc::new(FakeChain))
            .install()
            .unwrap()
    });
    *INSTALLED
}

pub fn is_fake_physical_device(physical_device: vk::PhysicalDevice) -> bool {
    PHYSICAL_DEVICE_RANGE.contains(&physical_device.as_raw())
}

pub fn fake_surface() -> vk::SurfaceKHR {
    vk::SurfaceKHR::from_raw(SURFACE_BASE + NEXT_SURFACE.fetch_add(1, Ordering::Relaxed))
}

pub fn is_fake_surface(surface: vk::SurfaceKHR) -> bool {
    (SURFACE_BASE..SURFACE_BASE + RANGE_SPAN).contains(&surface.as_raw())
}

pub fn is_fake_device(device: vk::Device) -> bool {
    (DEVICE_BASE..DEVICE_BASE + RANGE_SPAN).contains(&device.as_raw())
}

pub fn broken_instances_destroyed() -> usize {
    BROKEN_DESTROYED.load(Ordering::SeqCst)
}

pub fn driver_instance_destroyed(raw: u64) -> bool {
    DESTROYED_INSTANCES.lock().contains(&raw)
}

pub fn surface_destroyed(surface: vk::SurfaceKHR) -> bool {
    DESTROYED_SURFACES.lock().contains(&surface.as_raw())
}

pub fn device_destroyed(device: vk::Device) -> bool {
    DESTROYED_DEVICES.lock().contains(&device.as_raw())
}

pub fn submitted_debug_messages() -> usize {
    DEBUG_MESSAGES.load(Ordering::SeqCst)
}

/// A layer chain that implements debug utils and one private command.
pub struct FakeChain;

impl ProcChain for FakeChain {
    fn next_in_chain(&self, name: &str) -> vk::PFN_vkVoidFunction {
        Some(match name {
            "vkCreateDebugUtilsMessengerEXT" => {
                void_fn!(fake_create_messenger, pfn::PFN_vkCreateDebugUtilsMessengerEXT)
            }
            "vkDestroyDebugUtilsMessengerEXT" => {
                void_fn!(fake_destroy_messenger, pfn::PFN_vkDestroyDebugUtilsMessengerEXT)
            }
            "vkSubmitDebugUtilsMessageEXT" => {
                void_fn!(fake_submit_message, pfn::PFN_vkSubmitDebugUtilsMessageEXT)
            }
            "vkFakeLayerCommandEXT" => fake_layer_command,
            _ => return None,
        })
    }
}

unsafe extern "system" fn fake_layer_command() {}

unsafe extern "system" fn fake_create_messenger(
    instance: vk::Instance,
    _p_create_info: *const vk::DebugUtilsMessengerCreateInfoEXT,
    _p_allocator: *const vk::AllocationCallbacks,
    p_messenger: *mut vk::DebugUtilsMessengerEXT,
) -> vk::Result {
    *p_messenger = vk::DebugUtilsMessengerEXT::from_raw(instance.as_raw());
    vk::Result::SUCCESS
}

unsafe extern "system" fn fake_destroy_messenger(
    _instance: vk::Instance,
    _messenger: vk::DebugUtilsMessengerEXT,
    _p_allocator: *const vk::AllocationCallbacks,
) {
}

unsafe extern "system" fn fake_submit_message(
    _instance: vk::Instance,
    _severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    _p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
) {
    DEBUG_MESSAGES.fetch_add(1, Ordering::SeqCst);
}

// Interface

unsafe extern "system" fn fake_negotiate(p_version: *mut u32) -> vk::Result {
    *p_version = (*p_version).min(FAKE_INTERFACE_VERSION);
    vk::Result::SUCCESS
}

unsafe fn proc_name<'a>(p_name: *const c_char) -> Option<&'a str> {
    if p_name.is_null() {
        return None;
    }
    CStr::from_ptr(p_name).to_str().ok()
}

unsafe extern "system" fn fake_gipa_full(_instance: vk::Instance, p_name: *const c_char) -> vk::PFN_vkVoidFunction {
    let name = proc_name(p_name)?;
    match name {
        "vkDestroyInstance" => Some(void_fn!(fake_destroy_instance, pfn::PFN_vkDestroyInstance)),
        "vkEnumeratePhysicalDevices" => Some(void_fn!(
            fake_enumerate_physical_devices,
            pfn::PFN_vkEnumeratePhysicalDevices
        )),
        "vkGetDeviceProcAddr" => Some(void_fn!(fake_gdpa_full, pfn::PFN_vkGetDeviceProcAddr)),
        _ => core_proc(name).or_else(|| extension_proc(name)),
    }
}

unsafe extern "system" fn fake_gipa_core(_instance: vk::Instance, p_name: *const c_char) -> vk::PFN_vkVoidFunction {
    let name = proc_name(p_name)?;
    match name {
        "vkDestroyInstance" => Some(void_fn!(fake_destroy_instance, pfn::PFN_vkDestroyInstance)),
        "vkEnumeratePhysicalDevices" => Some(void_fn!(
            fake_enumerate_physical_devices,
            pfn::PFN_vkEnumeratePhysicalDevices
        )),
        "vkGetDeviceProcAddr" => Some(void_fn!(fake_gdpa_core, pfn::PFN_vkGetDeviceProcAddr)),
        _ => core_proc(name),
    }
}

unsafe extern "system" fn fake_gipa_broken(_instance: vk::Instance, p_name: *const c_char) -> vk::PFN_vkVoidFunction {
    let name = proc_name(p_name)?;
    match name {
        "vkDestroyInstance" => Some(void_fn!(fake_destroy_broken_instance, pfn::PFN_vkDestroyInstance)),
        "vkEnumeratePhysicalDevices" => Some(void_fn!(
            fake_enumerate_physical_devices_broken,
            pfn::PFN_vkEnumeratePhysicalDevices
        )),
        "vkGetDeviceProcAddr" => Some(void_fn!(fake_gdpa_full, pfn::PFN_vkGetDeviceProcAddr)),
        _ => core_proc(name).or_else(|| extension_proc(name)),
    }
}

/// Core 1.0 entries shared by every driver flavour.
fn core_proc(name: &str) -> Option<VoidFunction> {
    Some(match name {
        "vkCreateInstance" => void_fn!(fake_create_instance, pfn::PFN_vkCreateInstance),
        "vkEnumerateInstanceExtensionProperties" => void_fn!(
            fake_enumerate_instance_extension_properties,
            pfn::PFN_vkEnumerateInstanceExtensionProperties
        ),
        "vkGetPhysicalDeviceFeatures" => void_fn!(fake_features, pfn::PFN_vkGetPhysicalDeviceFeatures),
        "vkGetPhysicalDeviceProperties" => void_fn!(fake_properties, pfn::PFN_vkGetPhysicalDeviceProperties),
        "vkGetPhysicalDeviceFormatProperties" => {
            void_fn!(fake_format_properties, pfn::PFN_vkGetPhysicalDeviceFormatProperties)
        }
        "vkGetPhysicalDeviceImageFormatProperties" => void_fn!(
            fake_image_format_properties,
            pfn::PFN_vkGetPhysicalDeviceImageFormatProperties
        ),
        "vkGetPhysicalDeviceMemoryProperties" => {
            void_fn!(fake_memory_properties, pfn::PFN_vkGetPhysicalDeviceMemoryProperties)
        }
        "vkGetPhysicalDeviceQueueFamilyProperties" => void_fn!(
            fake_queue_family_properties,
            pfn::PFN_vkGetPhysicalDeviceQueueFamilyProperties
        ),
        "vkCreateDevice" => void_fn!(fake_create_device, pfn::PFN_vkCreateDevice),
        _ => return None,
    })
}

/// Extension entries only the full flavours carry.
fn extension_proc(name: &str) -> Option<VoidFunction> {
    Some(match name {
        "vkDestroySurfaceKHR" => void_fn!(fake_destroy_surface, pfn::PFN_vkDestroySurfaceKHR),
        "vkGetPhysicalDeviceSurfaceSupportKHR" => {
            void_fn!(fake_surface_support, pfn::PFN_vkGetPhysicalDeviceSurfaceSupportKHR)
        }
        "vkGetPhysicalDeviceSurfaceCapabilitiesKHR" => void_fn!(
            fake_surface_capabilities,
            pfn::PFN_vkGetPhysicalDeviceSurfaceCapabilitiesKHR
        ),
        "vkGetPhysicalDeviceSurfaceFormatsKHR" => {
            void_fn!(fake_surface_formats, pfn::PFN_vkGetPhysicalDeviceSurfaceFormatsKHR)
        }
        "vkGetPhysicalDeviceSurfacePresentModesKHR" => void_fn!(
            fake_surface_present_modes,
            pfn::PFN_vkGetPhysicalDeviceSurfacePresentModesKHR
        ),
        "vkGetPhysicalDeviceFeatures2" | "vkGetPhysicalDeviceFeatures2KHR" => {
            void_fn!(fake_features2, pfn::PFN_vkGetPhysicalDeviceFeatures2)
        }
        "vkGetPhysicalDeviceProperties2" | "vkGetPhysicalDeviceProperties2KHR" => {
            void_fn!(fake_properties2, pfn::PFN_vkGetPhysicalDeviceProperties2)
        }
        "vkGetPhysicalDeviceFormatProperties2" | "vkGetPhysicalDeviceFormatProperties2KHR" => {
            void_fn!(fake_format_properties2, pfn::PFN_vkGetPhysicalDeviceFormatProperties2)
        }
        "vkGetPhysicalDeviceMemoryProperties2" | "vkGetPhysicalDeviceMemoryProperties2KHR" => {
            void_fn!(fake_memory_properties2, pfn::PFN_vkGetPhysicalDeviceMemoryProperties2)
        }
        "vkGetPhysicalDeviceExternalBufferProperties" | "vkGetPhysicalDeviceExternalBufferPropertiesKHR" => void_fn!(
            fake_external_buffer_properties,
            pfn::PFN_vkGetPhysicalDeviceExternalBufferProperties
        ),
        "vkGetPhysicalDeviceExternalSemaphoreProperties" | "vkGetPhysicalDeviceExternalSemaphorePropertiesKHR" => {
            void_fn!(
                fake_external_semaphore_properties,
                pfn::PFN_vkGetPhysicalDeviceExternalSemaphoreProperties
            )
        }
        "vkGetPhysicalDeviceExternalFenceProperties" | "vkGetPhysicalDeviceExternalFencePropertiesKHR" => void_fn!(
            fake_external_fence_properties,
            pfn::PFN_vkGetPhysicalDeviceExternalFenceProperties
        ),
        "vkGetPhysicalDeviceExternalImageFormatPropertiesNV" => void_fn!(
            fake_external_image_format_properties_nv,
            pfn::PFN_vkGetPhysicalDeviceExternalImageFormatPropertiesNV
        ),
        "vkReleaseDisplayEXT" => void_fn!(fake_release_display, pfn::PFN_vkReleaseDisplayEXT),
        "vkEnumeratePhysicalDeviceGroups" | "vkEnumeratePhysicalDeviceGroupsKHR" => void_fn!(
            fake_enumerate_physical_device_groups,
            pfn::PFN_vkEnumeratePhysicalDeviceGroups
        ),
        _ => return None,
    })
}

// Instance

unsafe extern "system" fn fake_create_instance(
    _p_create_info: *const vk::InstanceCreateInfo,
    _p_allocator: *const vk::AllocationCallbacks,
    p_instance: *mut vk::Instance,
) -> vk::Result {
    *p_instance = vk::Instance::from_raw(INSTANCE_BASE + NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed));
    vk::Result::SUCCESS
}

unsafe extern "system" fn fake_destroy_instance(instance: vk::Instance, _p_allocator: *const vk::AllocationCallbacks) {
    DESTROYED_INSTANCES.lock().insert(instance.as_raw());
}

unsafe extern "system" fn fake_destroy_broken_instance(
    instance: vk::Instance,
    p_allocator: *const vk::AllocationCallbacks,
) {
    BROKEN_DESTROYED.fetch_add(1, Ordering::SeqCst);
    fake_destroy_instance(instance, p_allocator);
}

unsafe extern "system" fn fake_enumerate_instance_extension_properties(
    p_layer_name: *const c_char,
    p_property_count: *mut u32,
    p_properties: *mut vk::ExtensionProperties,
) -> vk::Result {
    if !p_layer_name.is_null() {
        return vk::Result::ERROR_LAYER_NOT_PRESENT;
    }
    let properties: Vec<vk::ExtensionProperties> = FAKE_INSTANCE_EXTENSIONS
        .iter()
        .map(|name| DriverExtension::new(*name, 1).to_properties())
        .collect();
    fill_out_array(&properties, p_property_count, p_properties)
}

unsafe extern "system" fn fake_enumerate_physical_devices(
    _instance: vk::Instance,
    p_physical_device_count: *mut u32,
    p_physical_devices: *mut vk::PhysicalDevice,
) -> vk::Result {
    let devices = PHYSICAL_DEVICES.map(vk::PhysicalDevice::from_raw);
    fill_out_array(&devices, p_physical_device_count, p_physical_devices)
}

unsafe extern "system" fn fake_enumerate_physical_devices_broken(
    _instance: vk::Instance,
    _p_physical_device_count: *mut u32,
    _p_physical_devices: *mut vk::PhysicalDevice,
) -> vk::Result {
    vk::Result::ERROR_INITIALIZATION_FAILED
}

// Physical device queries

unsafe extern "system" fn fake_features(_physical_device: vk::PhysicalDevice, p_features: *mut vk::PhysicalDeviceFeatures) {
    *p_features = vk::PhysicalDeviceFeatures {
        robust_buffer_access: vk::TRUE,
        ..Default::default()
    };
}

unsafe extern "system" fn fake_properties(
    physical_device: vk::PhysicalDevice,
    p_properties: *mut vk::PhysicalDeviceProperties,
) {
    *p_properties = vk::PhysicalDeviceProperties {
        vendor_id: FAKE_VENDOR_ID,
        device_id: physical_device.as_raw() as u32,
        ..Default::default()
    };
}

unsafe extern "system" fn fake_format_properties(
    _physical_device: vk::PhysicalDevice,
    _format: vk::Format,
    p_format_properties: *mut vk::FormatProperties,
) {
    *p_format_properties = vk::FormatProperties {
        optimal_tiling_features: vk::FormatFeatureFlags::SAMPLED_IMAGE,
        ..Default::default()
    };
}

unsafe extern "system" fn fake_image_format_properties(
    _physical_device: vk::PhysicalDevice,
    _format: vk::Format,
    _image_type: vk::ImageType,
    _tiling: vk::ImageTiling,
    _usage: vk::ImageUsageFlags,
    _flags: vk::ImageCreateFlags,
    p_image_format_properties: *mut vk::ImageFormatProperties,
) -> vk::Result {
    *p_image_format_properties = vk::ImageFormatProperties {
        max_mip_levels: FAKE_MAX_MIP_LEVELS,
        max_array_layers: 1,
        ..Default::default()
    };
    vk::Result::SUCCESS
}

unsafe extern "system" fn fake_memory_properties(
    _physical_device: vk::PhysicalDevice,
    p_memory_properties: *mut vk::PhysicalDeviceMemoryProperties,
) {
    let mut properties = vk::PhysicalDeviceMemoryProperties {
        memory_heap_count: 1,
        memory_type_count: 1,
        ..Default::default()
    };
    properties.memory_heaps[0].size = 1 << 30;
    properties.memory_types[0].property_flags = vk::MemoryPropertyFlags::DEVICE_LOCAL;
    *p_memory_properties = properties;
}

unsafe extern "system" fn fake_queue_family_properties(
    _physical_device: vk::PhysicalDevice,
    p_queue_family_property_count: *mut u32,
    p_queue_family_properties: *mut vk::QueueFamilyProperties,
) {
    let families = [vk::QueueFamilyProperties {
        queue_flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
        queue_count: 1,
        ..Default::default()
    }];
    let _ = fill_out_array(&families, p_queue_family_property_count, p_queue_family_properties);
}

unsafe extern "system" fn fake_features2(
    physical_device: vk::PhysicalDevice,
    p_features: *mut vk::PhysicalDeviceFeatures2,
) {
    fake_features(physical_device, &mut (*p_features).features);
    (*p_features).features.sparse_binding = vk::TRUE;
}

unsafe extern "system" fn fake_properties2(
    physical_device: vk::PhysicalDevice,
    p_properties: *mut vk::PhysicalDeviceProperties2,
) {
    fake_properties(physical_device, &mut (*p_properties).properties);
}

unsafe extern "system" fn fake_format_properties2(
    physical_device: vk::PhysicalDevice,
    format: vk::Format,
    p_format_properties: *mut vk::FormatProperties2,
) {
    fake_format_properties(physical_device, format, &mut (*p_format_properties).format_properties);
}

unsafe extern "system" fn fake_memory_properties2(
    physical_device: vk::PhysicalDevice,
    p_memory_properties: *mut vk::PhysicalDeviceMemoryProperties2,
) {
    fake_memory_properties(physical_device, &mut (*p_memory_properties).memory_properties);
}

unsafe extern "system" fn fake_external_buffer_properties(
    _physical_device: vk::PhysicalDevice,
    p_external_buffer_info: *const vk::PhysicalDeviceExternalBufferInfo,
    p_external_buffer_properties: *mut vk::ExternalBufferProperties,
) {
    let handle_type = (*p_external_buffer_info).handle_type;
    (*p_external_buffer_properties).external_memory_properties = vk::ExternalMemoryProperties {
        external_memory_features: vk::ExternalMemoryFeatureFlags::EXPORTABLE,
        export_from_imported_handle_types: handle_type,
        compatible_handle_types: handle_type,
    };
}

unsafe extern "system" fn fake_external_semaphore_properties(
    _physical_device: vk::PhysicalDevice,
    p_external_semaphore_info: *const vk::PhysicalDeviceExternalSemaphoreInfo,
    p_external_semaphore_properties: *mut vk::ExternalSemaphoreProperties,
) {
    let handle_type = (*p_external_semaphore_info).handle_type;
    let out = &mut *p_external_semaphore_properties;
    out.export_from_imported_handle_types = handle_type;
    out.compatible_handle_types = handle_type;
    out.external_semaphore_features = vk::ExternalSemaphoreFeatureFlags::EXPORTABLE;
}

unsafe extern "system" fn fake_external_fence_properties(
    _physical_device: vk::PhysicalDevice,
    p_external_fence_info: *const vk::PhysicalDeviceExternalFenceInfo,
    p_external_fence_properties: *mut vk::ExternalFenceProperties,
) {
    let handle_type = (*p_external_fence_info).handle_type;
    let out = &mut *p_external_fence_properties;
    out.export_from_imported_handle_types = handle_type;
    out.compatible_handle_types = handle_type;
    out.external_fence_features = vk::ExternalFenceFeatureFlags::EXPORTABLE;
}

unsafe extern "system" fn fake_external_image_format_properties_nv(
    physical_device: vk::PhysicalDevice,
    format: vk::Format,
    image_type: vk::ImageType,
    tiling: vk::ImageTiling,
    usage: vk::ImageUsageFlags,
    flags: vk::ImageCreateFlags,
    external_handle_type: vk::ExternalMemoryHandleTypeFlagsNV,
    p_external_image_format_properties: *mut vk::ExternalImageFormatPropertiesNV,
) -> vk::Result {
    let out = &mut *p_external_image_format_properties;
    let result = fake_image_format_properties(
        physical_device,
        format,
        image_type,
        tiling,
        usage,
        flags,
        &mut out.image_format_properties,
    );
    out.external_memory_features = vk::ExternalMemoryFeatureFlagsNV::EXPORTABLE;
    out.export_from_imported_handle_types = external_handle_type;
    out.compatible_handle_types = external_handle_type;
    result
}

unsafe extern "system" fn fake_release_display(_physical_device: vk::PhysicalDevice, _display: vk::DisplayKHR) -> vk::Result {
    vk::Result::SUCCESS
}

unsafe extern "system" fn fake_enumerate_physical_device_groups(
    _instance: vk::Instance,
    p_physical_device_group_count: *mut u32,
    p_physical_device_group_properties: *mut vk::PhysicalDeviceGroupProperties,
) -> vk::Result {
    // every device of the instance in one group
    if p_physical_device_group_properties.is_null() {
        *p_physical_device_group_count = 1;
        return vk::Result::SUCCESS;
    }
    if *p_physical_device_group_count == 0 {
        return vk::Result::INCOMPLETE;
    }

    let out = &mut *p_physical_device_group_properties;
    out.physical_device_count = FAKE_DEVICES_PER_INSTANCE as u32;
    out.physical_devices = [vk::PhysicalDevice::null(); vk::MAX_DEVICE_GROUP_SIZE];
    for (slot, raw) in out.physical_devices.iter_mut().zip(PHYSICAL_DEVICES) {
        *slot = vk::PhysicalDevice::from_raw(raw);
    }
    out.subset_allocation = vk::TRUE;
    *p_physical_device_group_count = 1;
    vk::Result::SUCCESS
}

// VK_KHR_surface

unsafe extern "system" fn fake_destroy_surface(
    _instance: vk::Instance,
    surface: vk::SurfaceKHR,
    _p_allocator: *const vk::AllocationCallbacks,
) {
    DESTROYED_SURFACES.lock().insert(surface.as_raw());
}

unsafe extern "system" fn fake_surface_support(
    physical_device: vk::PhysicalDevice,
    _queue_family_index: u32,
    surface: vk::SurfaceKHR,
    p_supported: *mut vk::Bool32,
) -> vk::Result {
    *p_supported = if is_fake_physical_device(physical_device) && is_fake_surface(surface) {
        vk::TRUE
    } else {
        vk::FALSE
    };
    vk::Result::SUCCESS
}

unsafe extern "system" fn fake_surface_capabilities(
    _physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    p_surface_capabilities: *mut vk::SurfaceCapabilitiesKHR,
) -> vk::Result {
    if !is_fake_surface(surface) {
        return vk::Result::ERROR_SURFACE_LOST_KHR;
    }
    *p_surface_capabilities = vk::SurfaceCapabilitiesKHR {
        min_image_count: 2,
        max_image_count: 8,
        max_image_array_layers: 1,
        ..Default::default()
    };
    vk::Result::SUCCESS
}

unsafe extern "system" fn fake_surface_formats(
    _physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    p_surface_format_count: *mut u32,
    p_surface_formats: *mut vk::SurfaceFormatKHR,
) -> vk::Result {
    if !is_fake_surface(surface) {
        return vk::Result::ERROR_SURFACE_LOST_KHR;
    }
    let formats = [vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_UNORM,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    }];
    fill_out_array(&formats, p_surface_format_count, p_surface_formats)
}

unsafe extern "system" fn fake_surface_present_modes(
    _physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    p_present_mode_count: *mut u32,
    p_present_modes: *mut vk::PresentModeKHR,
) -> vk::Result {
    if !is_fake_surface(surface) {
        return vk::Result::ERROR_SURFACE_LOST_KHR;
    }
    fill_out_array(&[vk::PresentModeKHR::FIFO], p_present_mode_count, p_present_modes)
}

// Devices

unsafe extern "system" fn fake_create_device(
    physical_device: vk::PhysicalDevice,
    _p_create_info: *const vk::DeviceCreateInfo,
    _p_allocator: *const vk::AllocationCallbacks,
    p_device: *mut vk::Device,
) -> vk::Result {
    if !is_fake_physical_device(physical_device) {
        return vk::Result::ERROR_INITIALIZATION_FAILED;
    }
    *p_device = vk::Device::from_raw(DEVICE_BASE + NEXT_DEVICE.fetch_add(1, Ordering::Relaxed));
    vk::Result::SUCCESS
}

unsafe extern "system" fn fake_destroy_device(device: vk::Device, _p_allocator: *const vk::AllocationCallbacks) {
    DESTROYED_DEVICES.lock().insert(device.as_raw());
}

unsafe extern "system" fn fake_queue_wait_idle(_queue: vk::Queue) -> vk::Result {
    vk::Result::SUCCESS
}

unsafe extern "system" fn fake_gdpa_full(device: vk::Device, p_name: *const c_char) -> vk::PFN_vkVoidFunction {
    let name = proc_name(p_name)?;
    match name {
        "vkCreateSwapchainKHR" => Some(void_fn!(fake_create_swapchain, pfn::PFN_vkCreateSwapchainKHR)),
        "vkCreateSharedSwapchainsKHR" => Some(void_fn!(
            fake_create_shared_swapchains,
            pfn::PFN_vkCreateSharedSwapchainsKHR
        )),
        "vkDebugMarkerSetObjectTagEXT" => Some(void_fn!(
            fake_debug_marker_set_object_tag,
            pfn::PFN_vkDebugMarkerSetObjectTagEXT
        )),
        "vkDebugMarkerSetObjectNameEXT" => Some(void_fn!(
            fake_debug_marker_set_object_name,
            pfn::PFN_vkDebugMarkerSetObjectNameEXT
        )),
        _ => fake_gdpa_core(device, p_name),
    }
}

unsafe extern "system" fn fake_gdpa_core(_device: vk::Device, p_name: *const c_char) -> vk::PFN_vkVoidFunction {
    match proc_name(p_name)? {
        "vkDestroyDevice" => Some(void_fn!(fake_destroy_device, pfn::PFN_vkDestroyDevice)),
        "vkQueueWaitIdle" => Some(void_fn!(fake_queue_wait_idle, vk::PFN_vkQueueWaitIdle)),
        _ => None,
    }
}

fn fake_swapchain(create_info: &vk::SwapchainCreateInfoKHR) -> Option<vk::SwapchainKHR> {
    is_fake_surface(create_info.surface)
        .then(|| vk::SwapchainKHR::from_raw(create_info.surface.as_raw() | FAKE_SWAPCHAIN_BIT))
}

unsafe extern "system" fn fake_create_swapchain(
    _device: vk::Device,
    p_create_info: *const vk::SwapchainCreateInfoKHR,
    _p_allocator: *const vk::AllocationCallbacks,
    p_swapchain: *mut vk::SwapchainKHR,
) -> vk::Result {
    match fake_swapchain(&*p_create_info) {
        Some(swapchain) => {
            *p_swapchain = swapchain;
            vk::Result::SUCCESS
        }
        None => vk::Result::ERROR_SURFACE_LOST_KHR,
    }
}

unsafe extern "system" fn fake_create_shared_swapchains(
    _device: vk::Device,
    swapchain_count: u32,
    p_create_infos: *const vk::SwapchainCreateInfoKHR,
    _p_allocator: *const vk::AllocationCallbacks,
    p_swapchains: *mut vk::SwapchainKHR,
) -> vk::Result {
    let infos = std::slice::from_raw_parts(p_create_infos, swapchain_count as usize);
    for (i, info) in infos.iter().enumerate() {
        match fake_swapchain(info) {
            Some(swapchain) => *p_swapchains.add(i) = swapchain,
            None => return vk::Result::ERROR_SURFACE_LOST_KHR,
        }
    }
    vk::Result::SUCCESS
}

fn check_marker_object(object_type: vk::DebugReportObjectTypeEXT, object: u64) -> vk::Result {
    if object_type == vk::DebugReportObjectTypeEXT::PHYSICAL_DEVICE
        && !is_fake_physical_device(vk::PhysicalDevice::from_raw(object))
    {
        return vk::Result::ERROR_VALIDATION_FAILED_EXT;
    }
    vk::Result::SUCCESS
}

unsafe extern "system" fn fake_debug_marker_set_object_tag(
    _device: vk::Device,
    p_tag_info: *const vk::DebugMarkerObjectTagInfoEXT,
) -> vk::Result {
    let info = &*p_tag_info;
    check_marker_object(info.object_type, info.object)
}

unsafe extern "system" fn fake_debug_marker_set_object_name(
    _device: vk::Device,
    p_name_info: *const vk::DebugMarkerObjectNameInfoEXT,
) -> vk::Result {
    let info = &*p_name_info;
    check_marker_object(info.object_type, info.object)
}
