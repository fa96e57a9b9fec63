//! Compiled-in catalog of the extensions the loader itself understands
//!
//! Every entry names an extension, its class, whether the loader must own a
//! terminator for it, and the commands it contributes.  Instance-class
//! commands carry the loader trampoline handed out by `vkGetInstanceProcAddr`;
//! commands needing cross-driver logic also carry the terminator that ends the
//! dispatch chain.  The registry is built once on first use and never mutated.

use log::debug;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::device;
use crate::pfn::{self, VoidFunction};
use crate::terminator;
use crate::trampoline;

pub const KHR_SURFACE: &str = "VK_KHR_surface";
pub const KHR_GET_PHYSICAL_DEVICE_PROPERTIES_2: &str = "VK_KHR_get_physical_device_properties2";
pub const KHR_EXTERNAL_MEMORY_CAPABILITIES: &str = "VK_KHR_external_memory_capabilities";
pub const KHR_EXTERNAL_SEMAPHORE_CAPABILITIES: &str = "VK_KHR_external_semaphore_capabilities";
pub const KHR_EXTERNAL_FENCE_CAPABILITIES: &str = "VK_KHR_external_fence_capabilities";
pub const NV_EXTERNAL_MEMORY_CAPABILITIES: &str = "VK_NV_external_memory_capabilities";
pub const EXT_DIRECT_MODE_DISPLAY: &str = "VK_EXT_direct_mode_display";
pub const KHR_DEVICE_GROUP_CREATION: &str = "VK_KHR_device_group_creation";
pub const KHR_PORTABILITY_ENUMERATION: &str = "VK_KHR_portability_enumeration";
pub const EXT_DEBUG_UTILS: &str = "VK_EXT_debug_utils";
pub const KHR_SWAPCHAIN: &str = "VK_KHR_swapchain";
pub const KHR_DISPLAY_SWAPCHAIN: &str = "VK_KHR_display_swapchain";
pub const EXT_DEBUG_MARKER: &str = "VK_EXT_debug_marker";

/// Every instance extension this loader build knows about.  Driver-reported
/// instance extensions missing from this list are hidden from
/// `vkEnumerateInstanceExtensionProperties` unless the filter is disabled.
pub const KNOWN_INSTANCE_EXTENSIONS: &[&str] = &[
    KHR_SURFACE,
    "VK_KHR_display",
    "VK_KHR_xlib_surface",
    "VK_KHR_xcb_surface",
    "VK_KHR_wayland_surface",
    "VK_KHR_win32_surface",
    "VK_KHR_android_surface",
    "VK_EXT_metal_surface",
    "VK_EXT_headless_surface",
    "VK_KHR_get_surface_capabilities2",
    "VK_EXT_swapchain_colorspace",
    "VK_EXT_debug_report",
    EXT_DEBUG_UTILS,
    KHR_GET_PHYSICAL_DEVICE_PROPERTIES_2,
    KHR_EXTERNAL_MEMORY_CAPABILITIES,
    KHR_EXTERNAL_SEMAPHORE_CAPABILITIES,
    KHR_EXTERNAL_FENCE_CAPABILITIES,
    NV_EXTERNAL_MEMORY_CAPABILITIES,
    EXT_DIRECT_MODE_DISPLAY,
    "VK_EXT_acquire_xlib_display",
    "VK_EXT_display_surface_counter",
    KHR_DEVICE_GROUP_CREATION,
    KHR_PORTABILITY_ENUMERATION,
    "VK_EXT_validation_flags",
    "VK_EXT_validation_features",
];

pub fn is_known_instance_extension(name: &str) -> bool {
    KNOWN_INSTANCE_EXTENSIONS.contains(&name)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExtensionClass {
    Instance,
    Device,
}

/// One entry point contributed by an extension.
#[derive(Clone, Copy, Debug)]
pub struct ExtensionCommand {
    pub name: &'static str,
    /// Loader trampoline returned by `vkGetInstanceProcAddr` (instance class only)
    pub trampoline: Option<VoidFunction>,
    /// Loader terminator bound into dispatch tables, if the command needs one
    pub terminator: Option<VoidFunction>,
    /// The command takes a `VkSurfaceKHR` that must be swapped for the owning
    /// driver's surface before the call reaches that driver
    pub routes_surface: bool,
}

impl ExtensionCommand {
    /// Instance command whose behaviour depends on loader-only knowledge.
    pub fn routed(name: &'static str, trampoline: VoidFunction, terminator: VoidFunction) -> Self {
        Self {
            name,
            trampoline: Some(trampoline),
            terminator: Some(terminator),
            routes_surface: false,
        }
    }

    /// Instance command forwarded to the next element of the layer chain.
    pub fn forwarded(name: &'static str, trampoline: VoidFunction) -> Self {
        Self {
            name,
            trampoline: Some(trampoline),
            terminator: None,
            routes_surface: false,
        }
    }

    /// Device command that still ends in a loader terminator.
    pub fn device(name: &'static str, terminator: VoidFunction) -> Self {
        Self {
            name,
            trampoline: None,
            terminator: Some(terminator),
            routes_surface: false,
        }
    }

    pub fn per_surface(mut self) -> Self {
        self.routes_surface = true;
        self
    }
}

#[derive(Clone, Debug)]
pub struct ExtensionEntry {
    pub name: &'static str,
    pub class: ExtensionClass,
    pub spec_version: u32,
    pub requires_terminator: bool,
    /// The loader implements the extension's behaviour fully by itself
    pub emulated: bool,
    pub commands: Vec<ExtensionCommand>,
}

impl ExtensionEntry {
    /// Intercepted and fully emulated: enabled whenever requested,
    /// independent of what the drivers advertise.
    pub fn is_loader_emulated(&self) -> bool {
        self.requires_terminator && self.emulated
    }
}

pub struct ExtensionRegistry {
    entries: Vec<ExtensionEntry>,
    by_name: FxHashMap<&'static str, Vec<usize>>,
    commands: FxHashMap<&'static str, (usize, usize)>,
}

impl ExtensionRegistry {
    /// Index `entries`.  Lookups return the first entry declaring a name; the
    /// dispatch-table builder is what rejects conflicting terminators.
    pub fn new(entries: Vec<ExtensionEntry>) -> Self {
        let mut by_name = FxHashMap::default();
        let mut commands = FxHashMap::default();

        for (entry_index, entry) in entries.iter().enumerate() {
            by_name
                .entry(entry.name)
                .or_insert_with(Vec::new)
                .push(entry_index);
            for (command_index, command) in entry.commands.iter().enumerate() {
                commands
                    .entry(command.name)
                    .or_insert((entry_index, command_index));
            }
        }

        debug!(
            "Extension registry: {} extensions, {} commands",
            entries.len(),
            commands.len()
        );

        Self {
            entries,
            by_name,
            commands,
        }
    }

    pub fn lookup(&self, name: &str, class: ExtensionClass) -> Option<&ExtensionEntry> {
        self.by_name
            .get(name)?
            .iter()
            .map(|&i| &self.entries[i])
            .find(|entry| entry.class == class)
    }

    /// Find the extension contributing the entry point `name`.
    pub fn find_command(&self, name: &str) -> Option<(&ExtensionEntry, &ExtensionCommand)> {
        self.commands.get(name).map(|&(entry, command)| {
            let entry = &self.entries[entry];
            (entry, &entry.commands[command])
        })
    }

    /// Terminator for one of the few device commands that need one.
    pub fn device_proc_terminator(&self, name: &str) -> Option<VoidFunction> {
        match self.find_command(name) {
            Some((entry, command)) if entry.class == ExtensionClass::Device => command.terminator,
            _ => None,
        }
    }

    pub fn entries(&self) -> &[ExtensionEntry] {
        &self.entries
    }

    /// Extensions the loader enables on its own, whatever the drivers report.
    pub fn emulated_instance_extensions(&self) -> impl Iterator<Item = &ExtensionEntry> {
        self.entries
            .iter()
            .filter(|e| e.class == ExtensionClass::Instance && e.is_loader_emulated())
    }

    pub fn builtin() -> Self {
        use ExtensionClass::{Device, Instance};

        let instance = |name, spec_version, commands| ExtensionEntry {
            name,
            class: Instance,
            spec_version,
            requires_terminator: true,
            emulated: false,
            commands,
        };

        let entries = vec![
            instance(
                KHR_SURFACE,
                25,
                vec![
                    ExtensionCommand::routed(
                        "vkDestroySurfaceKHR",
                        crate::void_fn!(trampoline::vkDestroySurfaceKHR, pfn::PFN_vkDestroySurfaceKHR),
                        crate::void_fn!(
                            terminator::terminator_DestroySurfaceKHR,
                            pfn::PFN_vkDestroySurfaceKHR
                        ),
                    ),
                    ExtensionCommand::routed(
                        "vkGetPhysicalDeviceSurfaceSupportKHR",
                        crate::void_fn!(
                            trampoline::vkGetPhysicalDeviceSurfaceSupportKHR,
                            pfn::PFN_vkGetPhysicalDeviceSurfaceSupportKHR
                        ),
                        crate::void_fn!(
                            terminator::terminator_GetPhysicalDeviceSurfaceSupportKHR,
                            pfn::PFN_vkGetPhysicalDeviceSurfaceSupportKHR
                        ),
                    )
                    .per_surface(),
                    ExtensionCommand::routed(
                        "vkGetPhysicalDeviceSurfaceCapabilitiesKHR",
                        crate::void_fn!(
                            trampoline::vkGetPhysicalDeviceSurfaceCapabilitiesKHR,
                            pfn::PFN_vkGetPhysicalDeviceSurfaceCapabilitiesKHR
                        ),
                        crate::void_fn!(
                            terminator::terminator_GetPhysicalDeviceSurfaceCapabilitiesKHR,
                            pfn::PFN_vkGetPhysicalDeviceSurfaceCapabilitiesKHR
                        ),
                    )
                    .per_surface(),
                    ExtensionCommand::routed(
                        "vkGetPhysicalDeviceSurfaceFormatsKHR",
                        crate::void_fn!(
                            trampoline::vkGetPhysicalDeviceSurfaceFormatsKHR,
                            pfn::PFN_vkGetPhysicalDeviceSurfaceFormatsKHR
                        ),
                        crate::void_fn!(
                            terminator::terminator_GetPhysicalDeviceSurfaceFormatsKHR,
                            pfn::PFN_vkGetPhysicalDeviceSurfaceFormatsKHR
                        ),
                    )
                    .per_surface(),
                    ExtensionCommand::routed(
                        "vkGetPhysicalDeviceSurfacePresentModesKHR",
                        crate::void_fn!(
                            trampoline::vkGetPhysicalDeviceSurfacePresentModesKHR,
                            pfn::PFN_vkGetPhysicalDeviceSurfacePresentModesKHR
                        ),
                        crate::void_fn!(
                            terminator::terminator_GetPhysicalDeviceSurfacePresentModesKHR,
                            pfn::PFN_vkGetPhysicalDeviceSurfacePresentModesKHR
                        ),
                    )
                    .per_surface(),
                ],
            ),
            instance(
                KHR_GET_PHYSICAL_DEVICE_PROPERTIES_2,
                2,
                vec![
                    ExtensionCommand::routed(
                        "vkGetPhysicalDeviceFeatures2KHR",
                        crate::void_fn!(
                            trampoline::vkGetPhysicalDeviceFeatures2KHR,
                            pfn::PFN_vkGetPhysicalDeviceFeatures2
                        ),
                        crate::void_fn!(
                            terminator::terminator_GetPhysicalDeviceFeatures2,
                            pfn::PFN_vkGetPhysicalDeviceFeatures2
                        ),
                    ),
                    ExtensionCommand::routed(
                        "vkGetPhysicalDeviceProperties2KHR",
                        crate::void_fn!(
                            trampoline::vkGetPhysicalDeviceProperties2KHR,
                            pfn::PFN_vkGetPhysicalDeviceProperties2
                        ),
                        crate::void_fn!(
                            terminator::terminator_GetPhysicalDeviceProperties2,
                            pfn::PFN_vkGetPhysicalDeviceProperties2
                        ),
                    ),
                    ExtensionCommand::routed(
                        "vkGetPhysicalDeviceFormatProperties2KHR",
                        crate::void_fn!(
                            trampoline::vkGetPhysicalDeviceFormatProperties2KHR,
                            pfn::PFN_vkGetPhysicalDeviceFormatProperties2
                        ),
                        crate::void_fn!(
                            terminator::terminator_GetPhysicalDeviceFormatProperties2,
                            pfn::PFN_vkGetPhysicalDeviceFormatProperties2
                        ),
                    ),
                    ExtensionCommand::routed(
                        "vkGetPhysicalDeviceMemoryProperties2KHR",
                        crate::void_fn!(
                            trampoline::vkGetPhysicalDeviceMemoryProperties2KHR,
                            pfn::PFN_vkGetPhysicalDeviceMemoryProperties2
                        ),
                        crate::void_fn!(
                            terminator::terminator_GetPhysicalDeviceMemoryProperties2,
                            pfn::PFN_vkGetPhysicalDeviceMemoryProperties2
                        ),
                    ),
                ],
            ),
            instance(
                KHR_EXTERNAL_MEMORY_CAPABILITIES,
                1,
                vec![ExtensionCommand::routed(
                    "vkGetPhysicalDeviceExternalBufferPropertiesKHR",
                    crate::void_fn!(
                        trampoline::vkGetPhysicalDeviceExternalBufferPropertiesKHR,
                        pfn::PFN_vkGetPhysicalDeviceExternalBufferProperties
                    ),
                    crate::void_fn!(
                        terminator::terminator_GetPhysicalDeviceExternalBufferProperties,
                        pfn::PFN_vkGetPhysicalDeviceExternalBufferProperties
                    ),
                )],
            ),
            instance(
                KHR_EXTERNAL_SEMAPHORE_CAPABILITIES,
                1,
                vec![ExtensionCommand::routed(
                    "vkGetPhysicalDeviceExternalSemaphorePropertiesKHR",
                    crate::void_fn!(
                        trampoline::vkGetPhysicalDeviceExternalSemaphorePropertiesKHR,
                        pfn::PFN_vkGetPhysicalDeviceExternalSemaphoreProperties
                    ),
                    crate::void_fn!(
                        terminator::terminator_GetPhysicalDeviceExternalSemaphoreProperties,
                        pfn::PFN_vkGetPhysicalDeviceExternalSemaphoreProperties
                    ),
                )],
            ),
            instance(
                KHR_EXTERNAL_FENCE_CAPABILITIES,
                1,
                vec![ExtensionCommand::routed(
                    "vkGetPhysicalDeviceExternalFencePropertiesKHR",
                    crate::void_fn!(
                        trampoline::vkGetPhysicalDeviceExternalFencePropertiesKHR,
                        pfn::PFN_vkGetPhysicalDeviceExternalFenceProperties
                    ),
                    crate::void_fn!(
                        terminator::terminator_GetPhysicalDeviceExternalFenceProperties,
                        pfn::PFN_vkGetPhysicalDeviceExternalFenceProperties
                    ),
                )],
            ),
            instance(
                NV_EXTERNAL_MEMORY_CAPABILITIES,
                1,
                vec![ExtensionCommand::routed(
                    "vkGetPhysicalDeviceExternalImageFormatPropertiesNV",
                    crate::void_fn!(
                        trampoline::vkGetPhysicalDeviceExternalImageFormatPropertiesNV,
                        pfn::PFN_vkGetPhysicalDeviceExternalImageFormatPropertiesNV
                    ),
                    crate::void_fn!(
                        terminator::terminator_GetPhysicalDeviceExternalImageFormatPropertiesNV,
                        pfn::PFN_vkGetPhysicalDeviceExternalImageFormatPropertiesNV
                    ),
                )],
            ),
            instance(
                EXT_DIRECT_MODE_DISPLAY,
                1,
                vec![ExtensionCommand::routed(
                    "vkReleaseDisplayEXT",
                    crate::void_fn!(trampoline::vkReleaseDisplayEXT, pfn::PFN_vkReleaseDisplayEXT),
                    crate::void_fn!(terminator::terminator_ReleaseDisplayEXT, pfn::PFN_vkReleaseDisplayEXT),
                )],
            ),
            ExtensionEntry {
                emulated: true,
                ..instance(
                    KHR_DEVICE_GROUP_CREATION,
                    1,
                    vec![ExtensionCommand::routed(
                        "vkEnumeratePhysicalDeviceGroupsKHR",
                        crate::void_fn!(
                            trampoline::vkEnumeratePhysicalDeviceGroupsKHR,
                            pfn::PFN_vkEnumeratePhysicalDeviceGroups
                        ),
                        crate::void_fn!(
                            terminator::terminator_EnumeratePhysicalDeviceGroups,
                            pfn::PFN_vkEnumeratePhysicalDeviceGroups
                        ),
                    )],
                )
            },
            ExtensionEntry {
                emulated: true,
                ..instance(KHR_PORTABILITY_ENUMERATION, 1, Vec::new())
            },
            ExtensionEntry {
                requires_terminator: false,
                ..instance(
                    EXT_DEBUG_UTILS,
                    2,
                    vec![
                        ExtensionCommand::forwarded(
                            "vkCreateDebugUtilsMessengerEXT",
                            crate::void_fn!(
                                trampoline::vkCreateDebugUtilsMessengerEXT,
                                pfn::PFN_vkCreateDebugUtilsMessengerEXT
                            ),
                        ),
                        ExtensionCommand::forwarded(
                            "vkDestroyDebugUtilsMessengerEXT",
                            crate::void_fn!(
                                trampoline::vkDestroyDebugUtilsMessengerEXT,
                                pfn::PFN_vkDestroyDebugUtilsMessengerEXT
                            ),
                        ),
                        ExtensionCommand::forwarded(
                            "vkSubmitDebugUtilsMessageEXT",
                            crate::void_fn!(
                                trampoline::vkSubmitDebugUtilsMessageEXT,
                                pfn::PFN_vkSubmitDebugUtilsMessageEXT
                            ),
                        ),
                    ],
                )
            },
            ExtensionEntry {
                name: KHR_SWAPCHAIN,
                class: Device,
                spec_version: 70,
                requires_terminator: true,
                emulated: false,
                commands: vec![ExtensionCommand::device(
                    "vkCreateSwapchainKHR",
                    crate::void_fn!(device::terminator_CreateSwapchainKHR, pfn::PFN_vkCreateSwapchainKHR),
                )
                .per_surface()],
            },
            ExtensionEntry {
                name: KHR_DISPLAY_SWAPCHAIN,
                class: Device,
                spec_version: 10,
                requires_terminator: true,
                emulated: false,
                commands: vec![ExtensionCommand::device(
                    "vkCreateSharedSwapchainsKHR",
                    crate::void_fn!(
                        device::terminator_CreateSharedSwapchainsKHR,
                        pfn::PFN_vkCreateSharedSwapchainsKHR
                    ),
                )
                .per_surface()],
            },
            ExtensionEntry {
                name: EXT_DEBUG_MARKER,
                class: Device,
                spec_version: 4,
                requires_terminator: true,
                emulated: false,
                commands: vec![
                    ExtensionCommand::device(
                        "vkDebugMarkerSetObjectTagEXT",
                        crate::void_fn!(
                            device::terminator_DebugMarkerSetObjectTagEXT,
                            pfn::PFN_vkDebugMarkerSetObjectTagEXT
                        ),
                    ),
                    ExtensionCommand::device(
                        "vkDebugMarkerSetObjectNameEXT",
                        crate::void_fn!(
                            device::terminator_DebugMarkerSetObjectNameEXT,
                            pfn::PFN_vkDebugMarkerSetObjectNameEXT
                        ),
                    ),
                ],
            },
        ];

        Self::new(entries)
    }
}

/// The loader's built-in registry.
pub static REGISTRY: Lazy<ExtensionRegistry> = Lazy::new(ExtensionRegistry::builtin);

pub fn lookup(name: &str, class: ExtensionClass) -> Option<&'static ExtensionEntry> {
    REGISTRY.lookup(name, class)
}
