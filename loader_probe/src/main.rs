use ash::vk::{self, Handle};
use clap::Parser;
use log::debug;
use std::ffi::CStr;
use std::path::PathBuf;
use std::ptr;

use vkloader::config::LoaderConfig;
use vkloader::exports::vkGetInstanceProcAddr;
use vkloader::library::LibraryDrivers;
use vkloader::loader::Loader;
use vkloader::{instance, pfn, typed_fn};

/// Entry points worth reporting after the instance exists
const PROBED_COMMANDS: &[&CStr] = &[
    c"vkEnumeratePhysicalDevices",
    c"vkCreateDevice",
    c"vkGetPhysicalDeviceSurfaceSupportKHR",
    c"vkGetPhysicalDeviceProperties2KHR",
    c"vkGetPhysicalDeviceExternalBufferPropertiesKHR",
    c"vkEnumeratePhysicalDeviceGroupsKHR",
    c"vkCreateDebugUtilsMessengerEXT",
    c"vkReleaseDisplayEXT",
];

/// Load Vulkan driver libraries through vkloader and report what an
/// instance over them looks like
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Instance extension to enable, may be repeated
    #[arg(long = "enable", value_name = "VK_EXT_name")]
    enable: Vec<String>,

    /// Driver libraries, one driver each
    #[arg(required = true, value_name = "DRIVER_LIBRARY")]
    libraries: Vec<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let config = LoaderConfig::from_env();
    vkloader::init_logging(&config);
    debug!("Probe arguments: libraries {:?}, enable {:?}", args.libraries, args.enable);

    println!("vkloader probe");
    println!("==============\n");

    println!("1. Opening driver libraries...");
    let drivers = std::sync::Arc::new(LibraryDrivers::open(&args.libraries));
    if drivers.is_empty() {
        println!("   ✗ No driver library could be opened");
        std::process::exit(1);
    }
    println!("   ✓ {} of {} opened", drivers.len(), args.libraries.len());

    println!("\n2. Discovering drivers...");
    let loader = match Loader::discover(drivers.as_ref(), drivers.clone(), config).and_then(Loader::install) {
        Ok(loader) => loader,
        Err(e) => {
            println!("   ✗ {}", e);
            std::process::exit(1);
        }
    };
    for caps in loader.drivers().capabilities() {
        let path = drivers.path(caps.driver).map(|p| p.display().to_string()).unwrap_or_default();
        println!(
            "   {:?} {} ({} instance extension(s))",
            caps.driver,
            path,
            caps.supported_instance_extensions.len()
        );
    }

    println!("\n3. Instance extensions offered to applications...");
    for ext in loader.enumerate_instance_extension_properties() {
        println!("     - {} (v{})", ext.name, ext.spec_version);
    }

    println!("\n4. Creating instance with {:?}...", args.enable);
    let vk_instance = match unsafe { loader.create_instance(args.enable.as_slice(), None) } {
        Ok(vk_instance) => vk_instance,
        Err(e) => {
            println!("   ✗ {} ({:?})", e, e.to_vk_result());
            std::process::exit(1);
        }
    };
    if let Some(loader_instance) = instance::get_instance(vk_instance) {
        println!("   ✓ Enabled: {:?}", loader_instance.state.enabled_extensions());
        println!("   Dispatch table holds {} command(s)", loader_instance.dispatch.len());
    }

    println!("\n5. Resolving entry points...");
    for name in PROBED_COMMANDS {
        let resolved = unsafe { vkGetInstanceProcAddr(vk_instance, name.as_ptr()) };
        let mark = if resolved.is_some() { "✓" } else { "-" };
        println!("   {} {}", mark, name.to_string_lossy());
    }

    println!("\n6. Enumerating physical devices...");
    unsafe {
        report_physical_devices(vk_instance);

        let destroy = vkGetInstanceProcAddr(vk_instance, c"vkDestroyInstance".as_ptr());
        if let Some(destroy) = destroy {
            typed_fn!(destroy, pfn::PFN_vkDestroyInstance)(vk_instance, ptr::null());
        }
    }

    println!("\n✅ Done");
}

unsafe fn report_physical_devices(vk_instance: vk::Instance) {
    let (Some(enumerate), Some(get_properties)) = (
        vkGetInstanceProcAddr(vk_instance, c"vkEnumeratePhysicalDevices".as_ptr()),
        vkGetInstanceProcAddr(vk_instance, c"vkGetPhysicalDeviceProperties".as_ptr()),
    ) else {
        println!("   ✗ Core entry points did not resolve");
        return;
    };
    let enumerate = typed_fn!(enumerate, pfn::PFN_vkEnumeratePhysicalDevices);
    let get_properties = typed_fn!(get_properties, pfn::PFN_vkGetPhysicalDeviceProperties);

    let mut count = 0u32;
    if enumerate(vk_instance, &mut count, ptr::null_mut()) != vk::Result::SUCCESS {
        println!("   ✗ Enumeration failed");
        return;
    }
    let mut devices = vec![vk::PhysicalDevice::null(); count as usize];
    let result = enumerate(vk_instance, &mut count, devices.as_mut_ptr());
    if result != vk::Result::SUCCESS {
        println!("   Enumeration returned {:?}", result);
    }
    devices.truncate(count as usize);
    println!("   Found {} device(s)", devices.len());

    for device in devices {
        let mut properties = vk::PhysicalDeviceProperties::default();
        get_properties(device, &mut properties);
        let name = CStr::from_ptr(properties.device_name.as_ptr()).to_string_lossy();
        let owner = instance::get_physical_device(device).map(|term| term.driver.driver);
        println!(
            "   {:#x}: {} (vendor {:#06x}, API {}.{}.{}) via {:?}",
            device.as_raw(),
            name,
            properties.vendor_id,
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version),
            owner
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_collect_repeated_enables() {
        let args = Args::try_parse_from([
            "loader_probe",
            "--enable",
            "VK_KHR_surface",
            "/usr/lib/libvk_a.so",
            "--enable",
            "VK_KHR_device_group_creation",
            "/usr/lib/libvk_b.so",
        ])
        .unwrap();
        assert_eq!(args.enable, vec!["VK_KHR_surface", "VK_KHR_device_group_creation"]);
        assert_eq!(
            args.libraries,
            vec![PathBuf::from("/usr/lib/libvk_a.so"), PathBuf::from("/usr/lib/libvk_b.so")]
        );
    }

    #[test]
    fn test_args_need_a_library() {
        assert!(Args::try_parse_from(["loader_probe"]).is_err());
        assert!(Args::try_parse_from(["loader_probe", "--enable", "VK_KHR_surface"]).is_err());
        assert!(Args::try_parse_from(["loader_probe", "--enable"]).is_err());
    }
}
