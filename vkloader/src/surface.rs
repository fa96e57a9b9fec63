//! Loader surfaces (VK_KHR_surface)
//!
//! A loader surface stands for one driver surface per driver of its instance.
//! The window-system code creating surfaces registers them here; terminators
//! swap the loader handle for the surface of the driver they are calling.

use ash::vk::{self, Handle};
use log::debug;
use once_cell::sync::Lazy;
use std::sync::Arc;

use crate::error::{LoaderError, Result};
use crate::handle::HandleAllocator;
use crate::instance;

pub static SURFACE_ALLOCATOR: Lazy<HandleAllocator<LoaderSurface>> = Lazy::new(HandleAllocator::new);

pub struct LoaderSurface {
    pub instance: vk::Instance,
    /// Indexed like the instance's driver list; null where a driver has none
    pub per_driver: Vec<vk::SurfaceKHR>,
}

/// Register the driver surfaces backing one application-visible surface.
pub fn register_surface(instance: vk::Instance, per_driver: Vec<vk::SurfaceKHR>) -> Result<vk::SurfaceKHR> {
    let loader_instance = instance::get_instance(instance)
        .ok_or_else(|| LoaderError::InvalidHandle("Invalid instance".to_string()))?;

    if per_driver.len() != loader_instance.drivers.len() {
        return Err(LoaderError::InvalidHandle(format!(
            "{} driver surface(s) for {} driver(s)",
            per_driver.len(),
            loader_instance.drivers.len()
        )));
    }

    debug!("Registering surface over {:?}", per_driver);
    let handle = SURFACE_ALLOCATOR.allocate_addressed(LoaderSurface { instance, per_driver });
    Ok(vk::SurfaceKHR::from_raw(handle))
}

pub fn unregister_surface(surface: vk::SurfaceKHR) -> Option<Arc<LoaderSurface>> {
    SURFACE_ALLOCATOR.remove(surface.as_raw())
}

pub fn get_surface_data(surface: vk::SurfaceKHR) -> Option<Arc<LoaderSurface>> {
    SURFACE_ALLOCATOR.get(surface.as_raw())
}

/// The surface the driver at `driver_index` knows.  Unregistered surfaces,
/// and registered ones without a surface for that driver, pass through
/// untouched.
pub fn real_surface(surface: vk::SurfaceKHR, driver_index: usize) -> vk::SurfaceKHR {
    get_surface_data(surface)
        .and_then(|data| data.per_driver.get(driver_index).copied())
        .filter(|driver_surface| *driver_surface != vk::SurfaceKHR::null())
        .unwrap_or(surface)
}
