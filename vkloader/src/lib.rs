//! vkloader - extension interception and dispatch core of a Vulkan loader
//!
//! Sits between an application and one or more installable client drivers
//! (ICDs).  It decides which instance extensions an instance may enable,
//! builds a per-instance dispatch table, answers `vkGet*ProcAddr`, and for the
//! commands that need it runs loader terminators that translate loader
//! handles back into the owning driver's handles.
//!
//! Architecture:
//! ```text
//! Application → exports (vkGetInstanceProcAddr, ...) → resolver
//!            → trampoline → dispatch table → [layer chain] → terminator → ICD
//! ```
//!
//! The host installs a [`loader::Loader`] describing the available drivers
//! before any exported entry point is called.

pub mod config;
pub mod device;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod exports;
pub mod gate;
pub mod handle;
pub mod icd;
pub mod instance;
pub mod library;
pub mod loader;
pub mod pfn;
pub mod registry;
pub mod resolver;
pub mod surface;
pub mod terminator;
pub mod trampoline;

#[cfg(test)]
mod testing;

use log::info;

use crate::config::LoaderConfig;

/// Initialize logging from the environment.  Safe to call more than once.
pub fn init() {
    init_logging(&LoaderConfig::from_env());
}

pub fn init_logging(config: &LoaderConfig) {
    if env_logger::builder()
        .filter_level(config.log_level)
        .try_init()
        .is_ok()
    {
        info!("vkloader v{} initialized", env!("CARGO_PKG_VERSION"));
    }
}
