//! Process-wide loader context
//!
//! The exported C entry points have no context argument, so the drivers they
//! operate on come from a `Loader` installed once per process by the host.

use ash::vk;
use log::info;
use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::config::LoaderConfig;
use crate::dispatch::{NoLayers, ProcChain};
use crate::driver::{DriverDiscovery, DriverExtension, DriverSet, SymbolLoader};
use crate::error::{LoaderError, Result};
use crate::instance;

static LOADER: OnceCell<Loader> = OnceCell::new();

pub struct Loader {
    drivers: DriverSet,
    config: LoaderConfig,
    chain: Arc<dyn ProcChain>,
}

impl Loader {
    pub fn new(drivers: DriverSet, config: LoaderConfig) -> Self {
        Self {
            drivers,
            config,
            chain: Arc::new(NoLayers),
        }
    }

    /// Use `chain` as the layer chain of every instance created from now on.
    pub fn with_chain(mut self, chain: Arc<dyn ProcChain>) -> Self {
        self.chain = chain;
        self
    }

    pub fn discover(
        discovery: &dyn DriverDiscovery,
        symbols: Arc<dyn SymbolLoader>,
        config: LoaderConfig,
    ) -> Result<Self> {
        Ok(Self::new(DriverSet::discover(discovery, symbols)?, config))
    }

    /// Make this loader the one the exported entry points use.
    pub fn install(self) -> Result<&'static Loader> {
        let driver_count = self.drivers.len();
        let loader = LOADER
            .try_insert(self)
            .map_err(|_| LoaderError::AlreadyInitialized)?;
        info!("Loader installed with {} driver(s)", driver_count);
        Ok(loader)
    }

    pub fn get() -> Option<&'static Loader> {
        LOADER.get()
    }

    pub fn drivers(&self) -> &DriverSet {
        &self.drivers
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub unsafe fn create_instance<S: AsRef<str>>(
        &self,
        requested_extensions: &[S],
        application_info: Option<&vk::ApplicationInfo>,
    ) -> Result<vk::Instance> {
        instance::create_instance(
            &self.drivers,
            requested_extensions,
            application_info,
            Arc::clone(&self.chain),
        )
    }

    pub fn enumerate_instance_extension_properties(&self) -> Vec<DriverExtension> {
        instance::enumerate_instance_extension_properties(&self.drivers, &self.config)
    }
}
