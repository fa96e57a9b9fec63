//! Drivers loaded from shared libraries
//!
//! The host names driver libraries explicitly; there is no manifest search.
//! Each opened library becomes one driver, numbered from 1 in the order given.

use libloading::{Library, Symbol};
use log::{info, warn};
use std::ffi::CStr;
use std::path::{Path, PathBuf};

use crate::driver::{DriverCapabilitySet, DriverDiscovery, DriverHandle, SymbolLoader};
use crate::error::{LoaderError, Result};
use crate::icd::DriverEntry;
use crate::pfn::VoidFunction;

pub struct LibraryDrivers {
    libraries: Vec<(PathBuf, Library)>,
}

impl LibraryDrivers {
    /// Open every library in `paths`; ones that fail to load are skipped.
    pub fn open<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let libraries = paths
            .into_iter()
            .filter_map(|path| {
                let path = path.as_ref();
                match Self::open_one(path) {
                    Ok(library) => Some((path.to_path_buf(), library)),
                    Err(e) => {
                        warn!("Skipping driver library {}: {}", path.display(), e);
                        None
                    }
                }
            })
            .collect::<Vec<_>>();

        info!("Opened {} driver libraries", libraries.len());
        Self { libraries }
    }

    pub fn open_one(path: &Path) -> Result<Library> {
        unsafe { Library::new(path) }.map_err(|e| LoaderError::LibraryLoad(format!("{}: {}", path.display(), e)))
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    pub fn path(&self, driver: DriverHandle) -> Option<&Path> {
        self.library(driver).map(|(path, _)| path.as_path())
    }

    fn library(&self, driver: DriverHandle) -> Option<&(PathBuf, Library)> {
        let index = usize::try_from(driver.0).ok()?.checked_sub(1)?;
        self.libraries.get(index)
    }

    fn handles(&self) -> impl Iterator<Item = DriverHandle> {
        (1..=self.libraries.len() as u64).map(DriverHandle)
    }
}

impl SymbolLoader for LibraryDrivers {
    fn load_symbol(&self, driver: DriverHandle, name: &CStr) -> Option<VoidFunction> {
        let (_, library) = self.library(driver)?;
        let symbol: Symbol<VoidFunction> = unsafe { library.get(name.to_bytes_with_nul()) }.ok()?;
        Some(*symbol)
    }
}

impl DriverDiscovery for LibraryDrivers {
    fn enumerate_drivers(&self) -> Result<Vec<DriverCapabilitySet>> {
        Ok(query_capabilities(self, self.handles()))
    }
}

/// Ask each driver for its instance extensions.  Drivers that cannot answer
/// are left out of the result.
pub fn query_capabilities(
    symbols: &dyn SymbolLoader,
    drivers: impl IntoIterator<Item = DriverHandle>,
) -> Vec<DriverCapabilitySet> {
    drivers
        .into_iter()
        .filter_map(|driver| {
            let result = unsafe { DriverEntry::load(driver, symbols).and_then(|entry| entry.instance_extensions()) };
            match result {
                Ok(extensions) => Some(DriverCapabilitySet::new(driver, extensions)),
                Err(e) => {
                    warn!("Ignoring driver {:?}: {}", driver, e);
                    None
                }
            }
        })
        .collect()
}
