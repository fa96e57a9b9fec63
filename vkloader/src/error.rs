//! Error types for the loader core

use ash::vk;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoaderError {
    #[error("Extension not present: {0}")]
    ExtensionNotPresent(String),

    #[error("Command {command} has terminators from both {first} and {second}")]
    DuplicateTerminatorBinding {
        command: String,
        first: String,
        second: String,
    },

    #[error("No element of the layer chain implements {0}")]
    UnresolvedCommand(String),

    #[error("Driver is missing required entry point {0}")]
    MissingEntryPoint(String),

    #[error("Incompatible driver: {0}")]
    IncompatibleDriver(String),

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Failed to load driver library: {0}")]
    LibraryLoad(String),

    #[error("Loader already initialized")]
    AlreadyInitialized,

    #[error("Driver returned {0:?}")]
    Driver(vk::Result),
}

pub type Result<T> = std::result::Result<T, LoaderError>;

impl LoaderError {
    /// Convert LoaderError to the Vulkan result code reported to the application
    pub fn to_vk_result(&self) -> vk::Result {
        match self {
            LoaderError::ExtensionNotPresent(_) => vk::Result::ERROR_EXTENSION_NOT_PRESENT,
            LoaderError::MissingEntryPoint(_)
            | LoaderError::IncompatibleDriver(_)
            | LoaderError::LibraryLoad(_) => vk::Result::ERROR_INCOMPATIBLE_DRIVER,
            LoaderError::DuplicateTerminatorBinding { .. }
            | LoaderError::UnresolvedCommand(_)
            | LoaderError::InvalidHandle(_)
            | LoaderError::AlreadyInitialized => vk::Result::ERROR_INITIALIZATION_FAILED,
            LoaderError::Driver(result) => *result,
        }
    }
}

/// Turn a driver's return code into a `Result`, keeping the code on failure.
pub(crate) fn check(result: vk::Result) -> Result<()> {
    match result {
        vk::Result::SUCCESS => Ok(()),
        other => Err(LoaderError::Driver(other)),
    }
}
