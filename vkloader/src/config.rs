//! Loader configuration read from the environment

use log::LevelFilter;

pub const ENV_LOADER_DEBUG: &str = "VK_LOADER_DEBUG";
pub const ENV_DISABLE_INST_EXT_FILTER: &str = "VK_LOADER_DISABLE_INST_EXT_FILTER";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoaderConfig {
    pub log_level: LevelFilter,
    /// Report every driver instance extension, known to the loader or not
    pub disable_instance_extension_filter: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            log_level: LevelFilter::Warn,
            disable_instance_extension_filter: false,
        }
    }
}

impl LoaderConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(level) = lookup(ENV_LOADER_DEBUG).as_deref().and_then(parse_debug_levels) {
            config.log_level = level;
        }

        config.disable_instance_extension_filter = lookup(ENV_DISABLE_INST_EXT_FILTER)
            .and_then(|value| value.trim().parse::<i64>().ok())
            .map_or(false, |value| value != 0);

        config
    }
}

/// Most verbose of a comma separated level list, `None` if nothing is recognised.
fn parse_debug_levels(value: &str) -> Option<LevelFilter> {
    value
        .split(',')
        .filter_map(|token| match token.trim().to_ascii_lowercase().as_str() {
            "error" => Some(LevelFilter::Error),
            "warn" => Some(LevelFilter::Warn),
            "info" => Some(LevelFilter::Info),
            "debug" => Some(LevelFilter::Debug),
            "all" => Some(LevelFilter::Trace),
            _ => None,
        })
        .max()
}
