//! Initialization resolves the global config,
//! from manually config or yaml file or env variable,
//! and initializes the global logger when a logger feature is enabled.

use crate::circuitbreaker::Registry;
use crate::config::{self, ConfigEntity};
use crate::Result;

/// `init_default` initializes using the configuration from system
/// environment and the default value.
#[inline]
pub fn init_default() -> Result<()> {
    init_with_config_file(&mut String::new())
}

/// `init_with_config` initializes using given config.
#[inline]
pub fn init_with_config(config_entity: ConfigEntity) -> Result<()> {
    config_entity.check()?;
    config::reset_global_config(config_entity);
    config::override_config_from_env_and_init_log()
}

/// `init_with_config_file` loads the general configuration from the given YAML file.
/// A blank path falls back to the file named by `SENTINEL_BREAKER_CONFIG_FILE_PATH`,
/// or to the default config.
#[inline]
pub fn init_with_config_file(config_path: &mut String) -> Result<()> {
    config::init_config_with_yaml(config_path)
}

/// `registry_from_global_config` creates a new registry from the global config.
/// Each call returns an independent registry.
pub fn registry_from_global_config() -> Result<Registry> {
    Registry::from_entity(&config::global_config())
}
