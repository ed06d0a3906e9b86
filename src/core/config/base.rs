use super::{constant::*, BreakerConfigEntity, ConfigEntity};
use crate::{circuitbreaker::CircuitBreakerConfig, logging, utils, Error, Result};
use lazy_static::lazy_static;
use std::env;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

lazy_static! {
    static ref GLOBAL_CONFIG: RwLock<ConfigEntity> = RwLock::new(ConfigEntity::new());
}

pub fn reset_global_config(entity: ConfigEntity) {
    let mut cfg = GLOBAL_CONFIG
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    *cfg = entity;
}

/// `global_config` returns a copy of the effective global config.
pub fn global_config() -> ConfigEntity {
    GLOBAL_CONFIG
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

// init_config_with_yaml loads general configuration from the YAML file under provided path.
pub fn init_config_with_yaml(config_path: &mut String) -> Result<()> {
    apply_yaml_config_file(config_path)?;
    override_config_from_env_and_init_log()?;
    Ok(())
}

// apply_yaml_config_file loads general configuration from the given YAML file.
fn apply_yaml_config_file(config_path: &mut String) -> Result<()> {
    // Priority: system environment > YAML file > default config
    if utils::is_blank(config_path) {
        // If the config file path is absent, try to resolve it from the system env.
        *config_path = env::var(CONF_FILE_PATH_ENV_KEY).unwrap_or_else(|_| CONFIG_FILENAME.into());
    }
    load_global_config_from_yaml_file(config_path)?;
    Ok(())
}

fn load_global_config_from_yaml_file(path_str: &str) -> Result<()> {
    if path_str == CONFIG_FILENAME {
        // use default global config
        return Ok(());
    }
    let path = Path::new(path_str);
    if !path.exists() {
        return Err(Error::msg(format!(
            "YAML configuration file {} does not exist!",
            path_str
        )));
    }
    let mut file = File::open(path)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    let entity: ConfigEntity = serde_yaml::from_str(&content)?;
    entity.check()?;
    logging::info!("[Config] Resolving config from file, file {}", path_str);
    reset_global_config(entity);
    Ok(())
}

pub fn override_config_from_env_and_init_log() -> Result<()> {
    override_items_from_system_env()?;
    #[cfg(any(feature = "logger_env", feature = "logger_log4rs"))]
    init_log()?;
    Ok(())
}

fn override_items_from_system_env() -> Result<()> {
    let mut entity = global_config();
    apply_env_overrides(&mut entity.config.breaker.default, |key| env::var(key).ok());
    entity.check()?;
    reset_global_config(entity);
    Ok(())
}

/// Overrides the default breaker config with the values found by `lookup`.
/// Values which fail to parse are ignored.
pub(crate) fn apply_env_overrides<F>(entity: &mut BreakerConfigEntity, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = parse_env(&lookup, FAILURE_RATE_THRESHOLD_ENV_KEY) {
        entity.failure_rate_threshold = v;
    }
    if let Some(v) = parse_env(&lookup, WAIT_DURATION_MS_ENV_KEY) {
        entity.wait_duration_in_open_state_ms = v;
    }
    if let Some(v) = parse_env(&lookup, CLOSED_RING_SIZE_ENV_KEY) {
        entity.ring_buffer_size_in_closed_state = v;
    }
    if let Some(v) = parse_env(&lookup, HALF_OPEN_RING_SIZE_ENV_KEY) {
        entity.ring_buffer_size_in_half_open_state = v;
    }
}

fn parse_env<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            logging::warn!("[Config] Ignoring unparsable env {}={}", key, raw);
            None
        }
    }
}

cfg_logger! {
    pub fn init_log() -> Result<()> {
        logging::logger_init(log_config_file());
        logging::info!("[Config] Print effective global config, globalConfig {}", global_config());
        Ok(())
    }
}

#[inline]
pub fn log_config_file() -> Option<String> {
    let file = GLOBAL_CONFIG
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .config
        .log
        .config_file
        .clone();
    if utils::is_blank(&file) {
        None
    } else {
        Some(file)
    }
}

/// `default_breaker_config` builds the default breaker config of the global config.
pub fn default_breaker_config() -> Result<CircuitBreakerConfig> {
    GLOBAL_CONFIG
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .config
        .breaker
        .default
        .build()
}
