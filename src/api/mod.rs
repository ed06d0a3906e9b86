//! mod `api` provides the topmost fundamental APIs.
//! Initialization is optional, it resolves the global config used by
//! `registry_from_global_config()`. There are three ways to perform it:
//!
//!  1. `init_default()`, using env variables and default values.
//!  2. `init_with_config(config_entity: ConfigEntity)`, using customized config entity.
//!  3. `init_with_config_file(config_path: String)`, using yaml file.

mod init;

pub use init::*;
