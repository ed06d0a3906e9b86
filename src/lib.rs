#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

//! # Sentinel Breaker
//!
//! A circuit breaker wraps calls to an unreliable downstream operation.
//! It keeps the outcomes of the most recent calls in a fixed size ring per state
//! and, based on the failure rate of that ring, permits calls, rejects them at once,
//! or lets a few trial calls through to probe whether the downstream has recovered.
//!
//! ## Add Dependency
//!
//! ```toml
//! [dependencies]
//! sentinel-breaker = { version = "0.1.0" }
//! ```
//!
//! Optional features lists:
//! - async: guard futures with `CircuitBreaker::call_async()`.
//! - logger_env: Use `env_logger` to initialize logging.
//! - logger_log4rs: Use `log4rs` to initialize logging.
//!
//! ## Guarding Calls
//!
//! ```rust
//! use sentinel_breaker::circuitbreaker::CircuitBreaker;
//! let breaker = CircuitBreaker::with_defaults("backend");
//! match breaker.call(|| fetch()) {
//!     Ok(value) => {}
//!     // the operation was not invoked
//!     Err(err) if err.is_not_permitted() => {}
//!     // the operation was invoked and failed, `err.into_failure()` returns its error
//!     Err(err) => {}
//! }
//! ```
//!
//! `decorate_supplier()` and `decorate_function()` wrap a closure once
//! and keep its signature, provided its error type can be built from `CallNotPermitted`.
//!
//! ## Registry
//!
//! `Registry` hands out one breaker per name.
//! It is created explicitly, either with `Registry::of(config)`
//! or from a YAML configuration:
//!
//! ```rust
//! let mut path = String::from("testdata/config/breaker.yaml");
//! sentinel_breaker::init_with_config_file(&mut path)?;
//! let registry = sentinel_breaker::registry_from_global_config()?;
//! ```

// This module is not intended to be part of the public API.
#[macro_use]
#[doc(hidden)]
pub mod macros;

/// Initialization and registry construction from the global config.
pub mod api;
/// Core implementations: the breaker state machine and its ring statistics,
/// the call guard, the registry, errors and configuration.
pub mod core;
/// Adapters for different logging crates.
pub mod logging;
// Utility functions.
pub mod utils;

// re-export precludes
pub use crate::core::*;
pub use api::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
