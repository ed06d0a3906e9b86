//! A circuit breaker guards calls to an unreliable operation.
//! It records the outcome of the last calls in a fixed size ring,
//! trips to Open once the ring is full and its failure rate reaches the configured threshold,
//! and probes the operation again in HalfOpen after the configured wait duration.
//!
//! ```rust
//! use sentinel_breaker::circuitbreaker::{CircuitBreakerConfig, Registry};
//! use std::time::Duration;
//!
//! let config = CircuitBreakerConfig::custom()
//!     .failure_rate_threshold(50.0)
//!     .wait_duration_in_open_state(Duration::from_secs(1))
//!     .ring_buffer_size_in_closed_state(10)
//!     .ring_buffer_size_in_half_open_state(1)
//!     .build()?;
//! let registry = Registry::of(config);
//! let breaker = registry.circuit_breaker("backend");
//! match breaker.call(|| query_backend()) {
//!     Ok(rows) => println!("{:?}", rows),
//!     Err(err) if err.is_not_permitted() => println!("backend is unavailable: {}", err),
//!     Err(err) => println!("query failed: {}", err),
//! }
//! ```

pub mod breaker;
pub mod config;
pub mod guard;
pub mod registry;

pub use breaker::*;
pub use config::*;
pub use guard::*;
pub use registry::*;
