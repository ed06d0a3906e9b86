use super::*;
use crate::{config::ConfigEntity, logging, Result};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// `Registry` maps names to circuit breakers.
/// Breakers are created on first lookup and live as long as the registry,
/// so repeated lookups of a name share one breaker.
/// A registry is a plain value; create one per process (or per test) and pass it around.
#[derive(Debug)]
pub struct Registry {
    default_config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::of_defaults()
    }
}

impl Registry {
    /// `of` creates a registry whose breakers use `default_config`
    /// unless a config is supplied at creation.
    pub fn of(default_config: CircuitBreakerConfig) -> Self {
        Registry {
            default_config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn of_defaults() -> Self {
        Self::of(CircuitBreakerConfig::default())
    }

    /// `from_entity` builds a registry from a configuration entity,
    /// the instances listed there are created up front.
    pub fn from_entity(entity: &ConfigEntity) -> Result<Self> {
        entity.check()?;
        let section = &entity.config.breaker;
        let registry = Self::of(section.default.build()?);
        for (name, instance) in &section.instances {
            registry.circuit_breaker_with_config(name, instance.build()?);
        }
        logging::info!(
            "[Registry] Created registry with {} configured breaker(s), default config {}",
            section.instances.len(),
            registry.default_config
        );
        Ok(registry)
    }

    #[inline]
    pub fn default_config(&self) -> &CircuitBreakerConfig {
        &self.default_config
    }

    /// `circuit_breaker` returns the breaker named `name`,
    /// creating it with the default config if absent.
    pub fn circuit_breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        self.get_or_create(name, || self.default_config.clone())
    }

    /// `circuit_breaker_with_config` returns the breaker named `name`,
    /// creating it with `config` if absent.
    /// The first creation wins, `config` is ignored for an existing breaker.
    pub fn circuit_breaker_with_config(
        &self,
        name: &str,
        config: CircuitBreakerConfig,
    ) -> Arc<CircuitBreaker> {
        let breaker = self.get_or_create(name, || config.clone());
        if breaker.config() != &config {
            logging::debug!(
                "[Registry] Breaker {} already exists, ignoring the supplied config {}",
                name,
                config
            );
        }
        breaker
    }

    /// `find` returns the breaker named `name` without creating it.
    pub fn find(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(Arc::clone)
    }

    pub fn all_circuit_breakers(&self) -> Vec<Arc<CircuitBreaker>> {
        self.breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Arc::clone)
            .collect()
    }

    fn get_or_create<F>(&self, name: &str, config: F) -> Arc<CircuitBreaker>
    where
        F: FnOnce() -> CircuitBreakerConfig,
    {
        if let Some(breaker) = self.find(name) {
            return breaker;
        }
        let mut breakers = self
            .breakers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // another thread may have created it between the two locks
        let breaker = breakers.entry(name.to_string()).or_insert_with(|| {
            let config = config();
            logging::info!("[Registry] Creating breaker {} with config {}", name, config);
            Arc::new(CircuitBreaker::with_config(name, config))
        });
        Arc::clone(breaker)
    }
}
