//!  Circuit Breaker State Machine:
//!
//!                          closed ring full and failure rate >= threshold
//!
//!             +-----------------------------------------------------------------------+
//!             |                                                                       |
//!             |                                                                       v
//!     +----------------+                   +----------------+  retry timeout  +----------------+
//!     |                |                   |                |<----------------|                |
//!     |                |  rate < threshold |                |                 |                |
//!     |     Closed     |<------------------|    HalfOpen    |                 |      Open      |
//!     |                |                   |                | rate >= thresh. |                |
//!     |                |                   |                +---------------->|                |
//!     +----------------+                   +----------------+                 +----------------+
//!
//! Closed and HalfOpen own a fresh `RingBitSet` each time they are entered,
//! a failure rate is only evaluated once that ring is full.
//! Open has no ring, it is left lazily by the first permission request
//! made after the retry timestamp.

mod ring_bit_set;

pub(crate) use ring_bit_set::RingBitSet;

use super::CircuitBreakerConfig;
use crate::{logging, utils};
use std::fmt;
use std::sync::{
    atomic::{AtomicU64, AtomicU8, Ordering},
    Arc, Mutex, MutexGuard, PoisonError, RwLock,
};
use std::time::Instant;

/// States of Circuit Breaker State Machine
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum State {
    #[default]
    Closed,
    HalfOpen,
    Open,
}

impl State {
    fn from_u8(v: u8) -> State {
        match v {
            1 => State::HalfOpen,
            2 => State::Open,
            _ => State::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            State::Closed => 0,
            State::HalfOpen => 1,
            State::Open => 2,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Closed => "CLOSED",
            State::HalfOpen => "HALF_OPEN",
            State::Open => "OPEN",
        };
        write!(f, "{}", name)
    }
}

/// `StateChangeListener` listens on the circuit breaker state change event.
/// Listeners are invoked after the state lock has been released,
/// in the thread which caused the transformation.
pub trait StateChangeListener: Sync + Send {
    /// `on_transform_to_closed` is triggered when circuit breaker state transformed to Closed.
    fn on_transform_to_closed(&self, name: &str, prev: State);

    /// `on_transform_to_open` is triggered when circuit breaker state transformed to Open.
    /// `failure_rate` is the rate (in percent) which tripped the breaker.
    fn on_transform_to_open(&self, name: &str, prev: State, failure_rate: f32);

    /// `on_transform_to_half_open` is triggered when circuit breaker state transformed to HalfOpen.
    fn on_transform_to_half_open(&self, name: &str, prev: State);
}

/// A point-in-time view on the statistics of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub state: State,
    /// failure rate of the active ring, `None` while it is not full or the breaker is open
    pub failure_rate: Option<f32>,
    pub buffered_calls: usize,
    pub failed_calls: usize,
    /// capacity of the active ring, 0 while the breaker is open
    pub max_buffered_calls: usize,
    /// calls rejected since the breaker was created
    pub not_permitted_calls: u64,
}

/// `Permission` is handed out by `acquire_permission()`.
/// It remembers the state period it was issued in, so that releasing it
/// after the breaker moved on leaves the current period untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permission {
    period: u64,
}

#[derive(Debug)]
enum BreakerState {
    Closed(RingBitSet),
    Open {
        // `None` if the wait duration overflows the clock
        retry_at: Option<Instant>,
    },
    HalfOpen {
        ring: RingBitSet,
        // trial permissions handed out in this half-open period
        permitted: usize,
    },
}

impl BreakerState {
    fn state(&self) -> State {
        match self {
            BreakerState::Closed(_) => State::Closed,
            BreakerState::Open { .. } => State::Open,
            BreakerState::HalfOpen { .. } => State::HalfOpen,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    from: State,
    to: State,
    failure_rate: Option<f32>,
    retry_at_ms: u64,
}

enum Acquire {
    Permitted,
    Probe,
    Rejected,
}

/// `CircuitBreaker` guards calls to an unreliable operation.
///
/// Share it with `Arc`; all the methods take `&self`.
/// A permission obtained with `try_acquire_permission()` must be settled with exactly one of
/// `record_success()`, `record_failure()` or `release_permission()`.
/// `call()` and the `decorate_*` functions do that automatically.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
    // mirrors the variant of `state`, written only with `state` locked
    state_tag: AtomicU8,
    // bumped by every transformation before `state_tag` is stored
    period: AtomicU64,
    not_permitted_calls: AtomicU64,
    listeners: RwLock<Vec<Arc<dyn StateChangeListener>>>,
}

impl CircuitBreaker {
    /// Creates a circuit breaker with the built-in default config.
    pub fn with_defaults<S: Into<String>>(name: S) -> Self {
        Self::with_config(name, CircuitBreakerConfig::default())
    }

    pub fn with_config<S: Into<String>>(name: S, config: CircuitBreakerConfig) -> Self {
        let ring = RingBitSet::new(config.ring_buffer_size_in_closed_state());
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState::Closed(ring)),
            state_tag: AtomicU8::new(State::Closed.as_u8()),
            period: AtomicU64::new(0),
            not_permitted_calls: AtomicU64::new(0),
            listeners: RwLock::new(Vec::new()),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// `current_state` returns current state of the circuit breaker, without locking.
    /// An expired Open state is still reported as Open until a permission is requested.
    #[inline]
    pub fn current_state(&self) -> State {
        State::from_u8(self.state_tag.load(Ordering::SeqCst))
    }

    pub fn add_state_change_listener(&self, listener: Arc<dyn StateChangeListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn clear_state_change_listeners(&self) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// `try_acquire_permission` decides whether a call may proceed.
    /// Closed always permits. Open rejects until the retry deadline is reached,
    /// the first request after it moves the breaker to HalfOpen and is the first trial.
    /// HalfOpen permits as many trials as its ring can hold.
    #[inline]
    pub fn try_acquire_permission(&self) -> bool {
        self.acquire_permission().is_some()
    }

    /// `acquire_permission` is `try_acquire_permission` returning the granted permission,
    /// which can be given back with `release_permission()`.
    pub fn acquire_permission(&self) -> Option<Permission> {
        let period = self.period.load(Ordering::SeqCst);
        if self.current_state() == State::Closed && self.period.load(Ordering::SeqCst) == period {
            return Some(Permission { period });
        }
        let (period, transition) = {
            let mut state = self.lock_state();
            let decision = match &mut *state {
                BreakerState::Closed(_) => Acquire::Permitted,
                BreakerState::Open { retry_at } => {
                    if retry_at.map_or(false, |at| Instant::now() >= at) {
                        Acquire::Probe
                    } else {
                        Acquire::Rejected
                    }
                }
                BreakerState::HalfOpen { ring, permitted } => {
                    if *permitted < ring.capacity() {
                        *permitted += 1;
                        Acquire::Permitted
                    } else {
                        Acquire::Rejected
                    }
                }
            };
            let transition = match decision {
                Acquire::Permitted => None,
                Acquire::Rejected => {
                    drop(state);
                    self.not_permitted_calls.fetch_add(1, Ordering::SeqCst);
                    return None;
                }
                Acquire::Probe => {
                    let transition = self.transform(&mut state, State::HalfOpen, None);
                    if let BreakerState::HalfOpen { permitted, .. } = &mut *state {
                        *permitted = 1;
                    }
                    Some(transition)
                }
            };
            (self.period.load(Ordering::SeqCst), transition)
        };
        if let Some(transition) = transition {
            self.publish(transition);
        }
        Some(Permission { period })
    }

    /// Records a successful call made under a permission.
    #[inline]
    pub fn record_success(&self) {
        self.on_outcome(false);
    }

    /// Records a failed call made under a permission.
    #[inline]
    pub fn record_failure(&self) {
        self.on_outcome(true);
    }

    /// `release_permission` gives back a permission whose call was never completed
    /// (e.g. a dropped future), nothing is recorded.
    /// Only a trial of the current HalfOpen period frees a slot,
    /// permissions issued before the last transformation are ignored.
    pub fn release_permission(&self, permission: Permission) {
        let mut state = self.lock_state();
        if permission.period != self.period.load(Ordering::SeqCst) {
            logging::debug!(
                "[CircuitBreaker] {} ignoring release of a permission from an earlier period",
                self.name
            );
            return;
        }
        if let BreakerState::HalfOpen { ring, permitted } = &mut *state {
            if *permitted > ring.len() {
                *permitted -= 1;
            }
        }
    }

    /// `reset` returns the breaker to Closed with empty statistics.
    pub fn reset(&self) {
        let transition = {
            let mut state = self.lock_state();
            self.transform(&mut state, State::Closed, None)
        };
        logging::info!("[CircuitBreaker] {} reset", self.name);
        if transition.from != State::Closed {
            self.publish(transition);
        }
    }

    pub fn metrics(&self) -> Metrics {
        let state = self.lock_state();
        let not_permitted_calls = self.not_permitted_calls.load(Ordering::SeqCst);
        let ring = match &*state {
            BreakerState::Closed(ring) => Some(ring),
            BreakerState::HalfOpen { ring, .. } => Some(ring),
            BreakerState::Open { .. } => None,
        };
        Metrics {
            state: state.state(),
            failure_rate: ring.and_then(RingBitSet::failure_rate),
            buffered_calls: ring.map_or(0, RingBitSet::len),
            failed_calls: ring.map_or(0, RingBitSet::failures),
            max_buffered_calls: ring.map_or(0, RingBitSet::capacity),
            not_permitted_calls,
        }
    }

    fn on_outcome(&self, is_failure: bool) {
        let threshold = self.config.failure_rate_threshold();
        let transition = {
            let mut state = self.lock_state();
            let next = match &mut *state {
                BreakerState::Closed(ring) => match ring.record(is_failure) {
                    Some(rate) if rate >= threshold => Some((State::Open, rate)),
                    _ => None,
                },
                BreakerState::HalfOpen { ring, .. } => match ring.record(is_failure) {
                    Some(rate) if rate >= threshold => Some((State::Open, rate)),
                    Some(rate) => Some((State::Closed, rate)),
                    None => None,
                },
                BreakerState::Open { .. } => {
                    logging::debug!(
                        "[CircuitBreaker] {} is open, ignoring outcome (failure: {}) of a stale permission",
                        self.name,
                        is_failure
                    );
                    None
                }
            };
            next.map(|(to, rate)| self.transform(&mut state, to, Some(rate)))
        };
        if let Some(transition) = transition {
            self.publish(transition);
        }
    }

    // must be called with the state locked
    fn transform(&self, state: &mut BreakerState, to: State, failure_rate: Option<f32>) -> Transition {
        let from = state.state();
        let mut retry_at_ms = 0;
        *state = match to {
            State::Closed => {
                BreakerState::Closed(RingBitSet::new(self.config.ring_buffer_size_in_closed_state()))
            }
            State::Open => {
                let wait = self.config.wait_duration_in_open_state();
                // wall clock, only for the log line
                retry_at_ms = utils::curr_time_millis()
                    .saturating_add(u64::try_from(wait.as_millis()).unwrap_or(u64::MAX));
                BreakerState::Open {
                    retry_at: Instant::now().checked_add(wait),
                }
            }
            State::HalfOpen => BreakerState::HalfOpen {
                ring: RingBitSet::new(self.config.ring_buffer_size_in_half_open_state()),
                permitted: 0,
            },
        };
        self.period.fetch_add(1, Ordering::SeqCst);
        self.state_tag.store(to.as_u8(), Ordering::SeqCst);
        Transition {
            from,
            to,
            failure_rate,
            retry_at_ms,
        }
    }

    fn publish(&self, transition: Transition) {
        let Transition {
            from,
            to,
            failure_rate,
            retry_at_ms,
        } = transition;
        match to {
            State::Open => logging::warn!(
                "[CircuitBreaker] {} tripped, {} -> {}, failure rate {:?}%, retry at {}",
                self.name,
                from,
                to,
                failure_rate,
                utils::format_time_millis(retry_at_ms)
            ),
            _ => logging::info!("[CircuitBreaker] {} {} -> {}", self.name, from, to),
        }
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            match to {
                State::Closed => listener.on_transform_to_closed(&self.name, from),
                State::Open => {
                    listener.on_transform_to_open(&self.name, from, failure_rate.unwrap_or(100.0))
                }
                State::HalfOpen => listener.on_transform_to_half_open(&self.name, from),
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, BreakerState> {
        // every critical section leaves the state consistent, poisoning carries no meaning here
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.current_state())
            .field("config", &self.config)
            .finish()
    }
}
