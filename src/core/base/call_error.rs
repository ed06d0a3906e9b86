use crate::circuitbreaker::State;
use std::error;
use std::fmt;

/// `CallNotPermitted` indicates the call was rejected by a circuit breaker
/// and the guarded operation was never invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallNotPermitted {
    name: String,
    state: State,
}

impl CallNotPermitted {
    pub fn new(name: String, state: State) -> Self {
        Self { name, state }
    }

    /// name of the circuit breaker which rejected the call
    pub fn breaker_name(&self) -> &str {
        &self.name
    }

    /// state of the circuit breaker when the call was rejected
    pub fn state(&self) -> State {
        self.state
    }
}

impl fmt::Display for CallNotPermitted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CircuitBreaker '{}' is {} and does not permit further calls",
            self.name, self.state
        )
    }
}

impl error::Error for CallNotPermitted {}

/// `CallError` is returned by `CircuitBreaker::call()`.
/// It keeps "not attempted" and "attempted and failed" apart,
/// the failure of the operation is carried untouched.
#[derive(Debug)]
pub enum CallError<E> {
    NotPermitted(CallNotPermitted),
    Failed(E),
}

impl<E> CallError<E> {
    pub fn is_not_permitted(&self) -> bool {
        matches!(self, CallError::NotPermitted(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, CallError::Failed(_))
    }

    /// Returns the error of the operation, if it was invoked at all.
    pub fn into_failure(self) -> Option<E> {
        match self {
            CallError::Failed(err) => Some(err),
            CallError::NotPermitted(_) => None,
        }
    }

    pub fn not_permitted(&self) -> Option<&CallNotPermitted> {
        match self {
            CallError::NotPermitted(err) => Some(err),
            CallError::Failed(_) => None,
        }
    }
}

impl<E: From<CallNotPermitted>> CallError<E> {
    /// `into_inner` folds a rejection into the error type of the operation.
    pub fn into_inner(self) -> E {
        match self {
            CallError::NotPermitted(err) => E::from(err),
            CallError::Failed(err) => err,
        }
    }
}

impl<E: fmt::Display> fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::NotPermitted(err) => write!(f, "{}", err),
            CallError::Failed(err) => write!(f, "{}", err),
        }
    }
}

impl<E> error::Error for CallError<E>
where
    E: error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            CallError::NotPermitted(err) => Some(err),
            CallError::Failed(err) => Some(err),
        }
    }
}

impl<E> From<CallNotPermitted> for CallError<E> {
    fn from(err: CallNotPermitted) -> Self {
        CallError::NotPermitted(err)
    }
}
