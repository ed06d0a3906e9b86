use super::{CircuitBreaker, Permission};
use crate::base::{CallError, CallNotPermitted};
use std::sync::Arc;

/// A permission granted by a circuit breaker.
/// Dropped without an outcome, it counts as a failure while unwinding from a panic
/// and is released otherwise (e.g. the future carrying it was cancelled).
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    permission: Permission,
    settled: bool,
}

impl<'a> Permit<'a> {
    fn success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }

    fn settle<T, E>(self, result: Result<T, E>) -> Result<T, CallError<E>> {
        match result {
            Ok(value) => {
                self.success();
                Ok(value)
            }
            Err(err) => {
                self.failure();
                Err(CallError::Failed(err))
            }
        }
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if std::thread::panicking() {
            self.breaker.record_failure();
        } else {
            self.breaker.release_permission(self.permission);
        }
    }
}

impl CircuitBreaker {
    fn acquire(&self) -> Result<Permit<'_>, CallNotPermitted> {
        match self.acquire_permission() {
            Some(permission) => Ok(Permit {
                breaker: self,
                permission,
                settled: false,
            }),
            None => Err(CallNotPermitted::new(
                self.name().to_string(),
                self.current_state(),
            )),
        }
    }

    /// `call` runs `f` if the breaker permits it and records its outcome.
    /// `f` runs without any lock of the breaker held.
    pub fn call<T, E, F>(&self, f: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let permit = self.acquire()?;
        permit.settle(f())
    }

    cfg_async! {
        /// `call_async` awaits `fut` if the breaker permits it and records its outcome.
        /// A cancelled call gives its permission back without recording anything.
        pub async fn call_async<T, E, Fut>(&self, fut: Fut) -> Result<T, CallError<E>>
        where
            Fut: std::future::Future<Output = Result<T, E>>,
        {
            let permit = self.acquire()?;
            permit.settle(fut.await)
        }
    }
}

/// `decorate_supplier` wraps `supplier` so that every invocation goes through `breaker`.
/// The decorated supplier keeps the signature of the original one,
/// a rejection is converted into `E`.
pub fn decorate_supplier<T, E, F>(
    breaker: Arc<CircuitBreaker>,
    supplier: F,
) -> impl Fn() -> Result<T, E>
where
    F: Fn() -> Result<T, E>,
    E: From<CallNotPermitted>,
{
    move || breaker.call(&supplier).map_err(CallError::into_inner)
}

/// `decorate_function` is `decorate_supplier` for a function taking one argument.
/// Use `()` as the return value to decorate a consumer.
pub fn decorate_function<A, T, E, F>(
    breaker: Arc<CircuitBreaker>,
    function: F,
) -> impl Fn(A) -> Result<T, E>
where
    F: Fn(A) -> Result<T, E>,
    E: From<CallNotPermitted>,
{
    move |arg| {
        breaker
            .call(|| function(arg))
            .map_err(CallError::into_inner)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::circuitbreaker::{CircuitBreakerConfig, State};
    use std::cell::Cell;
    use std::panic::{self, AssertUnwindSafe};
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    enum ServiceError {
        Backend(String),
        Rejected(CallNotPermitted),
    }

    impl From<CallNotPermitted> for ServiceError {
        fn from(err: CallNotPermitted) -> Self {
            ServiceError::Rejected(err)
        }
    }

    fn breaker() -> Arc<CircuitBreaker> {
        let config = CircuitBreakerConfig::custom()
            .failure_rate_threshold(50.0)
            .wait_duration_in_open_state(Duration::from_secs(60))
            .ring_buffer_size_in_closed_state(2)
            .ring_buffer_size_in_half_open_state(1)
            .build()
            .unwrap();
        Arc::new(CircuitBreaker::with_config("guard", config))
    }

    #[test]
    fn call_passes_value_and_failure_through() {
        let breaker = breaker();
        assert_eq!(breaker.call(|| Ok::<_, String>(42)).unwrap(), 42);
        let err = breaker.call(|| Err::<u32, _>("boom".to_string())).unwrap_err();
        assert!(err.is_failed());
        assert_eq!(err.into_failure(), Some("boom".to_string()));
        // 1 of 2 failed => tripped
        assert_eq!(breaker.current_state(), State::Open);
    }

    #[test]
    fn rejected_call_is_never_invoked() {
        let breaker = breaker();
        breaker.call(|| Err::<(), _>(())).unwrap_err();
        breaker.call(|| Err::<(), _>(())).unwrap_err();
        let invoked = Cell::new(false);
        let err = breaker
            .call(|| {
                invoked.set(true);
                Ok::<_, ()>(())
            })
            .unwrap_err();
        assert!(!invoked.get());
        let rejection = err.not_permitted().unwrap();
        assert_eq!(rejection.breaker_name(), "guard");
        assert_eq!(rejection.state(), State::Open);
        assert_eq!(breaker.metrics().not_permitted_calls, 1);
    }

    #[test]
    fn decorated_supplier_keeps_signature() {
        let breaker = breaker();
        let failing = decorate_supplier(Arc::clone(&breaker), || {
            Err::<u32, _>(ServiceError::Backend("down".into()))
        });
        let healthy = decorate_supplier(Arc::clone(&breaker), || Ok::<u32, ServiceError>(7));
        assert_eq!(healthy(), Ok(7));
        assert_eq!(failing(), Err(ServiceError::Backend("down".into())));
        match healthy() {
            Err(ServiceError::Rejected(err)) => assert_eq!(err.state(), State::Open),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn decorated_function_takes_argument() {
        let breaker = breaker();
        let parse = decorate_function(Arc::clone(&breaker), |raw: &str| {
            raw.parse::<u32>()
                .map_err(|err| ServiceError::Backend(err.to_string()))
        });
        assert_eq!(parse("12"), Ok(12));
        assert!(matches!(parse("twelve"), Err(ServiceError::Backend(_))));
        assert!(matches!(parse("13"), Err(ServiceError::Rejected(_))));
    }

    #[test]
    fn panic_counts_as_failure() {
        let breaker = breaker();
        breaker.call(|| Ok::<_, ()>(())).unwrap();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            breaker.call(|| -> Result<(), ()> { panic!("operation panicked") })
        }));
        assert!(result.is_err());
        let metrics = breaker.metrics();
        assert_eq!(metrics.state, State::Open);
        assert_eq!(metrics.not_permitted_calls, 0);
    }
}
