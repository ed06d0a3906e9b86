use sentinel_breaker::circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, State};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

fn breaker() -> Arc<CircuitBreaker> {
    let config = CircuitBreakerConfig::custom()
        .failure_rate_threshold(50.0)
        .wait_duration_in_open_state(Duration::from_millis(50))
        .ring_buffer_size_in_closed_state(2)
        .ring_buffer_size_in_half_open_state(1)
        .build()
        .unwrap();
    Arc::new(CircuitBreaker::with_config("async", config))
}

async fn fetch(fail: bool) -> Result<u32, String> {
    sleep(Duration::from_millis(1)).await;
    if fail {
        Err("upstream error".into())
    } else {
        Ok(1)
    }
}

#[tokio::test]
async fn records_outcomes_of_futures() {
    let breaker = breaker();
    assert_eq!(breaker.call_async(fetch(false)).await.unwrap(), 1);
    let err = breaker.call_async(fetch(true)).await.unwrap_err();
    assert_eq!(err.into_failure(), Some("upstream error".to_string()));
    assert_eq!(breaker.current_state(), State::Open);
    let err = breaker.call_async(fetch(false)).await.unwrap_err();
    assert!(err.is_not_permitted());
}

#[tokio::test]
async fn cancelled_trial_is_released() {
    let breaker = breaker();
    breaker.call_async(fetch(true)).await.unwrap_err();
    breaker.call_async(fetch(true)).await.unwrap_err();
    assert_eq!(breaker.current_state(), State::Open);
    sleep(Duration::from_millis(80)).await;

    // takes the only trial, then gets cancelled
    let slow = breaker.call_async(async {
        sleep(Duration::from_secs(5)).await;
        Ok::<_, String>(0)
    });
    assert!(timeout(Duration::from_millis(10), slow).await.is_err());
    assert_eq!(breaker.current_state(), State::HalfOpen);

    assert_eq!(breaker.call_async(fetch(false)).await.unwrap(), 1);
    assert_eq!(breaker.current_state(), State::Closed);
}

#[tokio::test]
async fn concurrent_tasks_share_the_breaker() {
    let breaker = breaker();
    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let breaker = Arc::clone(&breaker);
            tokio::spawn(async move { breaker.call_async(fetch(false)).await.is_ok() })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap());
    }
    assert_eq!(breaker.metrics().failure_rate, Some(0.0));
}

#[tokio::test]
async fn future_dropped_after_trip_keeps_trial_limit() {
    let breaker = breaker();
    // acquires its permission while closed and stays pending
    let mut slow = Box::pin(breaker.call_async(async {
        sleep(Duration::from_secs(5)).await;
        Ok::<_, String>(0)
    }));
    tokio::select! {
        _ = &mut slow => panic!("should still be pending"),
        _ = sleep(Duration::from_millis(5)) => {}
    }

    breaker.call_async(fetch(true)).await.unwrap_err();
    breaker.call_async(fetch(true)).await.unwrap_err();
    assert_eq!(breaker.current_state(), State::Open);
    sleep(Duration::from_millis(80)).await;
    assert!(breaker.try_acquire_permission());
    assert_eq!(breaker.current_state(), State::HalfOpen);

    drop(slow);
    assert!(!breaker.try_acquire_permission());
}
