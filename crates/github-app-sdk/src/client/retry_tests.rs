//! Tests for the retry policy.

use super::*;

#[test]
fn test_should_retry_respects_max() {
    let policy = RetryPolicy {
        max_retries: 2,
        ..RetryPolicy::default()
    };

    assert!(policy.should_retry(0));
    assert!(policy.should_retry(1));
    assert!(!policy.should_retry(2));
}

#[test]
fn test_none_policy_never_retries() {
    let policy = RetryPolicy::none();
    assert!(!policy.should_retry(0));
}

#[test]
fn test_backoff_grows_exponentially() {
    let policy = RetryPolicy {
        max_retries: 5,
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(60),
        backoff_multiplier: 2.0,
        use_jitter: false,
    };

    assert_eq!(policy.calculate_delay(1), Duration::from_millis(100));
    assert_eq!(policy.calculate_delay(2), Duration::from_millis(200));
    assert_eq!(policy.calculate_delay(3), Duration::from_millis(400));
}

#[test]
fn test_backoff_is_capped_at_max_delay() {
    let policy = RetryPolicy {
        max_retries: 20,
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(1),
        backoff_multiplier: 2.0,
        use_jitter: false,
    };

    assert_eq!(policy.calculate_delay(15), Duration::from_secs(1));
}

#[test]
fn test_jitter_stays_within_bounds() {
    let policy = RetryPolicy {
        max_retries: 3,
        initial_delay: Duration::from_millis(1000),
        max_delay: Duration::from_secs(60),
        backoff_multiplier: 2.0,
        use_jitter: true,
    };

    for _ in 0..50 {
        let delay = policy.calculate_delay(1);
        assert!(delay >= Duration::from_millis(750));
        assert!(delay <= Duration::from_millis(1250));
    }
}

#[test]
fn test_rate_limit_hint_overrides_backoff() {
    let policy = RetryPolicy {
        max_retries: 3,
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(60),
        backoff_multiplier: 2.0,
        use_jitter: false,
    };

    let error = ApiError::RateLimited {
        retry_after_secs: Some(7),
    };
    assert_eq!(policy.delay_for(1, &error), Duration::from_secs(7));

    // Hint is capped by max_delay.
    let error = ApiError::RateLimited {
        retry_after_secs: Some(3600),
    };
    assert_eq!(policy.delay_for(1, &error), Duration::from_secs(60));

    // Without a hint, fall back to the curve.
    let error = ApiError::Timeout;
    assert_eq!(policy.delay_for(1, &error), Duration::from_millis(100));
}
