//! Property-based tests for retry bounds and pipeline transparency.

use std::time::Duration;

use proptest::prelude::*;
use weir::prelude::*;
use weir::testing::ScriptedOperation;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

fn transient() -> ErrorDescriptor {
    ErrorDescriptor::transient_msg("flaky")
}

proptest! {
    #[test]
    fn prop_persistent_failure_invokes_max_retries_plus_one(max_retries in 0u32..20) {
        let op = ScriptedOperation::<()>::always(Outcome::failure(transient()));
        let policy = RetryPolicy::constant(Duration::from_millis(5)).with_max_retries(max_retries);

        let outcome = runtime().block_on(policy.execute(&op, &CancellationToken::new()));

        prop_assert!(outcome.is_failure());
        prop_assert_eq!(op.calls(), max_retries + 1);
    }

    #[test]
    fn prop_recovers_within_budget(max_retries in 0u32..20, failures in 0usize..20) {
        prop_assume!(failures as u32 <= max_retries);
        let op = ScriptedOperation::failing_then(failures, transient(), failures);
        let policy = RetryPolicy::exponential(Duration::from_millis(1))
            .with_max_retries(max_retries)
            .with_max_delay(Duration::from_millis(50));

        let outcome = runtime().block_on(policy.execute(&op, &CancellationToken::new()));

        prop_assert_eq!(outcome, Outcome::Success(failures));
        prop_assert_eq!(op.calls() as usize, failures + 1);
    }

    #[test]
    fn prop_ineligible_failure_is_never_retried(max_retries in 0u32..50) {
        let op = ScriptedOperation::<()>::always(Outcome::failure(
            ErrorDescriptor::terminal_msg("forbidden"),
        ));
        let policy = RetryPolicy::constant(Duration::from_millis(5)).with_max_retries(max_retries);

        runtime().block_on(policy.execute(&op, &CancellationToken::new()));

        prop_assert_eq!(op.calls(), 1);
    }

    #[test]
    fn prop_success_is_transparent_through_pipeline(value in any::<i64>(), max_retries in 0u32..10) {
        let op = ScriptedOperation::always(Outcome::success(value));
        let policy = FallbackPolicy::value(0i64)
            .wrap(RetryPolicy::constant(Duration::from_millis(5)).with_max_retries(max_retries));

        let outcome = runtime().block_on(policy.execute(&op, &CancellationToken::new()));

        prop_assert_eq!(outcome, Outcome::Success(value));
        prop_assert_eq!(op.calls(), 1);
    }

    #[test]
    fn prop_delays_exist_only_within_budget(max_retries in 0u32..30, base_ms in 1u64..1000) {
        let policy = RetryPolicy::linear(Duration::from_millis(base_ms)).with_max_retries(max_retries);

        prop_assert_eq!(policy.delay_for_retry(0), None);
        for k in 1..=max_retries {
            prop_assert!(policy.delay_for_retry(k).is_some());
        }
        prop_assert_eq!(policy.delay_for_retry(max_retries + 1), None);
    }

    #[test]
    fn prop_exponential_is_monotonic_and_capped(
        base_ms in 1u64..500,
        cap_ms in 500u64..60_000,
    ) {
        let cap = Duration::from_millis(cap_ms);
        let policy = RetryPolicy::exponential(Duration::from_millis(base_ms))
            .with_max_retries(40)
            .with_max_delay(cap);

        let delays: Vec<Duration> = (1..=40).filter_map(|k| policy.delay_for_retry(k)).collect();

        prop_assert_eq!(delays.len(), 40);
        prop_assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(delays.iter().all(|d| *d <= cap));
    }
}
