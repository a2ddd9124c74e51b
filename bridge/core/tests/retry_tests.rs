// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Timing and error-identity tests for the retry helper.
//!
//! Uses paused tokio time so the exponential backoff schedule can be
//! asserted exactly without real sleeps.

use llm_bridge_core::{ConnectorBase, LLMError, RetryPolicy};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_backoff_doubles_between_attempts() {
    let policy = RetryPolicy::from_millis(4, 100);
    let start = Instant::now();
    let stamps = Arc::new(Mutex::new(Vec::new()));

    let recorder = stamps.clone();
    let result: Result<(), String> = policy
        .execute(|| {
            let recorder = recorder.clone();
            async move {
                recorder.lock().unwrap().push(start.elapsed());
                Err("down".to_string())
            }
        })
        .await;

    assert!(result.is_err());
    let stamps = stamps.lock().unwrap().clone();
    assert_eq!(stamps.len(), 4);

    let expected = [100u64, 200, 400];
    for (i, window) in stamps.windows(2).enumerate() {
        let gap = window[1] - window[0];
        let want = Duration::from_millis(expected[i]);
        assert!(
            gap >= want && gap < want + Duration::from_millis(5),
            "gap {} was {:?}, expected {:?}",
            i,
            gap,
            want
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_permanent_failure_runs_exactly_n_times() {
    for attempts in 1..=5u32 {
        let calls = Arc::new(Mutex::new(0u32));
        let counter = calls.clone();

        let result: Result<(), LLMError> = RetryPolicy::from_millis(attempts, 10)
            .execute(|| {
                let counter = counter.clone();
                async move {
                    let mut n = counter.lock().unwrap();
                    *n += 1;
                    Err(LLMError::Http {
                        status: 500,
                        status_text: "Internal Server Error".to_string(),
                        body: format!("failure #{}", *n),
                    })
                }
            })
            .await;

        assert_eq!(*calls.lock().unwrap(), attempts);
        match result {
            Err(LLMError::Http { body, .. }) => assert_eq!(body, format!("failure #{}", attempts)),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_per_call_attempt_override() {
    let base = ConnectorBase::new("test", RetryPolicy::from_millis(5, 10), Duration::from_secs(1));
    let calls = Arc::new(Mutex::new(0u32));
    let counter = calls.clone();

    let result: Result<(), LLMError> = base
        .with_retry_attempts(2, || {
            let counter = counter.clone();
            async move {
                *counter.lock().unwrap() += 1;
                Err(LLMError::Timeout(10))
            }
        })
        .await;

    assert!(matches!(result, Err(LLMError::Timeout(10))));
    assert_eq!(*calls.lock().unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_the_call_cancels_backoff() {
    let calls = Arc::new(Mutex::new(0u32));
    let counter = calls.clone();
    let policy = RetryPolicy::from_millis(3, 1_000);

    let call = policy.execute(|| {
        let counter = counter.clone();
        async move {
            *counter.lock().unwrap() += 1;
            Err::<(), _>("down".to_string())
        }
    });

    let outcome = tokio::time::timeout(Duration::from_millis(500), call).await;

    assert!(outcome.is_err());
    assert_eq!(*calls.lock().unwrap(), 1);
}
