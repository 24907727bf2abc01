//! Manual authorization through the permission prompt.

use super::harness::{AuthStep, FlakyOperation, TestHarness};
use crate::classifier::ErrorKind;
use crate::error::RecoveryError;
use crate::failure::RawFailure;
use crate::status::Authorization;

#[tokio::test(start_paused = true)]
async fn absent_failure_prompts_once_and_accept_recovers() {
    let harness = TestHarness::new();

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let driver = harness.driver();
            let operation = FlakyOperation::new([RawFailure::Absent]);
            tokio::spawn(async move { driver.run(|| operation.call()).await })
        })
        .collect();
    harness.settle().await;

    assert_eq!(harness.presenter.prompts(), vec![true]);
    let status = harness.coordinator.status();
    assert_eq!(status.authorization, Authorization::Refreshing);
    assert!(!status.popup_active);
    assert_eq!(harness.authorizer.automatic_calls(), 0);

    harness.coordinator.accept_manual_prompt().await;

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "payload");
    }
    assert_eq!(harness.presenter.prompts(), vec![true, false]);
    assert_eq!(harness.authorizer.interactive_calls(), 1);
    assert_eq!(
        harness.coordinator.status().authorization,
        Authorization::Authenticated
    );
}

#[tokio::test(start_paused = true)]
async fn interactive_popup_is_reflected_in_status() {
    let harness = TestHarness::new();
    harness.authorizer.queue_interactive(AuthStep::Hang);

    let coordinator = harness.coordinator.clone();
    let accepting = tokio::spawn(async move { coordinator.accept_manual_prompt().await });
    tokio::task::yield_now().await;

    assert!(harness.coordinator.status().popup_active);
    accepting.abort();
}

#[tokio::test(start_paused = true)]
async fn declining_the_prompt_fails_waiting_callers() {
    let harness = TestHarness::new();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let driver = harness.driver();
            let operation = FlakyOperation::new([RawFailure::Absent]);
            tokio::spawn(async move { driver.run(|| operation.call()).await })
        })
        .collect();
    harness.settle().await;

    harness.coordinator.decline_manual_prompt();

    for handle in handles {
        match handle.await.unwrap() {
            Err(RecoveryError::Unrecoverable { kind, message, .. }) => {
                assert_eq!(kind, ErrorKind::Fatal);
                assert_eq!(message, "Authorization was declined.");
            }
            other => panic!("expected unrecoverable error, got {:?}", other),
        }
    }
    assert_eq!(harness.presenter.prompts(), vec![true, false]);
    assert_eq!(harness.authorizer.interactive_calls(), 0);
    assert!(harness
        .presenter
        .errors()
        .iter()
        .all(|error| error == "Authorization was declined."));
}

#[tokio::test(start_paused = true)]
async fn interactive_timeout_prompts_again() {
    let harness = TestHarness::new();
    harness.authorizer.queue_interactive(AuthStep::Hang);
    harness.authorizer.queue_interactive(AuthStep::Grant);

    let driver = harness.driver();
    let operation = FlakyOperation::new([RawFailure::Absent]);
    let waiting = tokio::spawn(async move { driver.run(|| operation.call()).await });
    harness.settle().await;

    // The popup hangs until the auth timeout rejects the gate with an absent failure.
    harness.coordinator.accept_manual_prompt().await;
    harness.settle().await;
    assert_eq!(harness.presenter.prompts(), vec![true, false, true]);
    assert!(!waiting.is_finished());

    harness.coordinator.accept_manual_prompt().await;
    assert_eq!(waiting.await.unwrap().unwrap(), "payload");
    assert_eq!(harness.authorizer.interactive_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn interactive_failure_is_reclassified() {
    let harness = TestHarness::new();
    harness
        .authorizer
        .queue_interactive(AuthStep::Fail(RawFailure::with_reason(403, "domainPolicy")));

    let driver = harness.driver();
    let operation = FlakyOperation::new([RawFailure::Absent]);
    let waiting = tokio::spawn(async move { driver.run(|| operation.call()).await });
    harness.settle().await;

    harness.coordinator.accept_manual_prompt().await;

    let error = waiting.await.unwrap().unwrap_err();
    assert!(error.is_unrecoverable());
    assert_eq!(
        error.failure().and_then(RawFailure::reason),
        Some("domainPolicy")
    );
    assert!(!harness.coordinator.status().popup_active);
}
