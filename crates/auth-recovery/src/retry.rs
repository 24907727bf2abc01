//! Retry-until-success-or-fatal driver.

use crate::coordinator::RecoveryCoordinator;
use crate::describe::{describe_known, FALLBACK_MESSAGE};
use crate::error::{RecoveryError, RecoveryResult};
use crate::failure::RawFailure;
use crate::gate::GateOutcome;
use async_trait::async_trait;
use std::future::Future;
use tracing::debug;

/// What the driver should do after a failed attempt.
#[derive(Debug)]
pub enum Verdict {
    Retry,
    Abort(RecoveryError),
}

/// Decides whether a failed operation is retried.
#[async_trait]
pub trait FailureInterceptor: Send + Sync {
    async fn intercept(&self, failure: RawFailure) -> Verdict;
}

/// Re-issues an operation until it succeeds or the interceptor aborts.
pub struct RetryDriver<I> {
    interceptor: I,
}

impl<I: FailureInterceptor> RetryDriver<I> {
    pub fn new(interceptor: I) -> Self {
        Self { interceptor }
    }

    pub async fn run<T, F, Fut>(&self, mut operation: F) -> RecoveryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RawFailure>>,
    {
        let mut attempt: u32 = 1;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt = attempt, "Operation succeeded after recovery");
                    }
                    return Ok(value);
                }
                Err(failure) => match self.interceptor.intercept(failure).await {
                    Verdict::Retry => attempt += 1,
                    Verdict::Abort(error) => return Err(error),
                },
            }
        }
    }
}

impl RetryDriver<GateInterceptor> {
    /// Driver using the coordinator's auth gate.
    pub fn for_coordinator(coordinator: RecoveryCoordinator) -> Self {
        Self::new(GateInterceptor::new(coordinator))
    }
}

/// Routes failures through the coordinator and waits on the auth gate.
///
/// A resolved gate means "retry". A rejected gate hands its failure back to
/// the coordinator, which starts the next recovery cycle.
#[derive(Clone)]
pub struct GateInterceptor {
    coordinator: RecoveryCoordinator,
}

impl GateInterceptor {
    pub fn new(coordinator: RecoveryCoordinator) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl FailureInterceptor for GateInterceptor {
    async fn intercept(&self, failure: RawFailure) -> Verdict {
        let mut failure = failure;
        loop {
            // Take the ticket before recovery starts so a fast resolution is not missed.
            let ticket = self.coordinator.subscribe();
            let kind = self.coordinator.handle_failure(&failure);

            if !kind.is_recoverable() {
                // The coordinator already logged and reported the fallback case.
                let message =
                    describe_known(&failure).unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
                return Verdict::Abort(RecoveryError::Unrecoverable {
                    kind,
                    message,
                    failure,
                });
            }

            debug!(kind = ?kind, generation = ticket.generation(), "Waiting on auth gate");
            match ticket.wait().await {
                Ok(GateOutcome::Resolved) => return Verdict::Retry,
                Ok(GateOutcome::Rejected(rejection)) => failure = rejection,
                Err(error) => return Verdict::Abort(error),
            }
        }
    }
}
