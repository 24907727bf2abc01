//! Backoff scheduling for deferred reauthorization attempts.
//!
//! The delay sequence is an explicit ordered table walked by a cursor. The
//! cursor never moves backwards; once it reaches the last entry that delay
//! repeats indefinitely.
//!
//! | Arm # | Delay    |
//! |-------|----------|
//! | 1     | 1ms      |
//! | 2     | 500ms    |
//! | 3     | 1s       |
//! | 4     | 2.5s     |
//! | 5     | 5s       |
//! | 6     | 10s      |
//! | 7+    | 60s      |

use crate::status::{Authorization, StatusBoard};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Default delay table in milliseconds.
pub const DEFAULT_BACKOFF_STEPS_MS: [u64; 7] = [1, 500, 1_000, 2_500, 5_000, 10_000, 60_000];

/// Cursor over the delay table.
#[derive(Debug, Clone)]
pub struct BackoffState {
    steps: Vec<Duration>,
    cursor: Option<usize>,
}

impl Default for BackoffState {
    fn default() -> Self {
        Self::new(
            DEFAULT_BACKOFF_STEPS_MS
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        )
    }
}

impl BackoffState {
    /// An empty table falls back to the default one.
    pub fn new(steps: Vec<Duration>) -> Self {
        if steps.is_empty() {
            return Self::default();
        }
        Self {
            steps,
            cursor: None,
        }
    }

    /// Delay used by the most recent arm, if any.
    pub fn current_delay(&self) -> Option<Duration> {
        self.cursor.map(|index| self.steps[index])
    }

    /// Move to the next delay and return it.
    pub fn advance(&mut self) -> Duration {
        let last = self.steps.len() - 1;
        let next = match self.cursor {
            None => 0,
            Some(index) => (index + 1).min(last),
        };
        self.cursor = Some(next);
        self.steps[next]
    }
}

/// Result of [`BackoffScheduler::arm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    /// A timer was started with this delay.
    Scheduled(Duration),
    /// A timer was already pending; nothing changed.
    AlreadyPending,
}

struct PendingTimer {
    id: u64,
    delay: Duration,
    handle: JoinHandle<()>,
}

struct SchedulerState {
    backoff: BackoffState,
    pending: Option<PendingTimer>,
    next_timer_id: u64,
}

/// Runs at most one deferred action at a time.
pub struct BackoffScheduler {
    state: Mutex<SchedulerState>,
    status: StatusBoard,
}

impl BackoffScheduler {
    pub fn new(backoff: BackoffState, status: StatusBoard) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SchedulerState {
                backoff,
                pending: None,
                next_timer_id: 0,
            }),
            status,
        })
    }

    /// Schedule `action` after the next delay unless a timer is already pending.
    ///
    /// The pending handle is cleared before `action` runs, so the action itself
    /// (or anything it wakes) may arm again.
    pub fn arm<F>(self: &Arc<Self>, action: F) -> ArmOutcome
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = {
            let mut state = self.lock_state();
            if let Some(pending) = state.pending.as_ref() {
                debug!(
                    timer_id = pending.id,
                    delay_ms = pending.delay.as_millis() as u64,
                    "Backoff timer already pending, ignoring arm"
                );
                return ArmOutcome::AlreadyPending;
            }

            let delay = state.backoff.advance();
            let id = state.next_timer_id;
            state.next_timer_id += 1;

            let scheduler = Arc::clone(self);
            let handle = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                scheduler.clear_pending(id);
                action.await;
            });
            state.pending = Some(PendingTimer { id, delay, handle });
            delay
        };

        self.status
            .update(|status| status.authorization = Authorization::Refreshing);
        info!(delay_ms = delay.as_millis() as u64, "Scheduled reauthorization attempt");
        ArmOutcome::Scheduled(delay)
    }

    pub fn is_pending(&self) -> bool {
        self.lock_state().pending.is_some()
    }

    pub fn current_delay(&self) -> Option<Duration> {
        self.lock_state().backoff.current_delay()
    }

    /// Abort the pending timer, if any. The backoff position is kept.
    pub fn cancel_pending(&self) -> bool {
        match self.lock_state().pending.take() {
            Some(pending) => {
                pending.handle.abort();
                debug!(timer_id = pending.id, "Cancelled pending backoff timer");
                true
            }
            None => false,
        }
    }

    fn clear_pending(&self, id: u64) {
        let mut state = self.lock_state();
        if state.pending.as_ref().is_some_and(|pending| pending.id == id) {
            state.pending = None;
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::harness::RecordingPresenter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn scheduler() -> (Arc<BackoffScheduler>, Arc<RecordingPresenter>) {
        let presenter = Arc::new(RecordingPresenter::default());
        let status = StatusBoard::new(presenter.clone());
        (BackoffScheduler::new(BackoffState::default(), status), presenter)
    }

    #[test]
    fn test_delay_sequence_caps_at_one_minute() {
        let mut state = BackoffState::default();
        assert_eq!(state.current_delay(), None);

        let delays: Vec<u64> = (0..10).map(|_| state.advance().as_millis() as u64).collect();
        assert_eq!(
            delays,
            vec![1, 500, 1_000, 2_500, 5_000, 10_000, 60_000, 60_000, 60_000, 60_000]
        );
        assert_eq!(state.current_delay(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_empty_table_uses_default() {
        let mut state = BackoffState::new(Vec::new());
        assert_eq!(state.advance(), Duration::from_millis(1));
    }

    #[test]
    fn test_single_entry_table_repeats() {
        let mut state = BackoffState::new(vec![Duration::from_millis(250)]);
        assert_eq!(state.advance(), Duration::from_millis(250));
        assert_eq!(state.advance(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_while_pending_is_noop() {
        let (scheduler, _) = scheduler();
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let fired = fired.clone();
            scheduler.arm(async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(scheduler.is_pending());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_pending());
        assert_eq!(scheduler.current_delay(), Some(Duration::from_millis(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_outcomes_and_status() {
        let (scheduler, presenter) = scheduler();

        assert_eq!(
            scheduler.arm(async {}),
            ArmOutcome::Scheduled(Duration::from_millis(1))
        );
        assert_eq!(scheduler.arm(async {}), ArmOutcome::AlreadyPending);
        assert_eq!(
            presenter.rendered().last().map(|s| s.authorization),
            Some(Authorization::Refreshing)
        );

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(
            scheduler.arm(async {}),
            ArmOutcome::Scheduled(Duration::from_millis(500))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_action_may_rearm() {
        let (scheduler, _) = scheduler();
        let fired = Arc::new(AtomicUsize::new(0));

        let inner_scheduler = scheduler.clone();
        let inner_fired = fired.clone();
        scheduler.arm(async move {
            inner_fired.fetch_add(1, Ordering::SeqCst);
            let fired = inner_fired.clone();
            let outcome = inner_scheduler.arm(async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
            assert_eq!(outcome, ArmOutcome::Scheduled(Duration::from_millis(500)));
        });

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending() {
        let (scheduler, _) = scheduler();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        scheduler.arm(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(scheduler.cancel_pending());
        assert!(!scheduler.cancel_pending());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
