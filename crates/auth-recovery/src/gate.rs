//! The shared auth gate.
//!
//! Every caller that needs valid authorization takes a [`GateTicket`] on the
//! current gate instance and awaits it. Settling the gate wakes every ticket of
//! that instance exactly once and atomically installs a fresh pending instance
//! with the next generation number, so tickets taken afterwards wait for the
//! next recovery cycle.
//!
//! ## Slot lifecycle
//!
//! ```text
//! ┌─────────┐  Resolve   ┌──────────┐
//! │ Pending │ ─────────► │ Resolved │ ──┐
//! └─────────┘            └──────────┘   │
//!   ▲    │     Reject    ┌──────────┐   │ Replace (next generation)
//!   │    └─────────────► │ Rejected │ ──┤
//!   │                    └──────────┘   │
//!   └───────────────────────────────────┘
//! ```

use crate::error::{RecoveryError, RecoveryResult};
use crate::failure::RawFailure;
use rust_fsm::*;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{info, warn};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub gate_machine(Pending)

    Pending => {
        Resolve => Resolved,
        Reject => Rejected
    },
    Resolved => {
        Replace => Pending
    },
    Rejected => {
        Replace => Pending
    }
}

pub use gate_machine::Input as GateInput;
pub use gate_machine::State as GateState;
pub use gate_machine::StateMachine as GateMachine;

/// How a gate instance settled.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// The most recent recovery succeeded; retry the operation.
    Resolved,
    /// The most recent recovery failed with this failure.
    Rejected(RawFailure),
}

struct GateSlot {
    generation: u64,
    machine: GateMachine,
    sender: watch::Sender<Option<GateOutcome>>,
}

/// Process-wide, re-armable authorization gate.
pub struct AuthGate {
    slot: Mutex<GateSlot>,
}

/// A claim on one gate instance.
#[derive(Debug)]
pub struct GateTicket {
    generation: u64,
    receiver: watch::Receiver<Option<GateOutcome>>,
}

impl GateTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wait until this ticket's gate instance settles.
    pub async fn wait(mut self) -> RecoveryResult<GateOutcome> {
        let outcome = self
            .receiver
            .wait_for(Option::is_some)
            .await
            .map_err(|_| RecoveryError::GateClosed)?;
        outcome.clone().ok_or(RecoveryError::GateClosed)
    }
}

impl Default for AuthGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthGate {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            slot: Mutex::new(GateSlot {
                generation: 0,
                machine: GateMachine::new(),
                sender,
            }),
        }
    }

    /// Take a ticket on the current instance.
    pub fn subscribe(&self) -> GateTicket {
        let slot = self.lock_slot();
        GateTicket {
            generation: slot.generation,
            receiver: slot.sender.subscribe(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.lock_slot().generation
    }

    /// Number of tickets currently held on the pending instance.
    pub fn waiters(&self) -> usize {
        self.lock_slot().sender.receiver_count()
    }

    /// Resolve the current instance. Returns the settled generation.
    pub fn resolve(&self) -> u64 {
        self.settle(GateInput::Resolve, GateOutcome::Resolved)
    }

    /// Reject the current instance. Returns the settled generation.
    pub fn reject(&self, failure: RawFailure) -> u64 {
        self.settle(GateInput::Reject, GateOutcome::Rejected(failure))
    }

    fn settle(&self, input: GateInput, outcome: GateOutcome) -> u64 {
        let mut slot = self.lock_slot();
        let settled = slot.generation;

        if slot.machine.consume(&input).is_err() {
            warn!(
                generation = settled,
                state = ?slot.machine.state(),
                input = ?input,
                "Auth gate refused transition"
            );
            return settled;
        }

        let waiters = slot.sender.receiver_count();
        let resolved = matches!(outcome, GateOutcome::Resolved);
        slot.sender.send_replace(Some(outcome));

        let (sender, _) = watch::channel(None);
        slot.sender = sender;
        slot.generation += 1;
        if slot.machine.consume(&GateInput::Replace).is_err() {
            slot.machine = GateMachine::new();
        }
        drop(slot);

        info!(
            generation = settled,
            waiters = waiters,
            resolved = resolved,
            "Auth gate settled"
        );
        settled
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, GateSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_gate_machine_transitions() {
        let mut machine = GateMachine::new();
        assert_eq!(*machine.state(), GateState::Pending);

        machine.consume(&GateInput::Resolve).unwrap();
        assert_eq!(*machine.state(), GateState::Resolved);

        // A settled instance cannot settle again.
        assert!(machine.consume(&GateInput::Reject).is_err());

        machine.consume(&GateInput::Replace).unwrap();
        assert_eq!(*machine.state(), GateState::Pending);

        machine.consume(&GateInput::Reject).unwrap();
        assert_eq!(*machine.state(), GateState::Rejected);
    }

    #[test]
    fn test_pending_cannot_be_replaced() {
        let mut machine = GateMachine::new();
        assert!(machine.consume(&GateInput::Replace).is_err());
    }

    #[tokio::test]
    async fn test_resolve_wakes_every_waiter() {
        let gate = Arc::new(AuthGate::new());
        let tickets: Vec<_> = (0..5).map(|_| gate.subscribe()).collect();
        assert_eq!(gate.waiters(), 5);

        let waits = tokio::spawn(join_all(tickets.into_iter().map(GateTicket::wait)));
        tokio::task::yield_now().await;

        assert_eq!(gate.resolve(), 0);
        let outcomes = waits.await.unwrap();
        assert_eq!(outcomes.len(), 5);
        assert!(outcomes
            .into_iter()
            .all(|outcome| outcome.unwrap() == GateOutcome::Resolved));
    }

    #[tokio::test]
    async fn test_reject_carries_failure() {
        let gate = AuthGate::new();
        let ticket = gate.subscribe();
        gate.reject(RawFailure::from_status(401));

        assert_eq!(
            ticket.wait().await.unwrap(),
            GateOutcome::Rejected(RawFailure::from_status(401))
        );
    }

    #[tokio::test]
    async fn test_settle_replaces_instance() {
        let gate = AuthGate::new();
        let first = gate.subscribe();
        assert_eq!(first.generation(), 0);

        gate.resolve();
        assert_eq!(gate.generation(), 1);
        assert_eq!(gate.waiters(), 0);

        let second = gate.subscribe();
        assert_eq!(second.generation(), 1);

        // The old ticket already settled; the new one is still pending.
        assert_eq!(first.wait().await.unwrap(), GateOutcome::Resolved);
        let pending = tokio::time::timeout(Duration::from_millis(20), second.wait()).await;
        assert!(pending.is_err());
    }

    #[tokio::test]
    async fn test_new_instance_does_not_wake_old_tickets_twice() {
        let gate = AuthGate::new();
        let old = gate.subscribe();
        gate.reject(RawFailure::Timeout);
        gate.resolve();

        assert_eq!(
            old.wait().await.unwrap(),
            GateOutcome::Rejected(RawFailure::Timeout)
        );
    }

    #[tokio::test]
    async fn test_dropped_gate_closes_tickets() {
        let gate = AuthGate::new();
        let ticket = gate.subscribe();
        drop(gate);

        assert!(matches!(ticket.wait().await, Err(RecoveryError::GateClosed)));
    }
}
