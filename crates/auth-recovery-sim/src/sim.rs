//! Scripted collaborators and operations driving the coordinator.

use crate::script::{AuthOutcome, CallOutcome};
use async_trait::async_trait;
use auth_recovery::{
    AccessToken, Authorizer, ConnectivityWatcher, Presenter, RawFailure, RecoveryCoordinator,
    Status,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Authorizer replaying the `--auth` list. Interactive calls always succeed.
pub struct ScriptedAuthorizer {
    automatic: Mutex<VecDeque<AuthOutcome>>,
    automatic_calls: AtomicUsize,
    interactive_calls: AtomicUsize,
}

impl ScriptedAuthorizer {
    pub fn new(outcomes: Vec<AuthOutcome>) -> Self {
        Self {
            automatic: Mutex::new(outcomes.into()),
            automatic_calls: AtomicUsize::new(0),
            interactive_calls: AtomicUsize::new(0),
        }
    }

    pub fn automatic_calls(&self) -> usize {
        self.automatic_calls.load(Ordering::SeqCst)
    }

    pub fn interactive_calls(&self) -> usize {
        self.interactive_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authorizer for ScriptedAuthorizer {
    async fn authorize_automatic(&self) -> Result<AccessToken, RawFailure> {
        let call = self.automatic_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = self
            .automatic
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(AuthOutcome::Grant);

        info!(call = call, outcome = ?outcome, "Automatic reauthorization");
        match outcome {
            AuthOutcome::Grant => Ok(AccessToken::new(format!("sim-token-{call}"))),
            AuthOutcome::Fail => Err(RawFailure::from_status(401)),
            AuthOutcome::Hang => std::future::pending::<Result<AccessToken, RawFailure>>().await,
        }
    }

    async fn authorize_interactive(&self) -> Result<AccessToken, RawFailure> {
        let call = self.interactive_calls.fetch_add(1, Ordering::SeqCst) + 1;
        info!(call = call, "Interactive reauthorization");
        Ok(AccessToken::new(format!("sim-interactive-token-{call}")))
    }
}

/// Logs status changes and forwards prompt requests to [`answer_prompts`].
pub struct ConsolePresenter {
    prompts: mpsc::UnboundedSender<bool>,
}

impl ConsolePresenter {
    pub fn new(prompts: mpsc::UnboundedSender<bool>) -> Self {
        Self { prompts }
    }
}

impl Presenter for ConsolePresenter {
    fn render_status(&self, status: &Status) {
        info!(
            authorization = status.authorization.as_i8(),
            popup_active = status.popup_active,
            notice = status.notice.map(|notice| notice.message()).unwrap_or(""),
            "Status"
        );
    }

    fn show_error(&self, message: &str) {
        warn!(message = %message, "Error shown to user");
    }

    fn prompt_manual_permission(&self, active: bool) {
        info!(active = active, "Manual permission prompt");
        if self.prompts.send(active).is_err() {
            warn!("Prompt listener is gone");
        }
    }
}

/// Answer every shown prompt by accepting or declining it.
pub async fn answer_prompts(
    coordinator: RecoveryCoordinator,
    mut prompts: mpsc::UnboundedReceiver<bool>,
    accept: bool,
) {
    while let Some(shown) = prompts.recv().await {
        if !shown {
            continue;
        }
        if accept {
            coordinator.accept_manual_prompt().await;
        } else {
            coordinator.decline_manual_prompt();
        }
    }
}

/// Connectivity that comes back after a fixed delay.
pub struct DelayedConnectivity {
    delay: Duration,
}

impl DelayedConnectivity {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl ConnectivityWatcher for DelayedConnectivity {
    async fn connectivity_restored(&self) {
        tokio::time::sleep(self.delay).await;
    }
}

/// One caller's view of the script. Calls past the end succeed.
pub struct ScriptedOperation {
    script: Arc<Vec<CallOutcome>>,
    calls: AtomicUsize,
}

impl ScriptedOperation {
    pub fn new(script: Arc<Vec<CallOutcome>>) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn call(&self) -> Result<String, RawFailure> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.get(index) {
            Some(CallOutcome::Fail(failure)) => Err(failure.clone()),
            Some(CallOutcome::Ok) | None => Ok(format!("response #{}", index + 1)),
        }
    }
}
