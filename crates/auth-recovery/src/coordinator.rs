//! Recovery coordinator.
//!
//! Turns a classified failure into exactly one shared recovery attempt:
//!
//! - `AutoRefresh`: arm the backoff scheduler; when it fires, race a silent
//!   reauthorization against the auth timeout and settle the gate.
//! - `ManualRefresh`: show the permission prompt and wait for the user.
//! - `NetworkError`: wait for connectivity, then resolve the gate.
//! - `ServerError`: arm the backoff scheduler with a plain retry.
//! - `Fatal`: show the failure; the gate is left alone.
//!
//! Every failure first resets the status to "unauthenticated" before branching.

use crate::backoff::{ArmOutcome, BackoffScheduler, BackoffState};
use crate::classifier::{ErrorClassifier, ErrorKind};
use crate::collaborators::{Authorizer, ConnectivityWatcher, DiagnosticSink, Presenter};
use crate::config::RecoveryConfig;
use crate::diagnostics::TracingDiagnostics;
use crate::failure::RawFailure;
use crate::gate::{AuthGate, GateTicket};
use crate::status::{Authorization, Status, StatusBoard, StatusNotice};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// External collaborators wired into a coordinator.
pub struct Collaborators {
    pub authorizer: Arc<dyn Authorizer>,
    pub presenter: Arc<dyn Presenter>,
    pub connectivity: Arc<dyn ConnectivityWatcher>,
    pub diagnostics: Arc<dyn DiagnosticSink>,
}

impl Collaborators {
    /// Collaborators with the tracing diagnostic sink.
    pub fn new(
        authorizer: Arc<dyn Authorizer>,
        presenter: Arc<dyn Presenter>,
        connectivity: Arc<dyn ConnectivityWatcher>,
    ) -> Self {
        Self {
            authorizer,
            presenter,
            connectivity,
            diagnostics: Arc::new(TracingDiagnostics),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

struct CoordinatorInner {
    config: RecoveryConfig,
    classifier: ErrorClassifier,
    gate: AuthGate,
    scheduler: Arc<BackoffScheduler>,
    status: StatusBoard,
    authorizer: Arc<dyn Authorizer>,
    presenter: Arc<dyn Presenter>,
    connectivity: Arc<dyn ConnectivityWatcher>,
    connectivity_task: Mutex<Option<JoinHandle<()>>>,
    prompt_visible: AtomicBool,
    auto_attempts: AtomicU32,
}

/// Shared recovery authority. Cheap to clone.
#[derive(Clone)]
pub struct RecoveryCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl RecoveryCoordinator {
    pub fn new(config: RecoveryConfig, collaborators: Collaborators) -> Self {
        let status = StatusBoard::new(collaborators.presenter.clone());
        let classifier = ErrorClassifier::new(collaborators.diagnostics, status.clone());
        let scheduler =
            BackoffScheduler::new(BackoffState::new(config.backoff_steps()), status.clone());

        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                classifier,
                gate: AuthGate::new(),
                scheduler,
                status,
                authorizer: collaborators.authorizer,
                presenter: collaborators.presenter,
                connectivity: collaborators.connectivity,
                connectivity_task: Mutex::new(None),
                prompt_visible: AtomicBool::new(false),
                auto_attempts: AtomicU32::new(0),
            }),
        }
    }

    /// Take a ticket on the current auth gate.
    pub fn subscribe(&self) -> GateTicket {
        self.inner.gate.subscribe()
    }

    pub fn status(&self) -> Status {
        self.inner.status.snapshot()
    }

    pub fn gate_generation(&self) -> u64 {
        self.inner.gate.generation()
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.inner.classifier
    }

    pub fn scheduler(&self) -> &Arc<BackoffScheduler> {
        &self.inner.scheduler
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.inner.config
    }

    /// Classify a failure and start the matching recovery. Returns the kind;
    /// callers holding a gate ticket should wait on it unless the kind is fatal.
    pub fn handle_failure(&self, failure: &RawFailure) -> ErrorKind {
        self.inner.status.update(|status| {
            status.authorization = Authorization::Unauthenticated;
            status.popup_active = false;
            status.notice = None;
        });

        let kind = self.inner.classifier.classify(failure);
        match kind {
            ErrorKind::AutoRefresh => self.begin_auto_refresh(),
            ErrorKind::ManualRefresh => self.begin_manual_refresh(),
            ErrorKind::NetworkError => self.await_connectivity(),
            ErrorKind::ServerError => self.begin_server_retry(),
            ErrorKind::Fatal => {
                let message = self.inner.classifier.describe(failure);
                warn!(message = %message, "Unrecoverable remote failure");
                self.inner.presenter.show_error(&message);
            }
        }
        kind
    }

    /// Called by the presentation layer when the user accepts the prompt.
    pub async fn accept_manual_prompt(&self) {
        self.hide_prompt();
        self.perform_manual_reauth().await;
    }

    /// Called by the presentation layer when the user dismisses the prompt.
    pub fn decline_manual_prompt(&self) {
        self.hide_prompt();
        info!("Manual authorization declined");
        self.inner.gate.reject(RawFailure::user_declined());
    }

    /// Resolve the gate because connectivity came back. Used when the
    /// connectivity watcher is driven from outside.
    pub fn notify_connectivity_restored(&self) {
        info!("Connectivity restored");
        self.reset_auto_attempts();
        self.resolve_gate();
    }

    /// Stop pending timers and watchers. Waiting tickets stay pending.
    pub fn shutdown(&self) {
        self.inner.scheduler.cancel_pending();
        if let Some(task) = self.lock_connectivity_task().take() {
            task.abort();
        }
    }

    fn begin_auto_refresh(&self) {
        if let Some(max) = self.inner.config.max_auto_attempts {
            let attempts = self.inner.auto_attempts.load(Ordering::SeqCst);
            if attempts >= max && !self.inner.scheduler.is_pending() {
                warn!(
                    attempts = attempts,
                    max_attempts = max,
                    "Automatic reauthorization attempts exhausted, asking the user"
                );
                self.begin_manual_refresh();
                return;
            }
        }

        self.inner.status.update(|status| {
            status.authorization = Authorization::Refreshing;
            status.popup_active = false;
            status.notice = Some(StatusNotice::Reauthorizing);
        });

        let coordinator = self.clone();
        match self
            .inner
            .scheduler
            .arm(async move { coordinator.perform_automatic_reauth().await })
        {
            ArmOutcome::Scheduled(delay) => {
                let attempt = self.inner.auto_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Automatic reauthorization armed"
                );
            }
            ArmOutcome::AlreadyPending => {
                debug!("Automatic reauthorization already pending");
            }
        }
    }

    fn begin_manual_refresh(&self) {
        self.inner.status.update(|status| {
            status.authorization = Authorization::Refreshing;
            status.popup_active = false;
            status.notice = None;
        });

        if !self.inner.prompt_visible.swap(true, Ordering::SeqCst) {
            info!("Requesting manual authorization");
            self.inner.presenter.prompt_manual_permission(true);
        }
    }

    fn await_connectivity(&self) {
        self.inner
            .status
            .update(|status| status.notice = Some(StatusNotice::NetworkRetrying));

        if !self.inner.config.connectivity_self_arm {
            debug!("Waiting for external connectivity notification");
            return;
        }

        let mut task = self.lock_connectivity_task();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Connectivity watcher already armed");
            return;
        }

        let coordinator = self.clone();
        *task = Some(tokio::spawn(async move {
            coordinator.inner.connectivity.connectivity_restored().await;
            // Vacate the slot before waking callers so the next outage can re-arm.
            coordinator.lock_connectivity_task().take();
            coordinator.notify_connectivity_restored();
        }));
        info!("Armed connectivity watcher");
    }

    fn begin_server_retry(&self) {
        self.inner
            .status
            .update(|status| status.notice = Some(StatusNotice::ServerRetrying));

        let coordinator = self.clone();
        if let ArmOutcome::Scheduled(delay) = self.inner.scheduler.arm(async move {
            coordinator.resolve_gate();
        }) {
            debug!(delay_ms = delay.as_millis() as u64, "Server retry armed");
        }
    }

    async fn perform_automatic_reauth(&self) {
        let timeout = self.inner.config.auth_timeout();
        match tokio::time::timeout(timeout, self.inner.authorizer.authorize_automatic()).await {
            Ok(Ok(_token)) => {
                info!("Automatic reauthorization succeeded");
                self.reset_auto_attempts();
                self.resolve_gate();
            }
            Ok(Err(failure)) => {
                warn!(status = ?failure.status(), "Automatic reauthorization failed");
                self.inner.gate.reject(failure);
            }
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Automatic reauthorization timed out"
                );
                self.inner.gate.reject(RawFailure::Absent);
            }
        }
    }

    async fn perform_manual_reauth(&self) {
        self.inner.status.update(|status| {
            status.authorization = Authorization::Refreshing;
            status.popup_active = true;
        });

        let timeout = self.inner.config.auth_timeout();
        match tokio::time::timeout(timeout, self.inner.authorizer.authorize_interactive()).await {
            Ok(Ok(_token)) => {
                info!("Interactive reauthorization succeeded");
                self.reset_auto_attempts();
                self.resolve_gate();
            }
            Ok(Err(failure)) => {
                warn!(status = ?failure.status(), "Interactive reauthorization failed");
                self.inner.status.update(|status| status.popup_active = false);
                self.inner.gate.reject(failure);
            }
            Err(_) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Interactive reauthorization timed out"
                );
                self.inner.status.update(|status| status.popup_active = false);
                self.inner.gate.reject(RawFailure::Absent);
            }
        }
    }

    /// Server retries resolve the gate without touching the attempt budget.
    fn resolve_gate(&self) {
        self.hide_prompt();
        self.inner.status.update(|status| {
            status.authorization = Authorization::Authenticated;
            status.popup_active = false;
            status.notice = None;
        });
        self.inner.gate.resolve();
    }

    fn reset_auto_attempts(&self) {
        self.inner.auto_attempts.store(0, Ordering::SeqCst);
    }

    fn hide_prompt(&self) {
        if self.inner.prompt_visible.swap(false, Ordering::SeqCst) {
            self.inner.presenter.prompt_manual_permission(false);
        }
    }

    fn lock_connectivity_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.inner
            .connectivity_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
