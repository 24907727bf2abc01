//! Authentication-failure recovery for remote API clients.
//!
//! This crate provides:
//! - Tolerant parsing and classification of opaque API failures
//! - A shared, re-armable auth gate that concurrent callers wait on
//! - Backoff-scheduled automatic reauthorization with a single pending timer
//! - A recovery coordinator that picks automatic, manual, network or fatal handling
//! - A retry driver that re-issues an operation once the gate resolves
//!
//! ## Usage
//!
//! ```rust,ignore
//! let coordinator = RecoveryCoordinator::new(
//!     RecoveryConfig::from_env()?,
//!     Collaborators::new(authorizer, presenter, connectivity),
//! );
//! let driver = RetryDriver::for_coordinator(coordinator.clone());
//!
//! let metadata = driver.run(|| api.fetch_metadata(&file_id)).await?;
//! ```

mod backoff;
mod classifier;
mod collaborators;
mod config;
mod coordinator;
mod describe;
mod diagnostics;
mod error;
mod failure;
mod gate;
mod retry;
mod status;

#[cfg(test)]
mod tests;

pub use backoff::{ArmOutcome, BackoffScheduler, BackoffState, DEFAULT_BACKOFF_STEPS_MS};
pub use classifier::{classify_failure, ErrorClassifier, ErrorKind, FATAL_FORBIDDEN_REASONS};
pub use collaborators::{AccessToken, Authorizer, ConnectivityWatcher, DiagnosticSink, Presenter};
pub use config::{parse_steps, RecoveryConfig, DEFAULT_AUTH_TIMEOUT_MS};
pub use coordinator::{Collaborators, RecoveryCoordinator};
pub use describe::{describe, describe_known};
pub use diagnostics::{DiagnosticRecord, TracingDiagnostics, CAPTURE_CLASSIFY, CAPTURE_DESCRIBE};
pub use error::{DiagnosticError, RecoveryError, RecoveryResult};
pub use failure::{
    ApiFailure, NestedError, RawFailure, NETWORK_ERROR_CODE, TIMEOUT_SENTINEL,
    TOKEN_REFRESH_REQUIRED,
};
pub use gate::{AuthGate, GateInput, GateOutcome, GateState, GateTicket};
pub use retry::{FailureInterceptor, GateInterceptor, RetryDriver, Verdict};
pub use status::{Authorization, Status, StatusBoard, StatusNotice};
