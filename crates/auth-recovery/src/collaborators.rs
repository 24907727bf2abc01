//! Interfaces of the collaborators the coordinator drives.
//!
//! Request construction, presentation, connectivity probing and telemetry
//! live outside this crate; they plug in through these traits.

use crate::diagnostics::DiagnosticRecord;
use crate::error::DiagnosticError;
use crate::failure::RawFailure;
use crate::status::Status;
use async_trait::async_trait;
use std::fmt;

/// Token returned by a successful reauthorization.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Token-refresh primitives.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Silent refresh, no user interaction.
    async fn authorize_automatic(&self) -> Result<AccessToken, RawFailure>;

    /// Refresh through an interactive popup.
    async fn authorize_interactive(&self) -> Result<AccessToken, RawFailure>;
}

/// Presentation callbacks. Fire-and-forget.
pub trait Presenter: Send + Sync {
    fn render_status(&self, status: &Status);

    fn show_error(&self, message: &str);

    /// Show (`true`) or hide (`false`) the user-actionable permission prompt.
    fn prompt_manual_permission(&self, active: bool);
}

/// Resolves once network connectivity is back.
#[async_trait]
pub trait ConnectivityWatcher: Send + Sync {
    async fn connectivity_restored(&self);
}

/// Best-effort telemetry sink.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, record: &DiagnosticRecord) -> Result<(), DiagnosticError>;
}
