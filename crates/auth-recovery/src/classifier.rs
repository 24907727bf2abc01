//! Failure classification.
//!
//! Maps a [`RawFailure`] to the remediation policy the coordinator applies.
//! First match wins:
//!
//! | Failure                                   | Kind            |
//! |-------------------------------------------|-----------------|
//! | absent                                    | `ManualRefresh` |
//! | `token_refresh_required` tag, 401         | `AutoRefresh`   |
//! | 403 with a forbidden-for-good reason      | `Fatal`         |
//! | any other 403                             | `AutoRefresh`   |
//! | 404                                       | `Fatal`         |
//! | `"timeout"`                               | `NetworkError`  |
//! | nested code -1                            | `NetworkError`  |
//! | 400                                       | `Fatal`         |
//! | 500                                       | `ServerError`   |
//! | anything else                             | `Fatal`         |

use crate::collaborators::DiagnosticSink;
use crate::describe::{describe_known, FALLBACK_MESSAGE};
use crate::diagnostics::{emit, DiagnosticRecord, CAPTURE_CLASSIFY, CAPTURE_DESCRIBE};
use crate::failure::{RawFailure, NETWORK_ERROR_CODE};
use crate::status::StatusBoard;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// 403 reasons that no amount of reauthorization will fix.
pub const FATAL_FORBIDDEN_REASONS: [&str; 3] = [
    "domainPolicy",
    "insufficientFilePermissions",
    "cannotDownloadAbusiveFile",
];

/// Remediation policy for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Fatal,
    AutoRefresh,
    ManualRefresh,
    NetworkError,
    ServerError,
}

impl ErrorKind {
    /// Returns true if the failure can be recovered through the auth gate.
    pub fn is_recoverable(self) -> bool {
        !matches!(self, ErrorKind::Fatal)
    }
}

/// Pure decision table. Never fails, never performs I/O.
pub fn classify_failure(failure: &RawFailure) -> ErrorKind {
    if failure.is_absent() {
        return ErrorKind::ManualRefresh;
    }

    let status = failure.status();

    if failure.is_refresh_required() || status == Some(401) {
        return ErrorKind::AutoRefresh;
    }

    if status == Some(403) {
        return match failure.reason() {
            Some(reason) if FATAL_FORBIDDEN_REASONS.contains(&reason) => ErrorKind::Fatal,
            _ => ErrorKind::AutoRefresh,
        };
    }

    if status == Some(404) {
        return ErrorKind::Fatal;
    }

    if failure.is_timeout() || failure.error_code() == Some(NETWORK_ERROR_CODE) {
        return ErrorKind::NetworkError;
    }

    match status {
        Some(400) => ErrorKind::Fatal,
        Some(500) => ErrorKind::ServerError,
        _ => ErrorKind::Fatal,
    }
}

/// Classifier that also reports failures to telemetry.
#[derive(Clone)]
pub struct ErrorClassifier {
    diagnostics: Arc<dyn DiagnosticSink>,
    status: StatusBoard,
}

impl ErrorClassifier {
    pub fn new(diagnostics: Arc<dyn DiagnosticSink>, status: StatusBoard) -> Self {
        Self {
            diagnostics,
            status,
        }
    }

    /// Classify a failure. Failures with a status above 200 are reported to the
    /// diagnostic sink first; sink errors never affect the result.
    pub fn classify(&self, failure: &RawFailure) -> ErrorKind {
        let kind = classify_failure(failure);

        if failure.status().is_some_and(|status| status > 200) {
            let record =
                DiagnosticRecord::capture(CAPTURE_CLASSIFY, failure, self.status.snapshot());
            emit(self.diagnostics.as_ref(), &record);
        }

        debug!(
            kind = ?kind,
            status = ?failure.status(),
            reason = ?failure.reason(),
            "Classified remote failure"
        );
        kind
    }

    /// Human-readable message. Undescribable failures are dumped to telemetry.
    pub fn describe(&self, failure: &RawFailure) -> String {
        if let Some(message) = describe_known(failure) {
            return message;
        }

        warn!(failure = %failure.to_value(), "Failure carries no readable message");
        let record = DiagnosticRecord::capture(CAPTURE_DESCRIBE, failure, self.status.snapshot());
        emit(self.diagnostics.as_ref(), &record);
        FALLBACK_MESSAGE.to_string()
    }
}
