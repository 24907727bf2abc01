//! Diagnostic records for remote failures.

use crate::collaborators::DiagnosticSink;
use crate::error::DiagnosticError;
use crate::failure::RawFailure;
use crate::status::Status;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

/// Capture point used when classifying a failure.
pub const CAPTURE_CLASSIFY: &str = "classify";

/// Capture point used when a failure could not be described.
pub const CAPTURE_DESCRIBE: &str = "describe";

/// Snapshot of a remote failure sent to telemetry.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticRecord {
    pub record_id: Uuid,
    pub captured_at: DateTime<Utc>,
    pub capture_point: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    pub status: Status,
}

impl DiagnosticRecord {
    pub fn capture(capture_point: &'static str, failure: &RawFailure, status: Status) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            captured_at: Utc::now(),
            capture_point,
            status_code: failure.status(),
            error: failure
                .nested_payload()
                .cloned()
                .or_else(|| Some(failure.to_value()).filter(|value| !value.is_null())),
            status,
        }
    }
}

/// Default sink: writes every record as a structured log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn report(&self, record: &DiagnosticRecord) -> Result<(), DiagnosticError> {
        let payload = serde_json::to_string(record)?;
        warn!(
            record_id = %record.record_id,
            capture_point = record.capture_point,
            status_code = ?record.status_code,
            payload = %payload,
            "Remote failure diagnostic"
        );
        Ok(())
    }
}

/// Report a record, swallowing sink failures.
pub(crate) fn emit(sink: &dyn DiagnosticSink, record: &DiagnosticRecord) {
    if let Err(error) = sink.report(record) {
        warn!(
            capture_point = record.capture_point,
            error = %error,
            "Diagnostic report failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct BrokenSink;

    impl DiagnosticSink for BrokenSink {
        fn report(&self, _record: &DiagnosticRecord) -> Result<(), DiagnosticError> {
            Err(DiagnosticError::Unavailable("offline".to_string()))
        }
    }

    #[test]
    fn test_capture_prefers_nested_error() {
        let failure = RawFailure::with_message(500, "Backend Error");
        let record = DiagnosticRecord::capture(CAPTURE_CLASSIFY, &failure, Status::default());

        assert_eq!(record.status_code, Some(500));
        assert_eq!(
            record.error,
            Some(json!({ "code": 500, "message": "Backend Error" }))
        );
    }

    #[test]
    fn test_capture_falls_back_to_whole_payload() {
        let failure = RawFailure::from_status(502);
        let record = DiagnosticRecord::capture(CAPTURE_CLASSIFY, &failure, Status::default());
        assert_eq!(record.error, Some(json!({ "status": 502 })));

        let record =
            DiagnosticRecord::capture(CAPTURE_DESCRIBE, &RawFailure::Absent, Status::default());
        assert!(record.error.is_none());
    }

    #[test]
    fn test_record_serializes_snapshot() {
        let record = DiagnosticRecord::capture(
            CAPTURE_CLASSIFY,
            &RawFailure::from_status(404),
            Status::default(),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["capture_point"], "classify");
        assert_eq!(json["status_code"], 404);
        assert_eq!(json["status"]["authorization"], "authenticated");
    }

    #[test]
    fn test_emit_swallows_sink_errors() {
        let record =
            DiagnosticRecord::capture(CAPTURE_CLASSIFY, &RawFailure::Timeout, Status::default());
        emit(&BrokenSink, &record);
        emit(&TracingDiagnostics, &record);
    }
}
