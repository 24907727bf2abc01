//! Tolerant parsing of opaque remote failures.
//!
//! Remote APIs report failures in several loosely-structured shapes: an HTTP
//! status with a nested `result.error` object, a bare `"timeout"` marker, a
//! realtime-loader error tagged `token_refresh_required`, or nothing at all.
//! [`RawFailure::from_value`] reads whatever is present and turns every lookup
//! that does not match the expected shape into `None`.

use serde_json::{json, Value};

/// Sentinel value used by the transport when a request times out.
pub const TIMEOUT_SENTINEL: &str = "timeout";

/// Nested error code the transport uses for "network unreachable".
pub const NETWORK_ERROR_CODE: i64 = -1;

/// Tag attached to failures that require a token refresh.
pub const TOKEN_REFRESH_REQUIRED: &str = "token_refresh_required";

/// An API failure as reported by a collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum RawFailure {
    /// No failure information at all.
    Absent,
    /// The request timed out before the server answered.
    Timeout,
    /// Structured (or malformed) failure payload.
    Api(ApiFailure),
}

/// Fields read out of a structured failure payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiFailure {
    pub status: Option<u16>,
    pub refresh_required: bool,
    pub error: Option<NestedError>,
    raw: Value,
}

/// The `result.error` object of a failure payload.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedError {
    pub code: Option<i64>,
    pub message: Option<String>,
    /// `reason` of the first entry in `errors`.
    pub reason: Option<String>,
    payload: Value,
}

impl RawFailure {
    /// Parse a JSON failure without ever failing.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => RawFailure::Absent,
            Value::String(marker) if marker == TIMEOUT_SENTINEL => RawFailure::Timeout,
            other => RawFailure::Api(ApiFailure::from_value(other)),
        }
    }

    /// A failure carrying only an HTTP status.
    pub fn from_status(status: u16) -> Self {
        Self::from_value(&json!({ "status": status }))
    }

    /// A failure with an HTTP status and a nested `errors[0].reason`.
    pub fn with_reason(status: u16, reason: &str) -> Self {
        Self::from_value(&json!({
            "status": status,
            "result": { "error": { "code": status, "errors": [{ "reason": reason }] } }
        }))
    }

    /// A failure with an HTTP status and a nested message.
    pub fn with_message(status: u16, message: &str) -> Self {
        Self::from_value(&json!({
            "status": status,
            "result": { "error": { "code": status, "message": message } }
        }))
    }

    /// Failure reported by the realtime loader when the token must be refreshed.
    pub fn refresh_required() -> Self {
        Self::from_value(&json!({ "type": TOKEN_REFRESH_REQUIRED }))
    }

    /// Transport-level "network unreachable" failure.
    pub fn network() -> Self {
        Self::from_value(&json!({
            "result": {
                "error": { "code": NETWORK_ERROR_CODE, "message": "A network error occurred." }
            }
        }))
    }

    /// Failure recorded when the user declines the manual authorization prompt.
    pub fn user_declined() -> Self {
        Self::from_value(&json!({
            "type": "user_declined",
            "result": { "error": { "message": "Authorization was declined." } }
        }))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, RawFailure::Absent)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RawFailure::Timeout)
    }

    fn api(&self) -> Option<&ApiFailure> {
        match self {
            RawFailure::Api(api) => Some(api),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.api().and_then(|api| api.status)
    }

    pub fn is_refresh_required(&self) -> bool {
        self.api().is_some_and(|api| api.refresh_required)
    }

    pub fn nested(&self) -> Option<&NestedError> {
        self.api().and_then(|api| api.error.as_ref())
    }

    pub fn error_code(&self) -> Option<i64> {
        self.nested().and_then(|error| error.code)
    }

    pub fn reason(&self) -> Option<&str> {
        self.nested().and_then(|error| error.reason.as_deref())
    }

    pub fn message(&self) -> Option<&str> {
        self.nested().and_then(|error| error.message.as_deref())
    }

    /// The nested error object as received, for diagnostics.
    pub fn nested_payload(&self) -> Option<&Value> {
        self.nested().map(|error| &error.payload)
    }

    /// JSON form of the failure, for diagnostic dumps.
    pub fn to_value(&self) -> Value {
        match self {
            RawFailure::Absent => Value::Null,
            RawFailure::Timeout => Value::String(TIMEOUT_SENTINEL.to_string()),
            RawFailure::Api(api) => api.raw.clone(),
        }
    }
}

impl From<Value> for RawFailure {
    fn from(value: Value) -> Self {
        Self::from_value(&value)
    }
}

impl From<Option<Value>> for RawFailure {
    fn from(value: Option<Value>) -> Self {
        value.map_or(RawFailure::Absent, |value| Self::from_value(&value))
    }
}

impl ApiFailure {
    fn from_value(value: &Value) -> Self {
        let status = value
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|status| u16::try_from(status).ok());

        let refresh_required = ["type", "kind"].iter().any(|key| {
            value.get(*key).and_then(Value::as_str) == Some(TOKEN_REFRESH_REQUIRED)
        });

        let error = value
            .get("result")
            .and_then(|result| result.get("error"))
            .filter(|error| error.is_object())
            .or_else(|| value.get("error").filter(|error| error.is_object()))
            .map(NestedError::from_value);

        Self {
            status,
            refresh_required,
            error,
            raw: value.clone(),
        }
    }
}

impl NestedError {
    fn from_value(value: &Value) -> Self {
        let code = value.get("code").and_then(Value::as_i64);
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string);
        let reason = value
            .get("errors")
            .and_then(Value::as_array)
            .and_then(|errors| errors.first())
            .and_then(|first| first.get("reason"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            code,
            message,
            reason,
            payload: value.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_absent() {
        assert!(RawFailure::from_value(&Value::Null).is_absent());
        assert!(RawFailure::from(None::<Value>).is_absent());
    }

    #[test]
    fn test_timeout_sentinel() {
        assert!(RawFailure::from_value(&json!("timeout")).is_timeout());
        assert!(!RawFailure::from_value(&json!("timed out")).is_timeout());
    }

    #[test]
    fn test_reads_nested_fields() {
        let failure = RawFailure::from_value(&json!({
            "status": 403,
            "result": {
                "error": {
                    "code": 403,
                    "message": "Forbidden",
                    "errors": [{ "reason": "domainPolicy" }, { "reason": "ignored" }]
                }
            }
        }));

        assert_eq!(failure.status(), Some(403));
        assert_eq!(failure.error_code(), Some(403));
        assert_eq!(failure.message(), Some("Forbidden"));
        assert_eq!(failure.reason(), Some("domainPolicy"));
    }

    #[test]
    fn test_top_level_error_object_is_accepted() {
        let failure = RawFailure::from_value(&json!({
            "error": { "code": -1, "message": "offline" }
        }));
        assert_eq!(failure.error_code(), Some(NETWORK_ERROR_CODE));
        assert_eq!(failure.message(), Some("offline"));
    }

    #[test]
    fn test_malformed_shapes_become_none() {
        let failure = RawFailure::from_value(&json!({
            "status": "403",
            "result": { "error": { "code": "x", "message": 7, "errors": "nope" } }
        }));
        assert_eq!(failure.status(), None);
        assert_eq!(failure.error_code(), None);
        assert_eq!(failure.message(), None);
        assert_eq!(failure.reason(), None);
        assert!(failure.nested_payload().is_some());

        let failure = RawFailure::from_value(&json!({ "result": "broken", "error": "string" }));
        assert!(failure.nested().is_none());

        let failure = RawFailure::from_value(&json!([1, 2, 3]));
        assert_eq!(failure.status(), None);

        let failure = RawFailure::from_value(&json!({ "status": 70000 }));
        assert_eq!(failure.status(), None);
    }

    #[test]
    fn test_refresh_required_tag() {
        assert!(RawFailure::refresh_required().is_refresh_required());
        assert!(RawFailure::from_value(&json!({ "kind": "token_refresh_required" }))
            .is_refresh_required());
        assert!(!RawFailure::from_status(401).is_refresh_required());
    }

    #[test]
    fn test_to_value_preserves_payload() {
        let value = json!({ "status": 500, "extra": true });
        assert_eq!(RawFailure::from_value(&value).to_value(), value);
        assert_eq!(RawFailure::Timeout.to_value(), json!("timeout"));
        assert_eq!(RawFailure::Absent.to_value(), Value::Null);
    }
}
