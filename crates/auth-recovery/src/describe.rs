//! User-facing failure messages.

use crate::failure::RawFailure;
use tracing::warn;

pub const ABSENT_MESSAGE: &str = "Error.";

pub const INSUFFICIENT_PERMISSIONS_MESSAGE: &str =
    "You do not have permission to access this file. Ask the owner to share it with you.";

pub const DOMAIN_POLICY_MESSAGE: &str =
    "Your domain administrator does not allow this application to access your files.";

pub const FALLBACK_MESSAGE: &str = "An unknown error occurred.";

/// Message for failures that carry enough information to be described.
pub fn describe_known(failure: &RawFailure) -> Option<String> {
    if failure.is_absent() {
        return Some(ABSENT_MESSAGE.to_string());
    }

    match failure.reason() {
        Some("insufficientFilePermissions") => {
            return Some(INSUFFICIENT_PERMISSIONS_MESSAGE.to_string())
        }
        Some("domainPolicy") => return Some(DOMAIN_POLICY_MESSAGE.to_string()),
        _ => {}
    }

    failure.message().map(str::to_string)
}

/// Message for any failure. Falls back to a generic sentence and logs the
/// payload when nothing readable is present.
pub fn describe(failure: &RawFailure) -> String {
    describe_known(failure).unwrap_or_else(|| {
        warn!(failure = %failure.to_value(), "Failure carries no readable message");
        FALLBACK_MESSAGE.to_string()
    })
}
