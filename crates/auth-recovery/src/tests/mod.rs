//! Scenario tests for the recovery coordinator.
//!
//! - `harness.rs`      - Recording presenter/diagnostics, scripted authorizer, manual connectivity
//! - `end_to_end.rs`   - 401 recovered through a scheduled automatic reauthorization
//! - `convergence.rs`  - Concurrent callers share one recovery attempt
//! - `manual.rs`       - Permission prompt accepted, declined, timed out
//! - `network.rs`      - Connectivity loss and restoration
//! - `fatal.rs`        - Unrecoverable failures surface to the caller
//! - `escalation.rs`   - Failed or hung automatic reauthorization
//! - `server_error.rs` - Backoff retries for server errors

mod manual;
