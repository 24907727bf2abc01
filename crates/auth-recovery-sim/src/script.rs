//! Parsing of `--script` and `--auth` outcome lists.

use anyhow::{anyhow, bail, Context, Result};
use auth_recovery::RawFailure;

/// Outcome of one simulated API call.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Ok,
    Fail(RawFailure),
}

/// Outcome of one automatic reauthorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Grant,
    Fail,
    Hang,
}

/// Parse a comma-separated call script.
///
/// Tokens: `ok`, `null`, `timeout`, `network`, `refresh-required`, an HTTP
/// status such as `401`, or `<status>:<reason>` such as `403:domainPolicy`.
pub fn parse_script(raw: &str) -> Result<Vec<CallOutcome>> {
    tokens(raw).map(parse_call).collect()
}

pub fn parse_auth(raw: &str) -> Result<Vec<AuthOutcome>> {
    tokens(raw)
        .map(|token| match token {
            "ok" => Ok(AuthOutcome::Grant),
            "fail" => Ok(AuthOutcome::Fail),
            "hang" => Ok(AuthOutcome::Hang),
            other => Err(anyhow!("unknown auth outcome {:?}", other)),
        })
        .collect()
}

fn tokens(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|token| !token.is_empty())
}

fn parse_call(token: &str) -> Result<CallOutcome> {
    let failure = match token {
        "ok" => return Ok(CallOutcome::Ok),
        "null" => RawFailure::Absent,
        "timeout" => RawFailure::Timeout,
        "network" => RawFailure::network(),
        "refresh-required" => RawFailure::refresh_required(),
        other => match other.split_once(':') {
            Some((status, reason)) => {
                if reason.is_empty() {
                    bail!("missing reason in {:?}", other);
                }
                RawFailure::with_reason(parse_status(status)?, reason)
            }
            None => RawFailure::from_status(parse_status(other)?),
        },
    };
    Ok(CallOutcome::Fail(failure))
}

fn parse_status(raw: &str) -> Result<u16> {
    raw.parse()
        .with_context(|| format!("unknown call outcome {:?}", raw))
}
