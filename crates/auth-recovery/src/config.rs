//! Configuration for the recovery coordinator.

use crate::backoff::DEFAULT_BACKOFF_STEPS_MS;
use crate::error::{RecoveryError, RecoveryResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default timeout raced against every reauthorization call.
pub const DEFAULT_AUTH_TIMEOUT_MS: u64 = 10_000;

pub const ENV_AUTH_TIMEOUT_MS: &str = "AUTH_RECOVERY_TIMEOUT_MS";
pub const ENV_BACKOFF_MS: &str = "AUTH_RECOVERY_BACKOFF_MS";
pub const ENV_MAX_AUTO_ATTEMPTS: &str = "AUTH_RECOVERY_MAX_AUTO_ATTEMPTS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Timeout for a single reauthorization call.
    pub auth_timeout_ms: u64,
    /// Ordered backoff delays; the last entry is the cap.
    pub backoff_steps_ms: Vec<u64>,
    /// Automatic attempts allowed before escalating to the manual prompt.
    /// `None` retries forever at the capped delay.
    pub max_auto_attempts: Option<u32>,
    /// Arm the connectivity watcher from the coordinator on network failures.
    pub connectivity_self_arm: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            auth_timeout_ms: DEFAULT_AUTH_TIMEOUT_MS,
            backoff_steps_ms: DEFAULT_BACKOFF_STEPS_MS.to_vec(),
            max_auto_attempts: None,
            connectivity_self_arm: true,
        }
    }
}

impl RecoveryConfig {
    /// Defaults overridden from the process environment.
    pub fn from_env() -> RecoveryResult<Self> {
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load_from_file(path: &Path) -> RecoveryResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RecoveryConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup. Blank values are ignored.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> RecoveryResult<()> {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(raw) = read(ENV_AUTH_TIMEOUT_MS) {
            self.auth_timeout_ms = raw.parse().map_err(|_| {
                RecoveryError::Config(format!(
                    "{} must be milliseconds, got {:?}",
                    ENV_AUTH_TIMEOUT_MS, raw
                ))
            })?;
        }

        if let Some(raw) = read(ENV_BACKOFF_MS) {
            self.backoff_steps_ms = parse_steps(&raw)?;
        }

        if let Some(raw) = read(ENV_MAX_AUTO_ATTEMPTS) {
            self.max_auto_attempts = Some(raw.parse().map_err(|_| {
                RecoveryError::Config(format!(
                    "{} must be a positive integer, got {:?}",
                    ENV_MAX_AUTO_ATTEMPTS, raw
                ))
            })?);
        }

        Ok(())
    }

    pub fn validate(&self) -> RecoveryResult<()> {
        if self.auth_timeout_ms == 0 {
            return Err(RecoveryError::Config(
                "auth_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if self.backoff_steps_ms.is_empty() {
            return Err(RecoveryError::Config(
                "backoff_steps_ms must not be empty".to_string(),
            ));
        }

        if self
            .backoff_steps_ms
            .windows(2)
            .any(|pair| pair[1] < pair[0])
        {
            return Err(RecoveryError::Config(format!(
                "backoff_steps_ms must be non-decreasing, got {:?}",
                self.backoff_steps_ms
            )));
        }

        if self.max_auto_attempts == Some(0) {
            return Err(RecoveryError::Config(
                "max_auto_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }

    pub fn backoff_steps(&self) -> Vec<Duration> {
        self.backoff_steps_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
            .collect()
    }
}

/// Parse a comma-separated list of millisecond delays.
pub fn parse_steps(raw: &str) -> RecoveryResult<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>().map_err(|_| {
                RecoveryError::Config(format!("invalid backoff delay {:?}", part))
            })
        })
        .collect()
}
