//! Runtime configuration
//!
//! Loaded from TOML or JSON, then overlaid with `ACCORD_*` environment
//! variables, then validated.

use crate::errors::{MembershipError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Orchestration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Upper bound on waiting for a uniqueness-oracle verdict
    pub oracle_timeout_ms: u64,
    /// Local write attempts for a version the oracle already accepted
    pub persist_attempts: u32,
    /// Fixed pause between local write attempts
    pub persist_backoff_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            oracle_timeout_ms: 30_000,
            persist_attempts: 3,
            persist_backoff_ms: 50,
        }
    }
}

impl OrchestratorConfig {
    /// Oracle verdict bound as a `Duration`.
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }

    /// Pause between local write attempts as a `Duration`.
    pub fn persist_backoff(&self) -> Duration {
        Duration::from_millis(self.persist_backoff_ms)
    }
}

/// Membership cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Interval of the background full refresh
    pub refresh_interval_ms: u64,
    /// Expiry applied to a freshly loaded listing
    pub entry_ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 300_000,
            entry_ttl_ms: 600_000,
        }
    }
}

impl CacheConfig {
    /// Background refresh interval as a `Duration`.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Listing expiry as a `Duration`.
    pub fn entry_ttl(&self) -> Duration {
        Duration::from_millis(self.entry_ttl_ms)
    }
}

/// Reconciliation retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Attempts against one peer before giving up on it
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub retry_backoff_ms: u64,
    /// Per-request bound
    pub request_timeout_ms: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 500,
            request_timeout_ms: 10_000,
        }
    }
}

impl ReconcileConfig {
    /// Pause between attempts as a `Duration`.
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Per-request bound as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Top-level node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccordConfig {
    /// Authority orchestration
    pub orchestrator: OrchestratorConfig,
    /// Membership cache
    pub cache: CacheConfig,
    /// Reconciliation retry policy
    pub reconcile: ReconcileConfig,
}

impl AccordConfig {
    /// Load configuration from a `.toml` or `.json` file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MembershipError::config(format!("Failed to read config file: {e}")))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)
                .map_err(|e| MembershipError::config(format!("Invalid TOML: {e}"))),
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| MembershipError::config(format!("Invalid JSON: {e}"))),
            _ => Err(MembershipError::config("Unsupported file format")),
        }
    }

    /// Overlay values from `ACCORD_*` environment variables.
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }

    /// Overlay values from an explicit variable list.
    pub fn merge_with_vars(
        &mut self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<()> {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix("ACCORD_") else {
                continue;
            };
            match name {
                "ORACLE_TIMEOUT_MS" => {
                    self.orchestrator.oracle_timeout_ms = parse_var(&key, &value)?;
                }
                "PERSIST_ATTEMPTS" => {
                    self.orchestrator.persist_attempts = parse_var(&key, &value)?;
                }
                "PERSIST_BACKOFF_MS" => {
                    self.orchestrator.persist_backoff_ms = parse_var(&key, &value)?;
                }
                "CACHE_REFRESH_INTERVAL_MS" => {
                    self.cache.refresh_interval_ms = parse_var(&key, &value)?;
                }
                "CACHE_ENTRY_TTL_MS" => self.cache.entry_ttl_ms = parse_var(&key, &value)?,
                "RECONCILE_MAX_ATTEMPTS" => {
                    self.reconcile.max_attempts = parse_var(&key, &value)?;
                }
                "RECONCILE_RETRY_BACKOFF_MS" => {
                    self.reconcile.retry_backoff_ms = parse_var(&key, &value)?;
                }
                "RECONCILE_REQUEST_TIMEOUT_MS" => {
                    self.reconcile.request_timeout_ms = parse_var(&key, &value)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Reject settings that would make a bounded wait unbounded or a retry loop empty.
    pub fn validate(&self) -> Result<()> {
        if self.orchestrator.oracle_timeout_ms == 0 {
            return Err(MembershipError::config("oracle_timeout_ms cannot be 0"));
        }
        if self.orchestrator.persist_attempts == 0 {
            return Err(MembershipError::config("persist_attempts cannot be 0"));
        }
        if self.cache.refresh_interval_ms == 0 {
            return Err(MembershipError::config("refresh_interval_ms cannot be 0"));
        }
        if self.cache.entry_ttl_ms == 0 {
            return Err(MembershipError::config("entry_ttl_ms cannot be 0"));
        }
        if self.reconcile.max_attempts == 0 {
            return Err(MembershipError::config("max_attempts cannot be 0"));
        }
        if self.reconcile.request_timeout_ms == 0 {
            return Err(MembershipError::config("request_timeout_ms cannot be 0"));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| MembershipError::config(format!("Invalid value for {key}: {value}")))
}
