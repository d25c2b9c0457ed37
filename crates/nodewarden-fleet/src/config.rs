//! Sync configuration
//!
//! Read through the `EnvSource` trait so tests never touch process
//! environment.

use nodewarden_common::{Error, Result, DEFAULT_FIELD_MANAGER, DEFAULT_GRACE_PERIOD_SECONDS};

/// Environment variable for the node enrichment fan-out
pub const ENV_ENRICH_CONCURRENCY: &str = "NODEWARDEN_ENRICH_CONCURRENCY";
/// Environment variable for the pod eviction fan-out
pub const ENV_EVICTION_CONCURRENCY: &str = "NODEWARDEN_EVICTION_CONCURRENCY";
/// Environment variable for the patch field manager
pub const ENV_FIELD_MANAGER: &str = "NODEWARDEN_FIELD_MANAGER";
/// Environment variable for the default eviction grace period
pub const ENV_GRACE_PERIOD: &str = "NODEWARDEN_GRACE_PERIOD_SECONDS";

/// Default number of nodes enriched concurrently
pub const DEFAULT_ENRICH_CONCURRENCY: usize = 8;
/// Default number of pods evicted concurrently
pub const DEFAULT_EVICTION_CONCURRENCY: usize = 4;

/// Trait for reading configuration from the environment
#[cfg_attr(test, mockall::automock)]
pub trait EnvSource: Send + Sync {
    /// Get a variable, `None` when unset
    fn var(&self, key: &str) -> Option<String>;
}

/// Default implementation that reads process environment variables
#[derive(Clone, Default)]
pub struct OsEnv;

impl EnvSource for OsEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Tuning knobs for reconciliation and lifecycle operations
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Maximum nodes enriched at once during reconciliation
    pub enrich_concurrency: usize,
    /// Maximum pods evicted at once during a drain
    pub eviction_concurrency: usize,
    /// Field manager recorded on schedulability patches
    pub field_manager: String,
    /// Grace period used when a drain does not specify one
    pub default_grace_period_seconds: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enrich_concurrency: DEFAULT_ENRICH_CONCURRENCY,
            eviction_concurrency: DEFAULT_EVICTION_CONCURRENCY,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            default_grace_period_seconds: DEFAULT_GRACE_PERIOD_SECONDS,
        }
    }
}

impl SyncConfig {
    /// Load from the environment, falling back to defaults for unset keys
    ///
    /// A set but invalid value is an error rather than silently defaulted.
    pub fn from_env(env: &dyn EnvSource) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            enrich_concurrency: parse_concurrency(env, ENV_ENRICH_CONCURRENCY)?
                .unwrap_or(defaults.enrich_concurrency),
            eviction_concurrency: parse_concurrency(env, ENV_EVICTION_CONCURRENCY)?
                .unwrap_or(defaults.eviction_concurrency),
            field_manager: match env.var(ENV_FIELD_MANAGER) {
                Some(v) if v.trim().is_empty() => {
                    return Err(Error::config(ENV_FIELD_MANAGER, "must not be empty"))
                }
                Some(v) => v.trim().to_string(),
                None => defaults.field_manager,
            },
            default_grace_period_seconds: match env.var(ENV_GRACE_PERIOD) {
                Some(v) => v.trim().parse::<u32>().map_err(|e| {
                    Error::config(ENV_GRACE_PERIOD, format!("invalid value {:?}: {}", v, e))
                })?,
                None => defaults.default_grace_period_seconds,
            },
        })
    }

    /// Override the enrichment fan-out; zero is rejected
    pub fn with_enrich_concurrency(mut self, n: usize) -> Result<Self> {
        if n == 0 {
            return Err(Error::config("enrich_concurrency", "must be at least 1"));
        }
        self.enrich_concurrency = n;
        Ok(self)
    }

    /// Override the eviction fan-out; zero is rejected
    pub fn with_eviction_concurrency(mut self, n: usize) -> Result<Self> {
        if n == 0 {
            return Err(Error::config("eviction_concurrency", "must be at least 1"));
        }
        self.eviction_concurrency = n;
        Ok(self)
    }
}

fn parse_concurrency(env: &dyn EnvSource, key: &str) -> Result<Option<usize>> {
    let Some(raw) = env.var(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(Error::config(key, "must be at least 1")),
        Ok(n) => Ok(Some(n)),
        Err(e) => Err(Error::config(key, format!("invalid value {:?}: {}", raw, e))),
    }
}
