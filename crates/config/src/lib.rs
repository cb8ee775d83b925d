#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Engine configuration: cache layout, throttle defaults and network
//! retry/timeout policy, loaded from an optional TOML file with
//! field-by-field defaults so a missing or partial file is always valid.

use std::path::{Path, PathBuf};

use ceu_errors::Error;
use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub throttle: ThrottleConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            network: NetworkConfig::default(),
            throttle: ThrottleConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, falling back to defaults for any
    /// field the file omits.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails to parse.
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::internal(format!("reading config {}: {e}", path.display())))?;
        toml::from_str(&contents)
            .map_err(|e| Error::internal(format!("parsing config {}: {e}", path.display())))
    }
}

/// Cache directory layout; artifacts are keyed by `(id, fingerprint)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_crx_cache_path")]
    pub crx_cache_path: PathBuf,
    /// Safety margin subtracted from the declared package size before the
    /// disk-space gate compares against available space.
    #[serde(default = "default_disk_space_margin_bytes")]
    pub disk_space_margin_bytes: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            crx_cache_path: default_crx_cache_path(),
            disk_space_margin_bytes: default_disk_space_margin_bytes(),
        }
    }
}

fn default_crx_cache_path() -> PathBuf {
    PathBuf::from("/var/cache/ceu/crx")
}

fn default_disk_space_margin_bytes() -> i64 {
    0
}

/// Network retry/timeout policy consumed by the default `ceu-net`
/// collaborator implementations; the core engine itself never blocks on I/O.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_retries() -> u32 {
    3
}

/// Defaults applied when a check response omits `retry_after_sec` or reports
/// zero (the throttle is then cleared rather than extended).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    #[serde(default = "default_min_check_interval_secs")]
    pub min_check_interval_secs: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_check_interval_secs: default_min_check_interval_secs(),
        }
    }
}

fn default_min_check_interval_secs() -> u64 {
    0
}
