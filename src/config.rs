//! Configuration module for the range scanner

use crate::utils::port_parser::PortPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default number of addresses processed per chunk invocation
pub const DEFAULT_CHUNK_SIZE: usize = 3;

/// Default upper bound on the number of addresses in one range (a /16)
pub const DEFAULT_MAX_RANGE_ADDRESSES: u64 = 65_536;

/// How the session aggregator reports progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    /// Completed probe pairs over total probe pairs
    Probes,
    /// Processed addresses over total addresses
    Addresses,
}

impl std::str::FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "probes" | "probe" => Ok(ProgressMode::Probes),
            "addresses" | "address" | "hosts" => Ok(ProgressMode::Addresses),
            _ => Err(format!("Unknown progress mode: {}", s)),
        }
    }
}

/// Main configuration structure for scanning operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Number of addresses processed per chunk invocation
    pub chunk_size: usize,

    /// Timeout for each connection attempt in milliseconds
    pub timeout_ms: u64,

    /// Timeout for each reverse DNS lookup in milliseconds
    pub resolve_timeout_ms: u64,

    /// Maximum number of connects and lookups in flight within one chunk
    pub max_concurrency: usize,

    /// What to do with port tokens that are not base-10 integers
    pub port_policy: PortPolicy,

    /// Reject ranges larger than this many addresses
    pub max_range_addresses: Option<u64>,

    /// Perform reverse DNS lookups
    pub resolve_names: bool,

    /// Progress metric reported by the session aggregator
    pub progress_mode: ProgressMode,

    /// Delay between chunk rounds in milliseconds
    pub poll_delay_ms: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout_ms: 1000,
            resolve_timeout_ms: 2000,
            max_concurrency: 64,
            port_policy: PortPolicy::Lenient,
            max_range_addresses: Some(DEFAULT_MAX_RANGE_ADDRESSES),
            resolve_names: true,
            progress_mode: ProgressMode::Probes,
            poll_delay_ms: 40,
        }
    }
}

impl ScanConfig {
    /// Set the number of addresses per chunk
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the connect timeout
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the number of concurrent probes per chunk
    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_port_policy(mut self, port_policy: PortPolicy) -> Self {
        self.port_policy = port_policy;
        self
    }

    pub fn with_max_range(mut self, max_range_addresses: Option<u64>) -> Self {
        self.max_range_addresses = max_range_addresses;
        self
    }

    pub fn with_resolve_names(mut self, resolve_names: bool) -> Self {
        self.resolve_names = resolve_names;
        self
    }

    pub fn with_progress_mode(mut self, progress_mode: ProgressMode) -> Self {
        self.progress_mode = progress_mode;
        self
    }

    pub fn with_poll_delay(mut self, poll_delay_ms: u64) -> Self {
        self.poll_delay_ms = poll_delay_ms;
        self
    }

    /// Get connect timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get reverse lookup timeout as Duration
    pub fn resolve_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    pub fn poll_delay(&self) -> Duration {
        Duration::from_millis(self.poll_delay_ms)
    }

    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| crate::ScanError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: ScanConfig = toml::from_str(&content)
            .map_err(|e| crate::ScanError::ConfigError(format!("Failed to parse TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from ~/.rangescan.toml, falling back to defaults
    pub fn load_default_config() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let config_path = home_dir.join(".rangescan.toml");

        if config_path.exists() {
            match Self::from_toml_file(&config_path) {
                Ok(config) => {
                    log::info!("Loaded config from {}", config_path.display());
                    return config;
                }
                Err(e) => log::warn!("Ignoring {}: {}", config_path.display(), e),
            }
        }

        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.chunk_size == 0 {
            return Err(crate::ScanError::ConfigError("Chunk size must be greater than 0".to_string()));
        }

        if self.max_concurrency == 0 {
            return Err(crate::ScanError::ConfigError("Concurrency must be greater than 0".to_string()));
        }

        if self.timeout_ms == 0 {
            return Err(crate::ScanError::ConfigError("Timeout must be greater than 0".to_string()));
        }

        if self.max_range_addresses == Some(0) {
            return Err(crate::ScanError::ConfigError("Range limit must be greater than 0".to_string()));
        }

        Ok(())
    }
}
