//! AlarmSrv Configuration
//!
//! Layered configuration: compiled defaults, then an optional YAML file, then
//! `ALARMSRV_*` environment variables.

use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Alarm service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AlarmConfig {
    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Backing store configuration
    #[serde(default)]
    pub backend: BackendConfig,
    /// Reconciliation configuration
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Statistics configuration
    #[serde(default)]
    pub stats: StatsConfig,
    /// Escalation sweep configuration
    #[serde(default)]
    pub escalation: EscalationConfig,
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Listen address
    pub host: String,
    /// Listen port
    pub port: u16,
}

impl ApiConfig {
    /// Build a path with API prefix
    pub fn build_path(&self, path: &str) -> String {
        format!("/api/v1/{}", path.trim_start_matches('/'))
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8083,
        }
    }
}

/// Backing store selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// In-process store, no external dependencies
    Memory,
    /// Redis-backed store
    Redis,
}

/// Backing store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Which backing store to use
    pub mode: BackendMode,
    /// Redis connection URL (redis mode only)
    pub redis_url: String,
    /// Key prefix for all alarm keys
    pub key_prefix: String,
    /// Pub/sub channel carrying occurrence updates
    pub events_channel: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "gridmon:alarms".to_string(),
            events_channel: "gridmon:alarms:events".to_string(),
        }
    }
}

/// Reconciliation loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Poll interval in seconds
    pub interval_secs: u64,
    /// Whether to also subscribe to pushed occurrence updates
    pub push_enabled: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            push_enabled: false,
        }
    }
}

/// Statistics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Recency window for the "recent" count, in seconds
    pub recent_window_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            recent_window_secs: 300,
        }
    }
}

/// Escalation sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Enable the escalation sweep
    pub enabled: bool,
    /// Sweep interval in seconds
    pub interval_secs: u64,
    /// Age in minutes after which an unacknowledged occurrence escalates
    pub after_minutes: u32,
    /// Maximum escalation level
    pub max_level: u32,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 60,
            after_minutes: 15,
            max_level: 3,
        }
    }
}

impl AlarmConfig {
    /// Load configuration from defaults, YAML file, and environment
    pub fn load() -> Result<Self> {
        let config_paths = [
            "config/alarmsrv/alarmsrv.yaml",
            "config/alarmsrv.yaml",
            "alarmsrv.yaml",
        ];

        let mut figment = Figment::from(Serialized::defaults(AlarmConfig::default()));
        for path in &config_paths {
            if Path::new(path).exists() {
                figment = figment.merge(Yaml::file(path));
                break;
            }
        }

        let config = figment
            .merge(Env::prefixed("ALARMSRV_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// Generate default configuration file contents
    pub fn generate_default_config() -> String {
        serde_yaml::to_string(&Self::default())
            .unwrap_or_else(|_| "# Failed to generate config file".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AlarmConfig::default();
        assert_eq!(config.api.host, "0.0.0.0");
        assert_eq!(config.api.port, 8083);
        assert_eq!(config.backend.mode, BackendMode::Memory);
        assert!(config.backend.redis_url.contains("redis://"));
        assert_eq!(config.reconcile.interval_secs, 10);
        assert_eq!(config.stats.recent_window_secs, 300);
        assert!(!config.escalation.enabled);
    }

    #[test]
    fn test_build_path() {
        let api = ApiConfig::default();
        assert_eq!(api.build_path("templates"), "/api/v1/templates");
        assert_eq!(api.build_path("/occurrences"), "/api/v1/occurrences");
    }

    #[test]
    fn test_generate_default_config() {
        let yaml = AlarmConfig::generate_default_config();
        assert!(yaml.contains("api"));
        assert!(yaml.contains("backend"));
        assert!(yaml.contains("reconcile"));
    }
}
