use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Opaque identifier scoping every emitted record to its owner.
    /// Required: an empty tenant is a startup error, not a runtime one.
    #[serde(default)]
    pub tenant_id: String,

    #[serde(default)]
    pub sink: SinkConfig,

    #[serde(default)]
    pub detection: DetectionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            sink: SinkConfig::default(),
            detection: DetectionConfig::default(),
        }
    }
}

/// Event sink (backend API) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Base URL of the backend API.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Upper bound on any single delivery call; expiry counts as a
    /// delivery failure.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Mirror every payload to stdout as a JSON line.
    #[serde(default)]
    pub mirror_stdout: bool,
}

fn default_endpoint() -> String {
    "http://localhost:5000".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            mirror_stdout: false,
        }
    }
}

/// Detection thresholds and window length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Packets per window from one source above which the volume rule fires.
    #[serde(default = "default_dos_threshold")]
    pub dos_threshold: u64,

    /// Distinct TCP destination ports per window from one source above which
    /// the scan rule fires.
    #[serde(default = "default_port_scan_threshold")]
    pub port_scan_threshold: usize,

    /// Evaluation window length in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

fn default_dos_threshold() -> u64 {
    100
}

fn default_port_scan_threshold() -> usize {
    20
}

fn default_window_ms() -> u64 {
    1000
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            dos_threshold: default_dos_threshold(),
            port_scan_threshold: default_port_scan_threshold(),
            window_ms: default_window_ms(),
        }
    }
}

impl DetectionConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load config from default locations or fall back to defaults.
    pub fn load_or_default() -> Result<Self> {
        let paths = [
            PathBuf::from("/etc/netshield/config.toml"),
            dirs_next::config_dir()
                .map(|p| p.join("netshield/config.toml"))
                .unwrap_or_default(),
            PathBuf::from("config.toml"),
        ];

        for path in &paths {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Environment overrides, applied on top of whatever the file provided:
    /// `API_URL` replaces the sink endpoint, `USER_ID` the tenant.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("API_URL") {
            if !endpoint.is_empty() {
                self.sink.endpoint = endpoint;
            }
        }
        if let Ok(tenant) = std::env::var("USER_ID") {
            if !tenant.is_empty() {
                self.tenant_id = tenant;
            }
        }
    }

    /// Startup precondition: the pipeline must not start without a tenant.
    pub fn validate(&self) -> Result<()> {
        if self.tenant_id.trim().is_empty() {
            anyhow::bail!(
                "tenant identifier is not set; provide tenant_id in the config file, \
                 the USER_ID environment variable, or --tenant"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let config = Config::default();
        assert_eq!(config.detection.dos_threshold, 100);
        assert_eq!(config.detection.port_scan_threshold, 20);
        assert_eq!(config.detection.window_ms, 1000);
        assert_eq!(config.detection.window(), Duration::from_secs(1));
        assert_eq!(config.sink.endpoint, "http://localhost:5000");
        assert_eq!(config.sink.timeout_secs, 10);
        assert!(!config.sink.mirror_stdout);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            tenant_id = "tenant-1"

            [detection]
            dos_threshold = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.tenant_id, "tenant-1");
        assert_eq!(config.detection.dos_threshold, 250);
        assert_eq!(config.detection.port_scan_threshold, 20);
        assert_eq!(config.sink.endpoint, "http://localhost:5000");
    }

    #[test]
    fn missing_tenant_fails_validation() {
        let config = Config::default();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.tenant_id = "   ".to_string();
        assert!(config.validate().is_err());

        config.tenant_id = "tenant-1".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = Config::default();
        config.tenant_id = "tenant-1".to_string();
        config.detection.window_ms = 500;
        config.sink.mirror_stdout = true;

        let serialized = toml::to_string_pretty(&config).unwrap();
        let reparsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(reparsed.tenant_id, "tenant-1");
        assert_eq!(reparsed.detection.window_ms, 500);
        assert!(reparsed.sink.mirror_stdout);
    }
}
