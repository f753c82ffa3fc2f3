//! Configuration file handling for mbe

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DEVICE: &str = "vcan0";
pub const DEFAULT_TIMEOUT_MS: u64 = 250;
pub const DEFAULT_DELAY_MS: u64 = 50;
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// Settings read from a TOML file
///
/// ```toml
/// device = "can0"
/// timeout_ms = 500
/// params = "/etc/mbe/params.yaml"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// CAN interface name
    pub device: Option<String>,
    /// Send/receive deadline per call
    pub timeout_ms: Option<u64>,
    /// Pause before each request
    pub delay_ms: Option<u64>,
    /// Time between scan cycles
    pub interval_ms: Option<u64>,
    /// Parameter list for `scan`
    pub params: Option<PathBuf>,
}

/// Values given on the command line; these win over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub device: Option<String>,
    pub timeout_ms: Option<u64>,
    pub delay_ms: Option<u64>,
    pub interval_ms: Option<u64>,
    pub params: Option<PathBuf>,
}

impl Config {
    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(&self, args: Overrides) -> MergedConfig {
        MergedConfig {
            device: args
                .device
                .or_else(|| self.device.clone())
                .unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            timeout: Duration::from_millis(
                args.timeout_ms
                    .or(self.timeout_ms)
                    .unwrap_or(DEFAULT_TIMEOUT_MS),
            ),
            request_delay: Duration::from_millis(
                args.delay_ms.or(self.delay_ms).unwrap_or(DEFAULT_DELAY_MS),
            ),
            interval: Duration::from_millis(
                args.interval_ms
                    .or(self.interval_ms)
                    .unwrap_or(DEFAULT_INTERVAL_MS),
            ),
            params: args.params.or_else(|| self.params.clone()),
        }
    }
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone, PartialEq)]
pub struct MergedConfig {
    pub device: String,
    pub timeout: Duration,
    pub request_delay: Duration,
    pub interval: Duration,
    pub params: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let merged = Config::default().merge_with_args(Overrides::default());
        assert_eq!(merged.device, "vcan0");
        assert_eq!(merged.timeout, Duration::from_millis(250));
        assert_eq!(merged.request_delay, Duration::from_millis(50));
        assert_eq!(merged.interval, Duration::from_secs(1));
        assert_eq!(merged.params, None);
    }

    #[test]
    fn test_args_override_file() {
        let file = Config {
            device: Some("can1".to_string()),
            timeout_ms: Some(500),
            params: Some(PathBuf::from("file.yaml")),
            ..Default::default()
        };
        let merged = file.merge_with_args(Overrides {
            device: Some("can0".to_string()),
            delay_ms: Some(10),
            ..Default::default()
        });

        assert_eq!(merged.device, "can0");
        assert_eq!(merged.timeout, Duration::from_millis(500));
        assert_eq!(merged.request_delay, Duration::from_millis(10));
        assert_eq!(merged.params, Some(PathBuf::from("file.yaml")));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "device = \"can2\"\ninterval_ms = 200").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.device.as_deref(), Some("can2"));
        assert_eq!(config.interval_ms, Some(200));
        assert_eq!(config.timeout_ms, None);
    }

    #[test]
    fn test_load_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "devcie = \"can2\"").unwrap();
        assert!(Config::load_from(file.path()).is_err());
    }
}
