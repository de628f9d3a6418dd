use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

const MIN_INTERVAL_MS: u64 = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sampling: SamplingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub process_interval_ms: u64,
    pub system_interval_ms: u64,
    pub rate_interval_ms: u64,
    pub error_backoff_ms: u64,
    pub stale_factor: u32,
    pub disk_mount: String,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        SamplingConfig {
            process_interval_ms: 1500,
            system_interval_ms: 1500,
            rate_interval_ms: 1000,
            error_backoff_ms: 5000,
            stale_factor: 3,
            disk_mount: "/".to_string(),
        }
    }
}

impl SamplingConfig {
    pub fn process_interval(&self) -> Duration {
        clamped(self.process_interval_ms)
    }

    pub fn system_interval(&self) -> Duration {
        clamped(self.system_interval_ms)
    }

    pub fn rate_interval(&self) -> Duration {
        clamped(self.rate_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        clamped(self.error_backoff_ms)
    }
}

fn clamped(ms: u64) -> Duration {
    Duration::from_millis(ms.max(MIN_INTERVAL_MS))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("taskpulse").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
        Err(_) => Config::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.sampling.process_interval_ms, 1500);
        assert_eq!(config.sampling.rate_interval_ms, 1000);
        assert_eq!(config.sampling.error_backoff_ms, 5000);
        assert_eq!(config.sampling.stale_factor, 3);
        assert_eq!(config.sampling.disk_mount, "/");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn parse_partial_toml() {
        let toml_str = r#"
[sampling]
process_interval_ms = 500
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.sampling.process_interval_ms, 500);
        // Other fields should be defaults
        assert_eq!(config.sampling.system_interval_ms, 1500);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
[sampling]
process_interval_ms = 2000
system_interval_ms = 1000
rate_interval_ms = 1000
error_backoff_ms = 3000
stale_factor = 4
disk_mount = "/home"

[logging]
level = "debug"
format = "json"
file = "/tmp/taskpulse.log"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.sampling.process_interval(), Duration::from_secs(2));
        assert_eq!(config.sampling.error_backoff(), Duration::from_secs(3));
        assert_eq!(config.sampling.stale_factor, 4);
        assert_eq!(config.sampling.disk_mount, "/home");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.logging.file.as_deref(),
            Some(Path::new("/tmp/taskpulse.log"))
        );
    }

    #[test]
    fn tiny_intervals_are_clamped() {
        let sampling = SamplingConfig {
            rate_interval_ms: 0,
            ..SamplingConfig::default()
        };
        assert_eq!(sampling.rate_interval(), Duration::from_millis(MIN_INTERVAL_MS));
    }

    #[test]
    fn missing_file_returns_default() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.toml"));
        assert_eq!(config.sampling.process_interval_ms, 1500);
    }

    #[test]
    fn invalid_toml_returns_default() {
        let temp = std::env::temp_dir().join("taskpulse_test_invalid.toml");
        std::fs::write(&temp, "this is not valid toml {{{{").unwrap();
        let config = load_config_from_path(&temp);
        assert_eq!(config.sampling.process_interval_ms, 1500);
        let _ = std::fs::remove_file(&temp);
    }
}
