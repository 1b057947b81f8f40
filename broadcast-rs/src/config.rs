use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Optional tier catalog file; built-in defaults are used when absent.
    pub tiers_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub database_url: String,
}

/// Tunables for the batch execution engine
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Destinations dispatched together per batch
    pub batch_size: usize,
    /// Throttling pause between consecutive batches
    pub inter_batch_delay_ms: u64,
    /// Emit a progress notification every N percent
    pub progress_threshold_percent: u8,
    /// How long terminal operations stay queryable in the live index
    pub retention_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::EngineError::Config(e.to_string()))?;

        toml::from_str(&content).map_err(|e| crate::error::EngineError::Config(e.to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                listen_addr: "0.0.0.0:8080".to_string(),
                tiers_path: None,
            },
            storage: StorageConfig {
                database_url: "sqlite://broadcast.db?mode=rwc".to_string(),
            },
            engine: EngineConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            inter_batch_delay_ms: 1000,
            progress_threshold_percent: 25,
            retention_ms: 3_600_000, // 1 hour
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.engine.batch_size, 5);
        assert_eq!(config.engine.inter_batch_delay_ms, 1000);
        assert_eq!(config.engine.progress_threshold_percent, 25);
        assert_eq!(config.engine.retention_ms, 3_600_000);
    }

    #[test]
    fn test_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
listen_addr = "127.0.0.1:9090"

[storage]
database_url = "sqlite::memory:"

[engine]
batch_size = 3
inter_batch_delay_ms = 50
progress_threshold_percent = 10
retention_ms = 60000

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:9090");
        assert_eq!(config.engine.batch_size, 3);
        assert_eq!(config.engine.inter_batch_delay_ms, 50);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_config_from_missing_file() {
        let result = Config::from_file("/nonexistent/config.toml");
        assert!(result.is_err());
    }
}
