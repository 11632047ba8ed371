// shared-types-rs/src/config.rs
// Layered configuration loader for the command gateway

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "GATEWAY_CONFIG_PATH";
/// Configuration file used when `GATEWAY_CONFIG_PATH` is unset
pub const DEFAULT_CONFIG_PATH: &str = "config/gateway.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub logging: LoggingSettings,
    pub resilience: ResilienceSettings,
    pub commands: CommandSettings,
    pub store: StoreSettings,
    pub ai: AiSettings,
    pub files: FileSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            body_limit_bytes: 256 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub service_name: String,
    pub json_format: bool,
    pub file_output: bool,
    pub log_dir: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            service_name: "api-gateway".to_string(),
            json_format: true,
            file_output: false,
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct BulkheadSettings {
    pub max_concurrent: usize,
    pub max_queue: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BulkheadCategorySettings {
    pub ai: BulkheadSettings,
    pub auth: BulkheadSettings,
    pub workflow: BulkheadSettings,
    pub default: BulkheadSettings,
}

impl Default for BulkheadCategorySettings {
    fn default() -> Self {
        Self {
            ai: BulkheadSettings {
                max_concurrent: 10,
                max_queue: 50,
            },
            auth: BulkheadSettings {
                max_concurrent: 50,
                max_queue: 100,
            },
            workflow: BulkheadSettings {
                max_concurrent: 20,
                max_queue: 40,
            },
            default: BulkheadSettings {
                max_concurrent: 25,
                max_queue: 50,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResilienceSettings {
    pub failure_threshold: u32,
    pub half_open_after_ms: u64,
    pub timeout_ms: u64,
    pub retry: RetrySettings,
    pub bulkhead: BulkheadCategorySettings,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            half_open_after_ms: 30_000,
            timeout_ms: 30_000,
            retry: RetrySettings::default(),
            bulkhead: BulkheadCategorySettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CommandSettings {
    /// Block high-risk input instead of only auditing it
    pub strict_mode: bool,
    pub record_ttl_secs: u64,
    pub ai_timeout_ms: u64,
    pub polling_path_prefix: String,
    pub websocket_path_prefix: String,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            strict_mode: true,
            record_ttl_secs: 3_600,
            ai_timeout_ms: 120_000,
            polling_path_prefix: "/api/v1/commands".to_string(),
            websocket_path_prefix: "/ws/commands".to_string(),
        }
    }
}

impl CommandSettings {
    pub fn ai_timeout(&self) -> Duration {
        Duration::from_millis(self.ai_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub redis_url: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AiSettings {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_ms: 120_000,
        }
    }
}

/// File service location. Without a base URL files are served from memory.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FileSettings {
    pub base_url: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_ms: 10_000,
        }
    }
}

impl GatewayConfig {
    /// Loads the configuration from `GATEWAY_CONFIG_PATH` (or the default
    /// path) and `GATEWAY__*` environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Loads defaults, then the optional file at `path`, then the environment
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("GATEWAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: GatewayConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resilience.failure_threshold == 0 {
            return Err(ConfigError::InvalidValue(
                "resilience.failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.resilience.retry.initial_delay_ms > self.resilience.retry.max_delay_ms {
            return Err(ConfigError::InvalidValue(
                "resilience.retry.initial_delay_ms exceeds max_delay_ms".to_string(),
            ));
        }
        if self.commands.record_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "commands.record_ttl_secs must be positive".to_string(),
            ));
        }
        let bulkheads = &self.resilience.bulkhead;
        for (name, sizing) in [
            ("ai", bulkheads.ai),
            ("auth", bulkheads.auth),
            ("workflow", bulkheads.workflow),
            ("default", bulkheads.default),
        ] {
            if sizing.max_concurrent == 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "resilience.bulkhead.{}.max_concurrent must be at least 1",
                    name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.resilience.failure_threshold, 5);
        assert_eq!(config.resilience.half_open_after_ms, 30_000);
        assert_eq!(config.resilience.retry.max_attempts, 3);
        assert_eq!(config.resilience.bulkhead.ai.max_concurrent, 10);
        assert_eq!(config.resilience.bulkhead.auth.max_queue, 100);
        assert!(config.commands.strict_mode);
        assert_eq!(config.commands.record_ttl_secs, 3_600);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(config.files.base_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = GatewayConfig::load_from("does/not/exist/gateway").unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[resilience]\nfailure_threshold = 2\n\n[resilience.bulkhead.ai]\nmax_concurrent = 4\nmax_queue = 8\n\n[commands]\nstrict_mode = false\n\n[store]\nbackend = \"redis\""
        )
        .unwrap();

        let config = GatewayConfig::load_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.resilience.failure_threshold, 2);
        assert_eq!(config.resilience.half_open_after_ms, 30_000);
        assert_eq!(config.resilience.bulkhead.ai.max_queue, 8);
        assert_eq!(config.resilience.bulkhead.auth.max_concurrent, 50);
        assert!(!config.commands.strict_mode);
        assert_eq!(config.store.backend, StoreBackend::Redis);
    }

    #[test]
    fn test_rejects_zero_threshold() {
        let mut config = GatewayConfig::default();
        config.resilience.failure_threshold = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }
}
