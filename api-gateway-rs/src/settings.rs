//! Conversions from the loaded configuration into runtime settings

use std::time::Duration;

use resilience::{
    BulkheadCategories, BulkheadConfig, CircuitBreakerConfig, LoggingConfig, ResilienceConfig, RetryConfig,
};
use shared_types::config::{BulkheadSettings, LoggingSettings, ResilienceSettings};

pub fn resilience_config(settings: &ResilienceSettings) -> ResilienceConfig {
    let bulkhead = |sizing: BulkheadSettings| BulkheadConfig {
        max_concurrent: sizing.max_concurrent,
        max_queue: sizing.max_queue,
    };

    ResilienceConfig {
        circuit: CircuitBreakerConfig {
            failure_threshold: settings.failure_threshold,
            half_open_after: Duration::from_millis(settings.half_open_after_ms),
        },
        retry: RetryConfig {
            max_attempts: settings.retry.max_attempts,
            initial_delay: Duration::from_millis(settings.retry.initial_delay_ms),
            max_delay: Duration::from_millis(settings.retry.max_delay_ms),
        },
        default_timeout: Duration::from_millis(settings.timeout_ms),
        bulkheads: BulkheadCategories {
            ai: bulkhead(settings.bulkhead.ai),
            auth: bulkhead(settings.bulkhead.auth),
            workflow: bulkhead(settings.bulkhead.workflow),
            default: bulkhead(settings.bulkhead.default),
        },
    }
}

pub fn logging_config(settings: &LoggingSettings) -> LoggingConfig {
    LoggingConfig {
        level: settings.level.clone(),
        service_name: settings.service_name.clone(),
        json_format: settings.json_format,
        file_output: settings.file_output,
        log_dir: settings.log_dir.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_match_registry_defaults() {
        let converted = resilience_config(&ResilienceSettings::default());
        let defaults = ResilienceConfig::default();

        assert_eq!(converted.circuit.failure_threshold, defaults.circuit.failure_threshold);
        assert_eq!(converted.circuit.half_open_after, defaults.circuit.half_open_after);
        assert_eq!(converted.retry.max_attempts, defaults.retry.max_attempts);
        assert_eq!(converted.default_timeout, defaults.default_timeout);
        assert_eq!(converted.bulkheads.ai, defaults.bulkheads.ai);
        assert_eq!(converted.bulkheads.auth, defaults.bulkheads.auth);
        assert_eq!(converted.bulkheads.workflow, defaults.bulkheads.workflow);
        assert_eq!(converted.bulkheads.default, defaults.bulkheads.default);
    }

    #[test]
    fn test_logging_settings_carry_over() {
        let settings = LoggingSettings {
            json_format: false,
            log_dir: Some("/var/log/gateway".to_string()),
            ..LoggingSettings::default()
        };
        let config = logging_config(&settings);
        assert!(!config.json_format);
        assert_eq!(config.log_dir.as_deref(), Some("/var/log/gateway"));
        assert_eq!(config.service_name, "api-gateway");
    }
}
