use paper_flow::AnalysisLimits;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Service settings, read from the environment.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub ollama_host: String,
    pub ollama_model: String,
    pub limits: AnalysisLimits,
    pub max_upload_bytes: usize,
    /// Finished tasks older than this are purged. `None` keeps them until restart.
    pub task_retention: Option<Duration>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            ollama_host: "http://localhost:11434".to_string(),
            ollama_model: "gemma".to_string(),
            limits: AnalysisLimits::default(),
            max_upload_bytes: 50 * 1024 * 1024,
            task_retention: None,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let secs = |name: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            lookup(name)
                .map(|value| parse_number::<u64>(name, &value).map(Duration::from_secs))
                .unwrap_or(Ok(default))
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .map(|value| parse_number("PORT", &value))
                .transpose()?
                .unwrap_or(defaults.port),
            ollama_host: lookup("OLLAMA_HOST")
                .map(|host| host.trim_end_matches('/').to_string())
                .unwrap_or(defaults.ollama_host),
            ollama_model: lookup("OLLAMA_MODEL").unwrap_or(defaults.ollama_model),
            limits: AnalysisLimits {
                file_read_timeout: secs(
                    "FILE_READ_TIMEOUT_SECS",
                    defaults.limits.file_read_timeout,
                )?,
                analysis_timeout: secs("ANALYSIS_TIMEOUT_SECS", defaults.limits.analysis_timeout)?,
                model_call_timeout: secs(
                    "MODEL_CALL_TIMEOUT_SECS",
                    defaults.limits.model_call_timeout,
                )?,
            },
            max_upload_bytes: lookup("MAX_UPLOAD_BYTES")
                .map(|value| parse_number("MAX_UPLOAD_BYTES", &value))
                .transpose()?
                .unwrap_or(defaults.max_upload_bytes),
            task_retention: lookup("TASK_RETENTION_SECS")
                .map(|value| parse_number::<u64>("TASK_RETENTION_SECS", &value))
                .transpose()?
                .map(Duration::from_secs),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        expected: "a non-negative integer",
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults_match_documented_limits() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.ollama_model, "gemma");
        assert_eq!(config.limits.file_read_timeout, Duration::from_secs(30));
        assert_eq!(config.limits.analysis_timeout, Duration::from_secs(300));
        assert!(config.task_retention.is_none());
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("OLLAMA_HOST", "http://gpu-box:11434/"),
            ("OLLAMA_MODEL", "llama3"),
            ("ANALYSIS_TIMEOUT_SECS", "60"),
            ("TASK_RETENTION_SECS", "3600"),
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:9000");
        assert_eq!(config.ollama_host, "http://gpu-box:11434");
        assert_eq!(config.ollama_model, "llama3");
        assert_eq!(config.limits.analysis_timeout, Duration::from_secs(60));
        assert_eq!(config.task_retention, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_malformed_number_is_an_error() {
        let err = config_from(&[("MODEL_CALL_TIMEOUT_SECS", "two minutes")]).unwrap_err();
        assert!(err.to_string().contains("MODEL_CALL_TIMEOUT_SECS"));
    }
}
