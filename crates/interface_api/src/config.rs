//! API configuration
//!
//! Loaded from an optional config file and `API_*` environment variables.
//! Nested keys use `__`, e.g. `API_SCORING__THRESHOLDS__REVIEW=0.35`.

use serde::Deserialize;

use domain_fraud::ScoringConfig;

/// Default location of the config file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config/fraud-api";

/// API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Log level
    pub log_level: String,
    /// Directory of model JSON files registered at startup
    #[serde(default)]
    pub models_dir: Option<String>,
    /// Largest batch accepted by `/score/batch`
    pub max_batch_size: usize,
    /// Scoring core configuration
    pub scoring: ScoringConfig,
}

impl ApiConfig {
    /// Loads configuration from `file` (if present) overlaid with environment
    pub fn load(file: &str) -> Result<Self, config::ConfigError> {
        let config: ApiConfig = config::Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8080)?
            .set_default("jwt_expiration_secs", 3600)?
            .set_default("log_level", "info")?
            .set_default("max_batch_size", 1000)?
            .add_source(config::File::with_name(file).required(false))
            .add_source(
                config::Environment::with_prefix("API")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from the default file location and environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::load(DEFAULT_CONFIG_FILE)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.jwt_secret.len() < 16 {
            return Err(config::ConfigError::Message(
                "jwt_secret must be at least 16 characters".to_string(),
            ));
        }
        if self.max_batch_size == 0 {
            return Err(config::ConfigError::Message(
                "max_batch_size must be at least 1".to_string(),
            ));
        }
        self.scoring
            .validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_secret(secret: &str) -> ApiConfig {
        let scoring: ScoringConfig = serde_json::from_str(
            r#"{
                "model_family": "claims",
                "thresholds": { "review": 0.3, "investigate": 0.7 },
                "explanation": { "tolerance": 0.001, "permutations": 8, "top_n": 5 },
                "drift": {
                    "window_size": 200,
                    "min_samples": 100,
                    "psi_threshold": 0.2,
                    "min_labeled": 50,
                    "calibration_gap_threshold": 0.15
                },
                "batch": { "parallel_threshold": 16, "max_workers": 4 }
            }"#,
        )
        .unwrap();
        ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 9000,
            jwt_secret: secret.to_string(),
            jwt_expiration_secs: 60,
            log_level: "debug".to_string(),
            models_dir: None,
            max_batch_size: 10,
            scoring,
        }
    }

    #[test]
    fn test_server_addr() {
        let config = config_with_secret("a-sufficiently-long-secret");
        assert_eq!(config.server_addr(), "127.0.0.1:9000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(config_with_secret("short").validate().is_err());
    }

    #[test]
    fn test_invalid_scoring_config_rejected() {
        let mut config = config_with_secret("a-sufficiently-long-secret");
        config.scoring.thresholds.review = 0.9;
        assert!(config.validate().is_err());
    }
}
