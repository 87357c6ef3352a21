use std::time::Duration;

use domain::models::DEFAULT_NAMESPACE;
use domain::ports::{ErrorCorrection, RenderOptions, DEFAULT_SYMBOL_SIZE};
use persistence::StorageConfig;
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub qr: QrConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// Portal REST backend.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BackendConfig {
    /// When false, every remote call fails fast and stays queued.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_base_url")]
    #[validate(url(message = "backend.base_url must be a valid URL"))]
    pub base_url: String,

    #[serde(default = "default_timeout")]
    #[validate(range(min = 1, max = 300, message = "backend.timeout_secs must be 1-300"))]
    pub timeout_secs: u64,

    /// Bearer token sent with every request.
    #[serde(default)]
    pub api_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QrConfig {
    /// Prefix of generated registration identifiers.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_symbol_size")]
    #[validate(range(min = 21, max = 4096, message = "qr.size must be 21-4096"))]
    pub size: u32,

    #[serde(default = "default_error_correction")]
    pub error_correction: ErrorCorrection,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReconcileConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_reconcile_interval")]
    #[validate(range(min = 1, message = "reconcile.interval_secs must be at least 1"))]
    pub interval_secs: u64,
}

// Default value functions
fn default_true() -> bool {
    true
}
fn default_base_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}
fn default_timeout() -> u64 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}
fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}
fn default_symbol_size() -> u32 {
    DEFAULT_SYMBOL_SIZE
}
fn default_error_correction() -> ErrorCorrection {
    ErrorCorrection::High
}
fn default_reconcile_interval() -> u64 {
    60
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            api_token: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            size: default_symbol_size(),
            error_correction: default_error_correction(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_reconcile_interval(),
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl QrConfig {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            size: self.size,
            error_correction: self.error_correction,
        }
    }
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration (optional, built-in defaults otherwise)
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with PORTAL__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("PORTAL").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Builds the config from embedded defaults and overrides only, without
    /// touching config files or the environment.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [backend]
            enabled = true
            base_url = "http://localhost:8000/api/v1"
            timeout_secs = 10

            [storage]
            backend = "memory"
            data_dir = "data"

            [logging]
            level = "info"
            format = "json"

            [qr]
            namespace = "SPARC"
            size = 200
            error_correction = "H"

            [reconcile]
            enabled = false
            interval_secs = 60
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        // Skip validation in tests to allow partial configs
        Ok(cfg)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let invalid = |e: validator::ValidationErrors| {
            ConfigValidationError::InvalidValue(e.to_string())
        };
        Validate::validate(&self.backend).map_err(invalid)?;
        Validate::validate(&self.qr).map_err(invalid)?;
        Validate::validate(&self.reconcile).map_err(invalid)?;

        if shared::validation::validate_namespace(&self.qr.namespace).is_err() {
            return Err(ConfigValidationError::InvalidValue(format!(
                "qr.namespace must be 1-{} ASCII letters or digits",
                shared::validation::MAX_NAMESPACE_LENGTH
            )));
        }

        if !matches!(self.logging.format.as_str(), "json" | "pretty") {
            return Err(ConfigValidationError::InvalidValue(
                "logging.format must be json or pretty".to_string(),
            ));
        }

        Ok(())
    }
}
