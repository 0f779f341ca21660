use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEV_DEFAULT_GATEWAY_SECRET: &str = "development_gateway_secret_do_not_ship";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// ISO currency code used for gateway orders
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub currency: String,

    /// Public key id handed to the storefront for gateway checkout
    #[validate(length(min = 1))]
    pub gateway_key_id: String,

    /// Secret used to verify gateway payment signatures
    #[validate(custom = "validate_gateway_secret")]
    pub gateway_key_secret: String,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,

    /// Per-request timeout applied by the HTTP server (seconds)
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1, max = 600))]
    pub request_timeout_secs: u64,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// Seed a starter coupon catalog on startup
    #[serde(default)]
    pub seed_coupons: bool,
}

impl AppConfig {
    /// Creates a configuration with development defaults
    pub fn new(host: String, port: u16, environment: String) -> Self {
        Self {
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            currency: default_currency(),
            gateway_key_id: "rzp_test_storefront".to_string(),
            gateway_key_secret: DEV_DEFAULT_GATEWAY_SECRET.to_string(),
            event_channel_capacity: default_event_channel_capacity(),
            request_timeout_secs: default_request_timeout_secs(),
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            seed_coupons: false,
        }
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if !self.is_development() && self.gateway_key_secret.trim() == DEV_DEFAULT_GATEWAY_SECRET {
            let mut err = ValidationError::new("gateway_key_secret_default_dev");
            err.message = Some(
                "The bundled development gateway secret must not be used outside development. Set APP__GATEWAY_KEY_SECRET."
                    .into(),
            );
            errors.add("gateway_key_secret", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_gateway_secret(secret: &str) -> Result<(), ValidationError> {
    let trimmed = secret.trim();

    if trimmed.len() < 16 {
        let mut err = ValidationError::new("gateway_key_secret");
        err.message = Some("Gateway secret must be at least 16 characters".into());
        return Err(err);
    }

    if let Some(first) = trimmed.chars().next() {
        if trimmed.chars().all(|c| c == first) {
            let mut err = ValidationError::new("gateway_key_secret");
            err.message = Some("Gateway secret cannot be a repeated character sequence".into());
            return Err(err);
        }
    }

    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("storefront_orders={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(CONFIG_DIR)
}

pub fn load_config_from(config_dir: &str) -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(config_dir).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir
        );
    }

    let config = Config::builder()
        .set_default("host", DEFAULT_HOST)?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("gateway_key_id", "rzp_test_storefront")?
        .set_default("gateway_key_secret", DEV_DEFAULT_GATEWAY_SECRET)?
        .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
        .add_source(File::with_name(&format!("{}/{}", config_dir, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn base_config() -> AppConfig {
        AppConfig::new("127.0.0.1".into(), 8080, "production".into())
    }

    #[test]
    fn non_dev_requires_cors_origins_and_real_secret() {
        let cfg = base_config();
        let errors = cfg.validate_additional_constraints().unwrap_err();
        assert!(errors.field_errors().contains_key("cors_allowed_origins"));
        assert!(errors.field_errors().contains_key("gateway_key_secret"));
    }

    #[test]
    fn non_dev_with_origins_and_secret_passes() {
        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some("https://shop.example.com".into());
        cfg.gateway_key_secret = "a-real-production-gateway-secret".into();
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn development_defaults_validate() {
        let cfg = AppConfig::new("127.0.0.1".into(), 8080, "development".into());
        assert!(cfg.validate().is_ok());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn rejects_weak_gateway_secret() {
        assert!(validate_gateway_secret("short").is_err());
        assert!(validate_gateway_secret("aaaaaaaaaaaaaaaaaaaa").is_err());
        assert!(validate_gateway_secret("a-reasonable-secret-value").is_ok());
    }

    #[test]
    fn loads_file_layer_from_config_dir() {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(
            file,
            "port = 9191\ncurrency = \"USD\"\nseed_coupons = true\nenvironment = \"development\""
        )
        .unwrap();

        let cfg = load_config_from(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.port, 9191);
        assert_eq!(cfg.currency, "USD");
        assert!(cfg.seed_coupons);
    }
}
