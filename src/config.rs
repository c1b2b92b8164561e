use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CACHE_TYPE: &str = "in-memory";
const DEFAULT_SESSION_HEADER: &str = "x-user-id";
const DEFAULT_PURCHASE_POLICY: &str =
    "Please note: virtual goods are non-refundable and non-exchangeable once paid.";

/// Cache configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Type of cache to use: "in-memory" or "redis"
    #[serde(default = "default_cache_type")]
    #[validate(custom = "validate_cache_type")]
    pub cache_type: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: default_cache_type(),
        }
    }
}

/// Order module tuning
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct OrderConfig {
    /// Minutes a freshly created payment stays payable
    #[serde(default = "default_payment_deadline_minutes")]
    #[validate(range(min = 1))]
    pub payment_deadline_minutes: i64,

    /// Policy text returned with every purchase preview
    #[serde(default = "default_purchase_policy")]
    pub purchase_policy: String,

    /// How long a create-order request id stays claimed
    #[serde(default = "default_request_id_ttl_secs")]
    #[validate(range(min = 1))]
    pub request_id_ttl_secs: u64,

    /// Upper bound for each call to the product, credit and payment services
    #[serde(default = "default_collaborator_timeout_ms")]
    #[validate(range(min = 1))]
    pub collaborator_timeout_ms: u64,

    /// Largest page a list request may ask for
    #[serde(default = "default_max_list_limit")]
    #[validate(range(min = 1))]
    pub max_list_limit: u64,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            payment_deadline_minutes: default_payment_deadline_minutes(),
            purchase_policy: default_purchase_policy(),
            request_id_ttl_secs: default_request_id_ttl_secs(),
            collaborator_timeout_ms: default_collaborator_timeout_ms(),
            max_list_limit: default_max_list_limit(),
        }
    }
}

impl OrderConfig {
    pub fn collaborator_timeout(&self) -> Duration {
        Duration::from_millis(self.collaborator_timeout_ms)
    }

    pub fn request_id_ttl(&self) -> Duration {
        Duration::from_secs(self.request_id_ttl_secs)
    }
}

/// Base URLs of the services the order module consumes
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct CollaboratorConfig {
    #[validate(length(min = 1))]
    pub product_service_url: String,
    #[validate(length(min = 1))]
    pub credit_service_url: String,
    #[validate(length(min = 1))]
    pub payment_service_url: String,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            product_service_url: "http://localhost:8081".to_string(),
            credit_service_url: "http://localhost:8082".to_string(),
            payment_service_url: "http://localhost:8083".to_string(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Redis connection URL
    pub redis_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
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

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Ambient deadline applied to every HTTP request (seconds)
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1))]
    pub request_timeout_secs: u64,

    /// Trusted gateway header carrying the authenticated buyer id
    #[serde(default = "default_session_header")]
    pub session_header: String,

    /// Cache configuration
    #[serde(default)]
    #[validate]
    pub cache: CacheConfig,

    /// Order module configuration
    #[serde(default)]
    #[validate]
    pub order: OrderConfig,

    /// Collaborator endpoints
    #[serde(default)]
    #[validate]
    pub collaborators: CollaboratorConfig,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the stores.
    pub fn new(database_url: String, redis_url: String, environment: String) -> Self {
        Self {
            database_url,
            redis_url,
            host: "0.0.0.0".to_string(),
            port: default_port(),
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            session_header: default_session_header(),
            cache: CacheConfig::default(),
            order: OrderConfig::default(),
            collaborators: CollaboratorConfig::default(),
        }
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
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

fn default_cache_type() -> String {
    DEFAULT_CACHE_TYPE.to_string()
}

fn default_session_header() -> String {
    DEFAULT_SESSION_HEADER.to_string()
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_payment_deadline_minutes() -> i64 {
    30
}

fn default_purchase_policy() -> String {
    DEFAULT_PURCHASE_POLICY.to_string()
}

fn default_request_id_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_collaborator_timeout_ms() -> u64 {
    3000
}

fn default_max_list_limit() -> u64 {
    100
}

fn validate_cache_type(value: &str) -> Result<(), ValidationError> {
    match value.to_ascii_lowercase().as_str() {
        "in-memory" | "redis" => Ok(()),
        _ => {
            let mut err = ValidationError::new("cache_type");
            err.message = Some("Must be one of: in-memory, redis".into());
            Err(err)
        }
    }
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

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("academy_order={},tower_http=debug", level);
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
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://academy_order.db?mode=rwc")?
        .set_default("redis_url", "redis://localhost:6379")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
