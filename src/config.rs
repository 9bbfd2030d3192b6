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
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_SEARCH_HOST: &str = "http://127.0.0.1:7700";
const DEFAULT_SEARCH_INDEX: &str = "products";
const DEFAULT_SEARCH_TIMEOUT_MS: u64 = 1500;
const DEFAULT_SEARCH_CONNECT_TIMEOUT_MS: u64 = 500;
const DEFAULT_MAX_TOTAL_HITS: u64 = 100_000;
const DEFAULT_REINDEX_BATCH_SIZE: u64 = 500;

/// Search index connection settings
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SearchConfig {
    /// Base URL of the Meilisearch server
    #[serde(default = "default_search_host")]
    #[validate(custom = "validate_http_url")]
    pub host: String,

    /// API key sent as a bearer token; empty or absent disables auth
    #[serde(default)]
    pub api_key: Option<String>,

    /// Index uid holding product documents
    #[serde(default = "default_search_index")]
    #[validate(length(min = 1))]
    pub index: String,

    /// Whole-request timeout for index calls
    #[serde(default = "default_search_timeout_ms")]
    #[validate(custom = "validate_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_search_connect_timeout_ms")]
    #[validate(custom = "validate_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Upper bound on hits the index will count for pagination
    #[serde(default = "default_max_total_hits")]
    #[validate(custom = "validate_positive")]
    pub max_total_hits: u64,

    /// Consecutive failures before search calls skip the index
    #[serde(default = "default_breaker_failure_threshold")]
    #[validate(range(min = 1))]
    pub breaker_failure_threshold: u32,

    /// Seconds an open breaker waits before probing the index again
    #[serde(default = "default_breaker_reset_secs")]
    pub breaker_reset_secs: u64,

    /// Documents pushed per request during a full reindex
    #[serde(default = "default_reindex_batch_size")]
    #[validate(custom = "validate_batch_size")]
    pub reindex_batch_size: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            host: default_search_host(),
            api_key: None,
            index: default_search_index(),
            timeout_ms: default_search_timeout_ms(),
            connect_timeout_ms: default_search_connect_timeout_ms(),
            max_total_hits: default_max_total_hits(),
            breaker_failure_threshold: default_breaker_failure_threshold(),
            breaker_reset_secs: default_breaker_reset_secs(),
            reindex_batch_size: default_reindex_batch_size(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port (1024-65535)
    #[serde(default = "default_port")]
    #[validate(range(min = 1024, max = 65535))]
    pub port: u16,

    /// Application environment
    #[validate(length(min = 1))]
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

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Capacity of the index synchronisation event channel
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Bearer token for the /api/v1/admin routes; unset rejects every admin request
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Search index settings
    #[serde(default)]
    #[validate]
    pub search: SearchConfig,
}

impl AppConfig {
    /// Creates a new configuration with defaults for everything but the essentials
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            admin_token: None,
            search: SearchConfig::default(),
        }
    }

    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Configured admin token, ignoring blank values
    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Explicit CORS origins, trimmed, empty entries dropped
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_min_connections");
            err.message = Some("db_min_connections cannot exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if self.search.connect_timeout_ms > self.search.timeout_ms {
            let mut err = ValidationError::new("search_connect_timeout");
            err.message =
                Some("search.connect_timeout_ms cannot exceed search.timeout_ms".into());
            errors.add("search", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
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

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    300
}
fn default_db_acquire_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_search_host() -> String {
    DEFAULT_SEARCH_HOST.to_string()
}

fn default_search_index() -> String {
    DEFAULT_SEARCH_INDEX.to_string()
}

fn default_search_timeout_ms() -> u64 {
    DEFAULT_SEARCH_TIMEOUT_MS
}

fn default_search_connect_timeout_ms() -> u64 {
    DEFAULT_SEARCH_CONNECT_TIMEOUT_MS
}

fn default_max_total_hits() -> u64 {
    DEFAULT_MAX_TOTAL_HITS
}

fn default_breaker_failure_threshold() -> u32 {
    5
}

fn default_breaker_reset_secs() -> u64 {
    30
}

fn default_reindex_batch_size() -> u64 {
    DEFAULT_REINDEX_BATCH_SIZE
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

fn validate_http_url(value: &str) -> Result<(), ValidationError> {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => {
            let mut err = ValidationError::new("search_host");
            err.message = Some("search.host must be an http(s) URL".into());
            Err(err)
        }
    }
}

fn validate_timeout_ms(value: u64) -> Result<(), ValidationError> {
    if !(10..=60_000).contains(&value) {
        let mut err = ValidationError::new("timeout_ms");
        err.message = Some("Timeouts must be between 10 and 60000 milliseconds".into());
        return Err(err);
    }
    Ok(())
}

fn validate_positive(value: u64) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::new("must_be_positive"));
    }
    Ok(())
}

fn validate_batch_size(value: u64) -> Result<(), ValidationError> {
    if !(1..=10_000).contains(&value) {
        let mut err = ValidationError::new("reindex_batch_size");
        err.message = Some("reindex_batch_size must be between 1 and 10000".into());
        return Err(err);
    }
    Ok(())
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("event_channel_capacity");
        err.message = Some("event_channel_capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("catalog_search={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Default config (config/default.toml)
/// 2. Environment-specific config (config/{env}.toml)
/// 3. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
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

    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

/// Loads configuration from an explicit directory and profile
pub fn load_config_from(dir: &Path, run_env: &str) -> Result<AppConfig, AppConfigError> {
    let config = Config::builder()
        .set_default("database_url", "sqlite://catalog.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(dir.join("default")).required(false))
        .add_source(File::from(dir.join(run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration constraint validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
