use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::Validate;

pub const DEFAULT_ENV: &str = "development";
pub const DEFAULT_LOG_LEVEL: &str = "info";
const CONFIG_DIR: &str = "config";

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_DB_MIN_CONNECTIONS: u32 = 1;
const DEFAULT_DB_CONNECT_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_DB_IDLE_TIMEOUT_SECONDS: u64 = 300;
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

fn default_db_max_connections() -> u32 {
    DEFAULT_DB_MAX_CONNECTIONS
}

fn default_db_min_connections() -> u32 {
    DEFAULT_DB_MIN_CONNECTIONS
}

fn default_db_connect_timeout_seconds() -> u64 {
    DEFAULT_DB_CONNECT_TIMEOUT_SECONDS
}

fn default_db_idle_timeout_seconds() -> u64 {
    DEFAULT_DB_IDLE_TIMEOUT_SECONDS
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

fn default_request_timeout_seconds() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

fn default_store_name() -> String {
    "Storefront".to_string()
}

fn default_store_phone() -> String {
    "5500000000000".to_string()
}

/// Store-facing settings: contact phone for order deep links and optional
/// message template overrides. Templates are passed to the renderer as
/// explicit inputs so admin previews and live checkout cannot diverge.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[validate(length(min = 1, message = "Store name must not be empty"))]
    #[serde(default = "default_store_name")]
    pub name: String,

    /// Destination for checkout deep links. Digits and punctuation accepted;
    /// reduced to digits when links are built.
    #[validate(length(min = 8, message = "Store WhatsApp phone looks too short"))]
    #[serde(default = "default_store_phone")]
    pub whatsapp_phone: String,

    /// Override for the order confirmation template; built-in default when unset.
    #[serde(default)]
    pub order_template: Option<String>,

    /// Override for the recovery reminder template; built-in default when unset.
    #[serde(default)]
    pub recovery_template: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: default_store_name(),
            whatsapp_phone: default_store_phone(),
            order_template: None,
            recovery_template: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub database_url: String,

    #[validate(length(min = 1, message = "Host must not be empty"))]
    pub host: String,
    pub port: u16,

    pub environment: String,
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_connect_timeout_seconds")]
    pub db_connect_timeout_seconds: u64,
    #[serde(default = "default_db_idle_timeout_seconds")]
    pub db_idle_timeout_seconds: u64,

    /// Run embedded migrations on startup. On by default for sqlite-backed
    /// development; production schemas are usually migrated out of band.
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Comma-separated origin list; unset means permissive CORS.
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    #[validate]
    #[serde(default)]
    pub store: StoreConfig,
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Loads configuration from built-in defaults, `config/` files for the
/// selected environment, and `APP__`-prefixed environment variables
/// (e.g. `APP__STORE__WHATSAPP_PHONE`), in that precedence order.
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
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8080)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .set_default("auto_migrate", true)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config
        .validate()
        .map_err(|e| AppConfigError::ValidationError(e.to_string()))?;

    Ok(app_config)
}

/// Initializes the tracing subscriber. `RUST_LOG` takes precedence over the
/// configured level; `json` switches the output format for log shippers.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter =
        EnvFilter::try_new(filter_directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        let _ = registry.with(fmt::layer().json()).try_init();
    } else {
        let _ = registry.with(fmt::layer()).try_init();
    }
}
