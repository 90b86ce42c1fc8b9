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
const DEFAULT_SESSION_COOKIE: &str = "teamhub_session";
const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";
const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_WEB_SEARCH_ENDPOINT: &str = "https://api.search.brave.com/res/v1/web/search";
pub const DEFAULT_CONVERSATION_HISTORY_LIMIT: u64 = 50;
pub const DEFAULT_CONVERSATION_STALE_DAYS: i64 = 7;

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

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

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// CORS: allow credentials (needed for the session cookie cross-origin)
    #[serde(default)]
    pub cors_allow_credentials: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1))]
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

    /// Name of the cookie carrying the session token
    #[serde(default = "default_session_cookie_name")]
    #[validate(length(min = 1))]
    pub session_cookie_name: String,

    /// Session lifetime in seconds
    #[serde(default = "default_session_ttl_secs")]
    #[validate(range(min = 60))]
    pub session_ttl_secs: u64,

    /// Mark the session cookie `Secure`
    #[serde(default)]
    pub session_cookie_secure: bool,

    /// Discord application id (slash command registration, webhook edits)
    #[serde(default)]
    pub discord_application_id: Option<String>,

    /// Hex-encoded Ed25519 public key used to verify interaction requests
    #[serde(default)]
    pub discord_public_key: Option<String>,

    /// Bot token for the Discord REST API
    #[serde(default)]
    pub discord_bot_token: Option<String>,

    /// Register commands to this guild only (faster propagation while developing)
    #[serde(default)]
    pub discord_guild_id: Option<String>,

    #[serde(default = "default_discord_api_base")]
    pub discord_api_base: String,

    /// OpenAI-compatible chat completions base URL
    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,

    #[serde(default)]
    pub llm_api_key: Option<String>,

    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    /// Upper bound on model/tool round trips per agent turn
    #[serde(default = "default_agent_max_tool_rounds")]
    #[validate(range(min = 1, max = 20))]
    pub agent_max_tool_rounds: u32,

    /// Persona used when a command does not pick one: glados, wheatley or neutral
    #[serde(default = "default_persona")]
    #[validate(custom = "validate_persona")]
    pub default_persona: String,

    #[serde(default)]
    pub web_search_api_key: Option<String>,

    #[serde(default = "default_web_search_endpoint")]
    pub web_search_endpoint: String,

    /// Messages kept per (team, channel) conversation
    #[serde(default = "default_conversation_history_limit")]
    #[validate(range(min = 1, max = 1000))]
    pub conversation_history_limit: u64,

    /// Conversations idle for longer than this are swept
    #[serde(default = "default_conversation_stale_days")]
    #[validate(range(min = 1))]
    pub conversation_stale_days: i64,

    /// Maximum conversations deleted per sweep
    #[serde(default = "default_conversation_sweep_batch_size")]
    #[validate(range(min = 1))]
    pub conversation_sweep_batch_size: u64,

    /// Interval between sweeps; 0 disables the sweeper
    #[serde(default = "default_conversation_sweep_interval_secs")]
    pub conversation_sweep_interval_secs: u64,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the essentials
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
            cors_allow_any_origin: false,
            cors_allow_credentials: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            session_cookie_name: default_session_cookie_name(),
            session_ttl_secs: default_session_ttl_secs(),
            session_cookie_secure: false,
            discord_application_id: None,
            discord_public_key: None,
            discord_bot_token: None,
            discord_guild_id: None,
            discord_api_base: default_discord_api_base(),
            llm_base_url: default_llm_base_url(),
            llm_api_key: None,
            llm_model: default_llm_model(),
            agent_max_tool_rounds: default_agent_max_tool_rounds(),
            default_persona: default_persona(),
            web_search_api_key: None,
            web_search_endpoint: default_web_search_endpoint(),
            conversation_history_limit: default_conversation_history_limit(),
            conversation_stale_days: default_conversation_stale_days(),
            conversation_sweep_batch_size: default_conversation_sweep_batch_size(),
            conversation_sweep_interval_secs: default_conversation_sweep_interval_secs(),
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
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

    /// True when interaction requests can be verified
    pub fn discord_enabled(&self) -> bool {
        self.discord_public_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
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

        if self.is_production() && !self.session_cookie_secure {
            let mut err = ValidationError::new("session_cookie_secure_required");
            err.message =
                Some("Session cookies must be marked Secure in production (APP__SESSION_COOKIE_SECURE=true)".into());
            errors.add("session_cookie_secure", err);
        }

        if let Some(key) = self.discord_public_key.as_deref() {
            let key = key.trim();
            if !key.is_empty() && (key.len() != 64 || hex::decode(key).is_err()) {
                let mut err = ValidationError::new("discord_public_key");
                err.message = Some("Discord public key must be 64 hex characters".into());
                errors.add("discord_public_key", err);
            }
        }

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_min_connections");
            err.message = Some("db_min_connections cannot exceed db_max_connections".into());
            errors.add("db_min_connections", err);
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

fn default_session_cookie_name() -> String {
    DEFAULT_SESSION_COOKIE.to_string()
}
fn default_session_ttl_secs() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}

fn default_discord_api_base() -> String {
    DEFAULT_DISCORD_API_BASE.to_string()
}

fn default_llm_base_url() -> String {
    DEFAULT_LLM_BASE_URL.to_string()
}
fn default_llm_model() -> String {
    DEFAULT_LLM_MODEL.to_string()
}
fn default_agent_max_tool_rounds() -> u32 {
    5
}
fn default_persona() -> String {
    "glados".to_string()
}

fn default_web_search_endpoint() -> String {
    DEFAULT_WEB_SEARCH_ENDPOINT.to_string()
}

fn default_conversation_history_limit() -> u64 {
    DEFAULT_CONVERSATION_HISTORY_LIMIT
}
fn default_conversation_stale_days() -> i64 {
    DEFAULT_CONVERSATION_STALE_DAYS
}
fn default_conversation_sweep_batch_size() -> u64 {
    100
}
fn default_conversation_sweep_interval_secs() -> u64 {
    3600
}

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

fn validate_persona(persona: &str) -> Result<(), ValidationError> {
    if persona.parse::<crate::agent::Persona>().is_ok() {
        Ok(())
    } else {
        let mut err = ValidationError::new("default_persona");
        err.message = Some("Must be one of: glados, wheatley, neutral".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("teamhub_api={},tower_http=debug", level);
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
    let _ = dotenvy::dotenv();

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
        .set_default("database_url", "sqlite://teamhub.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env.as_str())?
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

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "production".into(),
        )
    }

    #[test]
    fn non_dev_requires_cors_origins() {
        let mut cfg = base_config();
        cfg.session_cookie_secure = true;
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn non_dev_with_origins_and_secure_cookie_passes() {
        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some("https://team.example.org".into());
        cfg.session_cookie_secure = true;
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn production_requires_secure_cookie() {
        let mut cfg = base_config();
        cfg.cors_allow_any_origin = true;
        let errors = cfg.validate_additional_constraints().unwrap_err();
        assert!(errors.field_errors().contains_key("session_cookie_secure"));
    }

    #[test]
    fn development_allows_permissive_by_default() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn malformed_discord_key_is_rejected() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        cfg.discord_public_key = Some("not-a-key".into());
        assert!(cfg.validate_additional_constraints().is_err());

        cfg.discord_public_key = Some("   ".into());
        assert!(cfg.validate_additional_constraints().is_ok());
        assert!(!cfg.discord_enabled());
    }

    #[test]
    fn defaults_match_conversation_policy() {
        let cfg = base_config();
        assert_eq!(cfg.conversation_history_limit, 50);
        assert_eq!(cfg.conversation_stale_days, 7);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn unknown_persona_fails_validation() {
        let mut cfg = base_config();
        cfg.default_persona = "hal9000".into();
        let errors = cfg.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("default_persona"));
    }
}
