//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file if present).

use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub bot: BotConfig,
    pub gateway: GatewaySettings,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub env: Environment,
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Bot credentials and control-plane location
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub token: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Upper bound on a single control-plane request
    #[serde(default = "default_api_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Gateway connection tunables, in the units they are configured with
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    /// Fixed gateway URL; skips endpoint resolution when set
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_true")]
    pub compress: bool,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_heartbeat_jitter_ms")]
    pub heartbeat_jitter_ms: u64,
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,
    #[serde(default = "default_sequencer_capacity")]
    pub sequencer_capacity: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            url: None,
            compress: true,
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_jitter_ms: default_heartbeat_jitter_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            auto_reconnect: true,
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            max_reconnect_attempts: None,
            sequencer_capacity: default_sequencer_capacity(),
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "gamebot".to_string()
}

fn default_api_base_url() -> String {
    "https://www.kookapp.cn/api/v3".to_string()
}

fn default_api_request_timeout_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_heartbeat_jitter_ms() -> u64 {
    5_000
}

fn default_heartbeat_timeout_ms() -> u64 {
    6_000
}

fn default_handshake_timeout_ms() -> u64 {
    6_000
}

fn default_reconnect_base_delay_ms() -> u64 {
    2_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    60_000
}

fn default_sequencer_capacity() -> usize {
    10
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or malformed
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// Missing optional keys fall back to defaults; present-but-unparseable
    /// values are rejected rather than silently defaulted.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = GatewaySettings::default();

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: match lookup("APP_ENV") {
                    Some(value) => Environment::parse(&value)
                        .ok_or(ConfigError::InvalidValue("APP_ENV", value))?,
                    None => Environment::default(),
                },
                log_format: match lookup("LOG_FORMAT").map(|s| s.to_lowercase()) {
                    Some(value) if value == "json" => LogFormat::Json,
                    Some(value) if value == "pretty" => LogFormat::Pretty,
                    Some(value) => return Err(ConfigError::InvalidValue("LOG_FORMAT", value)),
                    None => LogFormat::default(),
                },
            },
            bot: BotConfig {
                token: lookup("BOT_TOKEN")
                    .filter(|s| !s.trim().is_empty())
                    .ok_or(ConfigError::MissingVar("BOT_TOKEN"))?,
                api_base_url: lookup("API_BASE_URL").unwrap_or_else(default_api_base_url),
                request_timeout_ms: parse_var(&lookup, "API_REQUEST_TIMEOUT_MS", parse_num)?
                    .unwrap_or_else(default_api_request_timeout_ms),
            },
            gateway: GatewaySettings {
                url: lookup("GATEWAY_URL").filter(|s| !s.trim().is_empty()),
                compress: parse_var(&lookup, "GATEWAY_COMPRESS", parse_bool)?
                    .unwrap_or(defaults.compress),
                heartbeat_interval_ms: parse_var(&lookup, "GATEWAY_HEARTBEAT_INTERVAL_MS", parse_num)?
                    .unwrap_or(defaults.heartbeat_interval_ms),
                heartbeat_jitter_ms: parse_var(&lookup, "GATEWAY_HEARTBEAT_JITTER_MS", parse_num)?
                    .unwrap_or(defaults.heartbeat_jitter_ms),
                heartbeat_timeout_ms: parse_var(&lookup, "GATEWAY_HEARTBEAT_TIMEOUT_MS", parse_num)?
                    .unwrap_or(defaults.heartbeat_timeout_ms),
                handshake_timeout_ms: parse_var(&lookup, "GATEWAY_HANDSHAKE_TIMEOUT_MS", parse_num)?
                    .unwrap_or(defaults.handshake_timeout_ms),
                auto_reconnect: parse_var(&lookup, "GATEWAY_AUTO_RECONNECT", parse_bool)?
                    .unwrap_or(defaults.auto_reconnect),
                reconnect_base_delay_ms: parse_var(&lookup, "GATEWAY_RECONNECT_BASE_DELAY_MS", parse_num)?
                    .unwrap_or(defaults.reconnect_base_delay_ms),
                reconnect_max_delay_ms: parse_var(&lookup, "GATEWAY_RECONNECT_MAX_DELAY_MS", parse_num)?
                    .unwrap_or(defaults.reconnect_max_delay_ms),
                max_reconnect_attempts: parse_var(&lookup, "GATEWAY_MAX_RECONNECT_ATTEMPTS", parse_num)?,
                sequencer_capacity: parse_var(&lookup, "GATEWAY_SEQUENCER_CAPACITY", parse_num)?
                    .unwrap_or(defaults.sequencer_capacity),
            },
        })
    }
}

fn parse_var<F, T>(
    lookup: &F,
    key: &'static str,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => parse(raw.trim())
            .map(Some)
            .ok_or(ConfigError::InvalidValue(key, raw)),
        None => Ok(None),
    }
}

fn parse_num<T: std::str::FromStr>(value: &str) -> Option<T> {
    value.parse().ok()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
