//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration (only needed for the shared suppression store).
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    /// Outgoing mail configuration. Email escalation is disabled when absent.
    #[serde(default)]
    pub mail: Option<MailConfig>,
    /// Notification fan-out tuning.
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of the web client, used for links in emails.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix for all Redis keys.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// SMTP mail configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// SMTP relay host.
    pub host: String,
    /// SMTP port.
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// SMTP username.
    #[serde(default)]
    pub username: Option<String>,
    /// SMTP password.
    #[serde(default)]
    pub password: Option<String>,
    /// Sender address.
    pub from_address: String,
    /// Sender display name.
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

/// Where the email suppression flags live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuppressionBackend {
    /// Process-local map. Flags are lost on restart and not shared.
    #[default]
    Memory,
    /// Redis keys, shared by every instance.
    Redis,
}

/// Notification fan-out tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// A recipient whose last login is older than this is considered away.
    #[serde(default = "default_stale_login_days")]
    pub stale_login_days: i64,
    /// Unread chat notifications within the burst window that trigger an email.
    #[serde(default = "default_burst_threshold")]
    pub burst_threshold: u64,
    /// Length of the burst window.
    #[serde(default = "default_burst_window_minutes")]
    pub burst_window_minutes: i64,
    /// Suppression store backend.
    #[serde(default)]
    pub suppression_backend: SuppressionBackend,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            stale_login_days: default_stale_login_days(),
            burst_threshold: default_burst_threshold(),
            burst_window_minutes: default_burst_window_minutes(),
            suppression_backend: SuppressionBackend::default(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    5000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

fn default_redis_prefix() -> String {
    "carpool".to_string()
}

const fn default_smtp_port() -> u16 {
    587
}

fn default_from_name() -> String {
    "Carpool".to_string()
}

const fn default_stale_login_days() -> i64 {
    2
}

const fn default_burst_threshold() -> u64 {
    5
}

const fn default_burst_window_minutes() -> i64 {
    15
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `CARPOOL_ENV`)
    /// 3. Environment variables with `CARPOOL__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("CARPOOL_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CARPOOL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("CARPOOL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
