/// Configuration management for Content Service
///
/// Configuration is read from environment variables (a `.env` file is loaded
/// by the binary before calling [`Config::from_env`]).
use crate::db::MAX_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Identity provider (friends, blocks, realms)
    pub identity: UpstreamConfig,
    /// Notification delivery transport
    pub notifier: UpstreamConfig,
    /// Attachment storage
    pub attachments: UpstreamConfig,
    /// Feed composition limits
    pub feed: FeedConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// Server port to bind to
    pub port: u16,
}

/// Database configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    pub max_connections: u32,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Base URL and call budget for an HTTP collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Hard upper bound for any page size
    pub max_page_size: i64,
    pub default_page_size: i64,
    /// List views cut `body.content` beyond this many characters
    pub truncate_threshold: usize,
    /// Characters of content included in subscription notifications
    pub notification_preview_length: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            max_page_size: default_max_page_size(),
            default_page_size: 20,
            truncate_threshold: default_truncate_threshold(),
            notification_preview_length: 80,
        }
    }
}

impl FeedConfig {
    /// Page sizes must fit inside the window storage accepts.
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=MAX_PAGE_SIZE).contains(&self.max_page_size) {
            return Err(format!(
                "FEED_MAX_PAGE_SIZE must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.max_page_size
            ));
        }
        if !(1..=self.max_page_size).contains(&self.default_page_size) {
            return Err(format!(
                "FEED_DEFAULT_PAGE_SIZE must be between 1 and {}, got {}",
                self.max_page_size, self.default_page_size
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let is_production = app_env.eq_ignore_ascii_case("production");

        let identity_url = match std::env::var("IDENTITY_SERVICE_URL") {
            Ok(value) => value,
            Err(_) if is_production => {
                return Err("IDENTITY_SERVICE_URL must be set in production".to_string())
            }
            Err(_) => "http://localhost:8083".to_string(),
        };

        let config = Config {
            app: AppConfig {
                env: app_env,
                host: std::env::var("CONTENT_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or_default("CONTENT_SERVICE_PORT", 8081)?,
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/content".to_string()),
                max_connections: parse_env_or_default("DATABASE_MAX_CONNECTIONS", 10)?,
            },
            identity: UpstreamConfig {
                base_url: identity_url,
                timeout_ms: parse_env_or_default("IDENTITY_TIMEOUT_MS", default_timeout_ms())?,
            },
            notifier: UpstreamConfig {
                base_url: std::env::var("NOTIFIER_URL")
                    .unwrap_or_else(|_| "http://localhost:8085".to_string()),
                timeout_ms: parse_env_or_default("NOTIFIER_TIMEOUT_MS", default_timeout_ms())?,
            },
            attachments: UpstreamConfig {
                base_url: std::env::var("ATTACHMENT_SERVICE_URL")
                    .unwrap_or_else(|_| "http://localhost:8086".to_string()),
                timeout_ms: parse_env_or_default(
                    "ATTACHMENT_TIMEOUT_MS",
                    default_timeout_ms(),
                )?,
            },
            feed: FeedConfig {
                max_page_size: parse_env_or_default("FEED_MAX_PAGE_SIZE", default_max_page_size())?,
                default_page_size: parse_env_or_default("FEED_DEFAULT_PAGE_SIZE", 20)?,
                truncate_threshold: parse_env_or_default(
                    "FEED_TRUNCATE_THRESHOLD",
                    default_truncate_threshold(),
                )?,
                notification_preview_length: parse_env_or_default(
                    "NOTIFICATION_PREVIEW_LENGTH",
                    80,
                )?,
            },
        };

        config.feed.validate()?;
        Ok(config)
    }
}

fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val
            .parse()
            .map_err(|e| format!("Failed to parse {}='{}': {}", key, val, e)),
        Err(_) => Ok(default),
    }
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_max_page_size() -> i64 {
    100
}

fn default_truncate_threshold() -> usize {
    160
}
