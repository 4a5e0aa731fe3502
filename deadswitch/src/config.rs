//! Environment-variable-driven configuration, assembled once at startup.

use std::time::Duration;

use crate::error::{Error, Result};

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(default)
}

fn env_u16(key: &str, default: u16) -> Result<u16> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<u16>()
            .map_err(|_| Error::config(format!("{key} must be a valid port number, got '{v}'"))),
        Err(_) => Ok(default),
    }
}

fn env_usize(key: &str, default: usize) -> Result<usize> {
    match std::env::var(key) {
        Ok(v) => v
            .parse::<usize>()
            .map_err(|_| Error::config(format!("{key} must be a non-negative integer, got '{v}'"))),
        Err(_) => Ok(default),
    }
}

/// Log verbosity, as controlled by `LOG_LEVEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log output shape, as controlled by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Fully resolved application configuration.
///
/// Options named by the boundary (auto-TLS, metrics endpoint, config-file
/// parsing) are accepted and carried here even though this core does not
/// wire any behavior to them; they exist so `/auth/config` and the startup
/// log lines stay accurate for operators who set them.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub storage_dir: std::path::PathBuf,
    pub database_url: String,
    pub log_dir: std::path::PathBuf,
    pub log_level: LogLevel,
    pub log_format: LogFormat,

    pub auto_tls: bool,
    pub domains: Vec<String>,
    pub tls_certificate: Option<String>,
    pub tls_key: Option<String>,
    pub contact_email: Option<String>,
    pub metrics: bool,

    pub auth_enabled: bool,
    pub auth_issuer_url: Option<String>,
    pub auth_audience: Option<String>,
    pub auth_hmac_secret: Option<String>,

    pub worker_interval: Duration,
    pub worker_batch_size: i64,

    pub demo_mode: bool,
    pub demo_reset_interval: Option<Duration>,
}

impl Config {
    /// Load from the process environment, applying `.env` first if present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let storage_dir = std::path::PathBuf::from(env_string("STORAGE_DIR", "./data"));
        let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!("sqlite:{}/switches.db?mode=rwc", storage_dir.display())
        });
        let log_dir =
            std::path::PathBuf::from(env_string("LOG_DIR", &format!("{}/logs", storage_dir.display())));

        let log_level = match env_string("LOG_LEVEL", "info").as_str() {
            "debug" => LogLevel::Debug,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        };
        let log_format = match env_string("LOG_FORMAT", "text").as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };

        let domains = std::env::var("DOMAINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        let worker_interval_secs = parse_duration_env("WORKER_INTERVAL", "1m")?;
        if worker_interval_secs < 1 {
            return Err(Error::config("WORKER_INTERVAL must be at least one second"));
        }

        let demo_reset_interval = match std::env::var("DEMO_RESET_INTERVAL") {
            Ok(v) if !v.is_empty() => Some(Duration::from_secs(parse_duration_literal(&v)?)),
            _ => None,
        };

        Ok(Self {
            port: env_u16("PORT", 8080)?,
            storage_dir,
            database_url,
            log_dir,
            log_level,
            log_format,
            auto_tls: env_bool("AUTO_TLS", false),
            domains,
            tls_certificate: env_opt_string("TLS_CERTIFICATE"),
            tls_key: env_opt_string("TLS_KEY"),
            contact_email: env_opt_string("CONTACT_EMAIL"),
            metrics: env_bool("METRICS", false),
            auth_enabled: env_bool("AUTH_ENABLED", false),
            auth_issuer_url: env_opt_string("AUTH_ISSUER_URL"),
            auth_audience: env_opt_string("AUTH_AUDIENCE"),
            auth_hmac_secret: env_opt_string("AUTH_HMAC_SECRET"),
            worker_interval: Duration::from_secs(worker_interval_secs),
            worker_batch_size: env_usize("WORKER_BATCH_SIZE", 1000)? as i64,
            demo_mode: env_bool("DEMO_MODE", false),
            demo_reset_interval,
        })
    }

    pub fn symmetric_key_path(&self) -> std::path::PathBuf {
        self.storage_dir.join("dead-mans-switch.key")
    }

    pub fn vapid_private_key_path(&self) -> std::path::PathBuf {
        self.storage_dir.join("vapid.priv")
    }

    pub fn vapid_public_key_path(&self) -> std::path::PathBuf {
        self.storage_dir.join("vapid.pub")
    }
}

fn parse_duration_env(key: &str, default: &str) -> Result<u64> {
    match std::env::var(key) {
        Ok(v) => parse_duration_literal(&v),
        Err(_) => parse_duration_literal(default),
    }
}

/// Parses the `<number><unit>` duration grammar into whole seconds
/// (rounding down), for configuration values only. Request-path durations
/// use [`crate::domain::duration::parse_duration`], which preserves
/// sub-second precision.
fn parse_duration_literal(raw: &str) -> Result<u64> {
    let d = crate::domain::duration::parse_duration(raw)
        .map_err(|e| Error::config(format!("invalid duration '{raw}': {e}")))?;
    Ok(d.as_secs())
}
