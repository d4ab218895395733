//! Configuration module for the campus sync service.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::AppError;
use crate::scheduler::BackgroundStatus;

/// Spreadsheet shared by the schedule, alerts and shared todo tabs.
pub const DEFAULT_SHEET_ID: &str = "1DWzYbI3X_P0jazkrj180TlM-oUhh7EAIoWt2WekQpEw";
pub const DEFAULT_SHEET_BASE_URL: &str = "https://opensheet.elk.sh";

/// Output format of the log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(AppError::Validation(format!(
                "Invalid CAMPUS_LOG_FORMAT: {}",
                other
            ))),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the tab reader service
    pub sheet_base_url: String,
    /// Spreadsheet identifier
    pub sheet_id: String,
    /// Pre-shared key for API authentication (optional)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log line format
    pub log_format: LogFormat,
    /// Minimum interval between background ticks (best effort)
    pub poll_interval: Duration,
    /// Per-request network timeout
    pub http_timeout: Duration,
    /// Background execution policy reported by the host
    pub background_policy: BackgroundStatus,
    /// Treat malformed session times as never active
    pub strict_times: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let sheet_base_url = env::var("CAMPUS_SHEET_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_SHEET_BASE_URL.to_string());

        let sheet_id = env::var("CAMPUS_SHEET_ID").unwrap_or_else(|_| DEFAULT_SHEET_ID.to_string());

        let api_psk = env::var("CAMPUS_API_PSK").ok().filter(|psk| !psk.is_empty());

        let db_path = env::var("CAMPUS_DB_PATH")
            .unwrap_or_else(|_| "./data/campus.sqlite".to_string())
            .into();

        let bind_addr = env::var("CAMPUS_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| AppError::Validation(format!("Invalid CAMPUS_BIND_ADDR: {}", e)))?;

        let log_level = env::var("CAMPUS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("CAMPUS_LOG_FORMAT") {
            Ok(value) => value.parse()?,
            Err(_) => LogFormat::Text,
        };

        let poll_interval = Duration::from_secs(parse_u64("CAMPUS_POLL_INTERVAL_SECS", 180)?);
        let http_timeout = Duration::from_secs(parse_u64("CAMPUS_HTTP_TIMEOUT_SECS", 15)?);

        let background_policy = match env::var("CAMPUS_BACKGROUND_POLICY") {
            Ok(value) => value.parse()?,
            Err(_) => BackgroundStatus::Available,
        };

        let strict_times = match env::var("CAMPUS_STRICT_TIMES") {
            Ok(value) => parse_bool("CAMPUS_STRICT_TIMES", &value)?,
            Err(_) => false,
        };

        Ok(Self {
            sheet_base_url,
            sheet_id,
            api_psk,
            db_path,
            bind_addr,
            log_level,
            log_format,
            poll_interval,
            http_timeout,
            background_policy,
            strict_times,
        })
    }
}

fn parse_u64(name: &str, default: u64) -> Result<u64, AppError> {
    match env::var(name) {
        Ok(value) => {
            let parsed: u64 = value
                .trim()
                .parse()
                .map_err(|_| AppError::Validation(format!("Invalid {}: {}", name, value)))?;
            if parsed == 0 {
                return Err(AppError::Validation(format!("{} must be positive", name)));
            }
            Ok(parsed)
        }
        Err(_) => Ok(default),
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(AppError::Validation(format!("Invalid {}: {}", name, value))),
    }
}
