use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub record_store: RecordStoreConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub ability: AbilityConfig,
    pub relay: RelayConfig,
}

/// Where finished assessments are submitted
#[derive(Debug, Clone)]
pub struct RecordStoreConfig {
    pub base_url: String,
}

/// Answer store database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub namespace: String,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request and submission retry configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Ability aggregation options
#[derive(Debug, Clone, Default)]
pub struct AbilityConfig {
    /// Seed for the opt-in presentation jitter. `None` keeps aggregation deterministic.
    pub jitter_seed: Option<u64>,
}

/// Save-data relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind: SocketAddr,
    pub sheets_base_url: String,
    pub api_key: Option<String>,
    pub sheet_id: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let record_store = RecordStoreConfig {
            base_url: env::var("RECORD_STORE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/assessment.db".to_string()),
            ),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            namespace: env::var("ANSWER_NAMESPACE").unwrap_or_else(|_| "assessment".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let defaults = RequestConfig::default();
        let request = RequestConfig {
            timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_ms),
            max_retries: env::var("SUBMIT_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            retry_delay_ms: env::var("SUBMIT_RETRY_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retry_delay_ms),
        };

        let ability = AbilityConfig {
            jitter_seed: env::var("ABILITY_JITTER_SEED")
                .ok()
                .and_then(|s| s.parse().ok()),
        };

        let bind_raw = env::var("RELAY_BIND").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let relay = RelayConfig {
            bind: bind_raw.parse().map_err(|_| AppError::Config {
                message: format!("RELAY_BIND is not a socket address: {}", bind_raw),
            })?,
            sheets_base_url: env::var("SHEETS_BASE_URL")
                .unwrap_or_else(|_| "https://sheets.googleapis.com".to_string()),
            api_key: non_empty_var("GOOGLE_API_KEY"),
            sheet_id: non_empty_var("GOOGLE_SHEET_ID"),
        };

        Ok(Config {
            record_store,
            database,
            logging,
            request,
            ability,
            relay,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10000,
            max_retries: 3,
            retry_delay_ms: 5000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/assessment.db"),
            max_connections: 5,
            namespace: "assessment".to_string(),
        }
    }
}

impl RelayConfig {
    /// Spreadsheet credentials, present only when both halves are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.api_key, &self.sheet_id) {
            (Some(key), Some(sheet)) => Some((key.as_str(), sheet.as_str())),
            _ => None,
        }
    }
}
