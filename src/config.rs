/// Configuration management for RAGent
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "ragent=debug,tower_http=debug";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub backend: BackendConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

/// Local API listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
}

/// Local storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    /// SQLite file backing the session cache
    pub cache_db: PathBuf,
}

/// Hosted backend (identity + structured store) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BackendConfig {
    Hosted {
        /// Project URL, e.g. https://xyz.supabase.co
        url: String,
        /// Public API key sent as `apikey`
        anon_key: String,
    },
    /// In-process identity provider and store, for development
    Memory,
}

impl BackendConfig {
    /// Identity endpoints base URL
    pub fn auth_url(&self) -> Option<String> {
        match self {
            BackendConfig::Hosted { url, .. } => {
                Some(format!("{}/auth/v1", url.trim_end_matches('/')))
            }
            BackendConfig::Memory => None,
        }
    }

    /// Row endpoints base URL
    pub fn rest_url(&self) -> Option<String> {
        match self {
            BackendConfig::Hosted { url, .. } => {
                Some(format!("{}/rest/v1", url.trim_end_matches('/')))
            }
            BackendConfig::Memory => None,
        }
    }
}

/// Chat webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub webhook_url: String,
    pub user_agent: String,
    /// No deadline when unset
    pub request_timeout_secs: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, e.g. `ragent=debug,tower_http=info`
    pub level: String,
}

impl LoggingConfig {
    /// Tracing filter for the configured level
    ///
    /// Unparsable directives fall back to [`DEFAULT_LOG_FILTER`].
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    }
}

/// Chat timeout in seconds; unset or blank means no deadline
fn parse_timeout(raw: Option<String>) -> AppResult<Option<u64>> {
    let raw = match raw {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Ok(None),
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(secs)),
        _ => Err(AppError::Validation(format!(
            "Invalid chat timeout: {}",
            raw
        ))),
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("RAGENT_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("RAGENT_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;

        let data_directory: PathBuf = env::var("RAGENT_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let cache_db = env::var("RAGENT_CACHE_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("cache.sqlite"));

        let backend = if let Ok(url) = env::var("RAGENT_BACKEND_URL") {
            BackendConfig::Hosted {
                url,
                anon_key: env::var("RAGENT_BACKEND_ANON_KEY").map_err(|_| {
                    AppError::Validation("Backend anon key required".to_string())
                })?,
            }
        } else {
            BackendConfig::Memory
        };

        let webhook_url = env::var("RAGENT_CHAT_WEBHOOK_URL")
            .map_err(|_| AppError::Validation("Chat webhook URL required".to_string()))?;
        let user_agent = env::var("RAGENT_USER_AGENT")
            .unwrap_or_else(|_| format!("RAGent/{}", env!("CARGO_PKG_VERSION")));
        let request_timeout_secs = parse_timeout(env::var("RAGENT_CHAT_TIMEOUT_SECS").ok())?;

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());

        Ok(AppConfig {
            service: ServiceConfig { hostname, port },
            storage: StorageConfig {
                data_directory,
                cache_db,
            },
            backend,
            chat: ChatConfig {
                webhook_url,
                user_agent,
                request_timeout_secs,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        let url = &self.chat.webhook_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AppError::Validation(format!(
                "Chat webhook URL must be http(s): {}",
                url
            )));
        }

        if let BackendConfig::Hosted { url, anon_key } = &self.backend {
            if url.is_empty() || anon_key.is_empty() {
                return Err(AppError::Validation(
                    "Backend URL and anon key cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
