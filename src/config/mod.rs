//! Configuration for the order server and the storefront sync client.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;

/// Backend the server keeps its orders in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    JsonFile,
    Sqlite,
}

impl StorageKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" | "file" => Some(StorageKind::JsonFile),
            "sqlite" => Some(StorageKind::Sqlite),
            _ => None,
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication
    pub api_psk: Option<String>,
    /// Admin login user name
    pub admin_username: String,
    /// Admin login password; admin login is disabled when unset
    pub admin_password: Option<String>,
    /// Lifetime of an admin session
    pub session_ttl: Duration,
    /// Which backend stores the orders
    pub storage: StorageKind,
    /// Path to the JSON orders file
    pub data_path: PathBuf,
    /// Path to the SQLite database when `storage` is sqlite
    pub db_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of text
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("SHOP_API_PSK").ok().filter(|s| !s.is_empty());
        let admin_username =
            env::var("SHOP_ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
        let admin_password = env::var("SHOP_ADMIN_PASSWORD")
            .ok()
            .filter(|s| !s.is_empty());

        let session_ttl = Duration::from_secs(parse_var("SHOP_SESSION_TTL_SECS", 3600)?);

        let storage = match env::var("SHOP_STORAGE") {
            Ok(value) => StorageKind::parse(&value).ok_or_else(|| {
                AppError::Internal(format!("Invalid SHOP_STORAGE value: {}", value))
            })?,
            Err(_) => StorageKind::JsonFile,
        };

        let data_path = env::var("SHOP_DATA_PATH")
            .unwrap_or_else(|_| "./data/orders.json".to_string())
            .into();

        let db_path = env::var("SHOP_DB_PATH")
            .unwrap_or_else(|_| "./data/orders.sqlite".to_string())
            .into();

        let bind_addr = env::var("SHOP_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid SHOP_BIND_ADDR format: {}", e)))?;

        let log_level = env::var("SHOP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_json = match env::var("SHOP_LOG_FORMAT").as_deref() {
            Ok("json") => true,
            Ok("text") | Err(_) => false,
            Ok(other) => {
                return Err(AppError::Internal(format!(
                    "Invalid SHOP_LOG_FORMAT value: {}",
                    other
                )))
            }
        };

        Ok(Self {
            api_psk,
            admin_username,
            admin_password,
            session_ttl,
            storage,
            data_path,
            db_path,
            bind_addr,
            log_level,
            log_json,
        })
    }
}

/// Storefront client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the order server
    pub server_url: String,
    /// API key sent with admin requests, if any
    pub api_key: Option<String>,
    /// Path to the client's local SQLite store
    pub local_db_path: PathBuf,
    /// Upper bound for every network call
    pub request_timeout: Duration,
    /// First retry delay of the background sync worker
    pub backoff_base: Duration,
    /// Largest retry delay of the background sync worker
    pub backoff_max: Duration,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let server_url = env::var("SHOP_SERVER_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        let api_key = env::var("SHOP_API_PSK").ok().filter(|s| !s.is_empty());
        let local_db_path = env::var("SHOP_LOCAL_DB_PATH")
            .unwrap_or_else(|_| "./data/local.sqlite".to_string())
            .into();

        let request_timeout = Duration::from_secs(parse_var("SHOP_CLIENT_TIMEOUT_SECS", 10)?);
        let backoff_base = Duration::from_secs(parse_var("SHOP_SYNC_BACKOFF_BASE_SECS", 5)?);
        let backoff_max = Duration::from_secs(parse_var("SHOP_SYNC_BACKOFF_MAX_SECS", 300)?);

        if backoff_base.is_zero() || backoff_max < backoff_base {
            return Err(AppError::Internal(
                "SHOP_SYNC_BACKOFF_BASE_SECS must be positive and not exceed SHOP_SYNC_BACKOFF_MAX_SECS"
                    .to_string(),
            ));
        }

        Ok(Self {
            server_url,
            api_key,
            local_db_path,
            request_timeout,
            backoff_base,
            backoff_max,
        })
    }
}

fn parse_var(name: &str, default: u64) -> Result<u64, AppError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid {} value '{}': {}", name, value, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::sync::Mutex;

    // Tests in this module mutate process-wide environment variables
    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const VARS: [&str; 16] = [
        "SHOP_API_PSK",
        "SHOP_ADMIN_USERNAME",
        "SHOP_ADMIN_PASSWORD",
        "SHOP_SESSION_TTL_SECS",
        "SHOP_STORAGE",
        "SHOP_DATA_PATH",
        "SHOP_DB_PATH",
        "SHOP_BIND_ADDR",
        "SHOP_LOG_LEVEL",
        "SHOP_LOG_FORMAT",
        "SHOP_SERVER_URL",
        "SHOP_LOCAL_DB_PATH",
        "SHOP_CLIENT_TIMEOUT_SECS",
        "SHOP_SYNC_BACKOFF_BASE_SECS",
        "SHOP_SYNC_BACKOFF_MAX_SECS",
        "RUST_LOG",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let config = Config::from_env().unwrap();

        assert!(config.api_psk.is_none());
        assert!(config.admin_password.is_none());
        assert_eq!(config.admin_username, "admin");
        assert_eq!(config.session_ttl, Duration::from_secs(3600));
        assert_eq!(config.storage, StorageKind::JsonFile);
        assert_eq!(config.data_path, PathBuf::from("./data/orders.json"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:3000");
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        env::set_var("SHOP_BIND_ADDR", "not-an-address");
        assert!(Config::from_env().is_err());
        env::remove_var("SHOP_BIND_ADDR");

        env::set_var("SHOP_STORAGE", "mongo");
        assert!(Config::from_env().is_err());
        env::set_var("SHOP_LOG_FORMAT", "xml");
        assert!(Config::from_env().is_err());
        env::set_var("SHOP_LOG_FORMAT", "json");
        assert!(Config::from_env().unwrap().log_json);
        env::remove_var("SHOP_LOG_FORMAT");

        env::set_var("SHOP_STORAGE", "SQLite");
        assert_eq!(Config::from_env().unwrap().storage, StorageKind::Sqlite);
        clear_env();
    }

    #[test]
    fn test_client_config() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        env::set_var("SHOP_SERVER_URL", "http://shop.local:8080/");
        env::set_var("SHOP_CLIENT_TIMEOUT_SECS", "3");
        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.server_url, "http://shop.local:8080");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.backoff_base, Duration::from_secs(5));
        assert_eq!(config.backoff_max, Duration::from_secs(300));

        env::set_var("SHOP_SYNC_BACKOFF_BASE_SECS", "600");
        assert!(ClientConfig::from_env().is_err());
        clear_env();
    }
}
