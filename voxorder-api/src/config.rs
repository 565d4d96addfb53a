//! API Configuration Module
//!
//! Server, webhook and database settings. Everything is loaded from
//! environment variables with development-friendly defaults; production
//! deployments are checked by [`validate_for_production`].

use std::net::SocketAddr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use secrecy::SecretString;
use tokio_postgres::NoTls;

use crate::error::{ApiError, ApiResult};

/// Default signature header sent by the voice provider.
pub const DEFAULT_SIGNATURE_HEADER: &str = "x-signature";

/// Default request body limit (1 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// Which persistence implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// In-process, non-durable. Development only.
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(StoreBackend::Postgres),
            "memory" | "in-memory" => Some(StoreBackend::Memory),
            _ => None,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind host.
    pub bind_host: String,

    /// Bind port.
    pub port: u16,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,

    /// Deployment environment name (`development`, `staging`, `production`).
    pub environment: String,

    /// Persistence backend.
    pub store_backend: StoreBackend,

    /// User ids seeded into the in-memory directory.
    pub dev_user_ids: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            environment: "development".to_string(),
            store_backend: StoreBackend::Postgres,
            dev_user_ids: Vec::new(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `VOXORDER_API_BIND`: Bind host (default: 0.0.0.0)
    /// - `PORT` or `VOXORDER_API_PORT`: Bind port (default: 3000)
    /// - `VOXORDER_MAX_BODY_BYTES`: Request body limit (default: 1048576)
    /// - `VOXORDER_ENVIRONMENT`: Deployment environment (default: development)
    /// - `VOXORDER_STORE_BACKEND`: `postgres` or `memory` (default: postgres)
    /// - `VOXORDER_DEV_USER_IDS`: Comma-separated ids for the memory backend
    pub fn from_env() -> ApiResult<Self> {
        let defaults = Self::default();

        let port = match std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("VOXORDER_API_PORT").ok())
        {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ApiError::invalid_config(format!("Invalid port value: {}", raw)))?,
            None => defaults.port,
        };

        let store_backend = match std::env::var("VOXORDER_STORE_BACKEND").ok() {
            Some(raw) => StoreBackend::parse(&raw).ok_or_else(|| {
                ApiError::invalid_config(format!("Unknown store backend: {}", raw))
            })?,
            None => defaults.store_backend,
        };

        let dev_user_ids = std::env::var("VOXORDER_DEV_USER_IDS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|id| id.trim().to_string())
                    .filter(|id| !id.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_host: std::env::var("VOXORDER_API_BIND").unwrap_or(defaults.bind_host),
            port,
            max_body_bytes: std::env::var("VOXORDER_MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .filter(|limit| *limit > 0)
                .unwrap_or(defaults.max_body_bytes),
            environment: std::env::var("VOXORDER_ENVIRONMENT").unwrap_or(defaults.environment),
            store_backend,
            dev_user_ids,
        })
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Socket address to listen on.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>()
            .map_err(|e| ApiError::invalid_config(format!("Invalid bind address {}: {}", addr, e)))
    }
}

// ============================================================================
// WEBHOOK CONFIGURATION
// ============================================================================

/// Callback verification and extraction settings.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Pre-shared HMAC secret. `None` rejects every callback.
    pub secret: Option<SecretString>,

    /// Header carrying the hex signature.
    pub signature_header: String,

    /// Zone in which "today" is evaluated for spoken delivery times.
    pub delivery_offset: FixedOffset,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: None,
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            delivery_offset: Utc.fix(),
        }
    }
}

impl WebhookConfig {
    /// Create WebhookConfig from environment variables.
    ///
    /// Environment variables:
    /// - `VOXORDER_WEBHOOK_SECRET`: HMAC-SHA256 secret (empty counts as unset)
    /// - `VOXORDER_SIGNATURE_HEADER`: Signature header name (default: x-signature)
    /// - `VOXORDER_DELIVERY_UTC_OFFSET_MINUTES`: Delivery zone offset (default: 0)
    pub fn from_env() -> ApiResult<Self> {
        let secret = std::env::var("VOXORDER_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .map(SecretString::from);

        let signature_header = std::env::var("VOXORDER_SIGNATURE_HEADER")
            .ok()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.to_string());

        let delivery_offset = match std::env::var("VOXORDER_DELIVERY_UTC_OFFSET_MINUTES").ok() {
            Some(raw) => parse_offset_minutes(&raw)?,
            None => Utc.fix(),
        };

        Ok(Self {
            secret,
            signature_header,
            delivery_offset,
        })
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }
}

fn parse_offset_minutes(raw: &str) -> ApiResult<FixedOffset> {
    let minutes: i32 = raw.trim().parse().map_err(|_| {
        ApiError::invalid_config(format!("Invalid delivery UTC offset: {}", raw))
    })?;
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| ApiError::invalid_config(format!("Delivery UTC offset out of range: {}", raw)))
}

// ============================================================================
// DATABASE CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Wait timeout for a pooled connection
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "voxorder".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    ///
    /// `VOXORDER_DB_HOST`, `VOXORDER_DB_PORT`, `VOXORDER_DB_NAME`,
    /// `VOXORDER_DB_USER`, `VOXORDER_DB_PASSWORD`, `VOXORDER_DB_POOL_SIZE`,
    /// `VOXORDER_DB_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("VOXORDER_DB_HOST").unwrap_or(defaults.host),
            port: std::env::var("VOXORDER_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            dbname: std::env::var("VOXORDER_DB_NAME").unwrap_or(defaults.dbname),
            user: std::env::var("VOXORDER_DB_USER").unwrap_or(defaults.user),
            password: std::env::var("VOXORDER_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("VOXORDER_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_size),
            timeout: std::env::var("VOXORDER_DB_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> ApiResult<Pool> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool = PoolConfig::new(self.max_size);
        pool.timeouts.wait = Some(self.timeout);
        pool.timeouts.create = Some(self.timeout);
        cfg.pool = Some(pool);

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| ApiError::internal_error(format!("Failed to create pool: {}", e)))
    }
}

// ============================================================================
// PRODUCTION VALIDATION
// ============================================================================

/// Refuse to start a production deployment that cannot accept or persist
/// callbacks.
pub fn validate_for_production(api: &ApiConfig, webhook: &WebhookConfig) -> ApiResult<()> {
    if !api.is_production() {
        if !webhook.has_secret() {
            tracing::warn!("VOXORDER_WEBHOOK_SECRET is not set; every callback will be rejected");
        }
        return Ok(());
    }

    if !webhook.has_secret() {
        return Err(ApiError::invalid_config(
            "VOXORDER_WEBHOOK_SECRET must be set in production",
        ));
    }
    if api.store_backend == StoreBackend::Memory {
        return Err(ApiError::invalid_config(
            "The in-memory store backend is not allowed in production",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment is process-global; serialize tests that touch it.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert!(!config.is_production());
    }

    #[test]
    fn test_api_config_from_env() -> ApiResult<()> {
        let _lock = ENV_LOCK.lock();
        let _port = EnvVarGuard::set("PORT", Some("8081"));
        let _backend = EnvVarGuard::set("VOXORDER_STORE_BACKEND", Some("Memory"));
        let _users = EnvVarGuard::set("VOXORDER_DEV_USER_IDS", Some("a, b,,c"));
        let _limit = EnvVarGuard::set("VOXORDER_MAX_BODY_BYTES", Some("0"));

        let config = ApiConfig::from_env()?;
        assert_eq!(config.port, 8081);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.dev_user_ids, vec!["a", "b", "c"]);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        Ok(())
    }

    #[test]
    fn test_invalid_port_is_error() {
        let _lock = ENV_LOCK.lock();
        let _port = EnvVarGuard::set("PORT", Some("eighty"));
        assert!(ApiConfig::from_env().is_err());
    }

    #[test]
    fn test_unknown_backend_is_error() {
        let _lock = ENV_LOCK.lock();
        let _port = EnvVarGuard::set("PORT", None);
        let _backend = EnvVarGuard::set("VOXORDER_STORE_BACKEND", Some("sqlite"));
        assert!(ApiConfig::from_env().is_err());
    }

    #[test]
    fn test_webhook_config_from_env() -> ApiResult<()> {
        let _lock = ENV_LOCK.lock();
        let _secret = EnvVarGuard::set("VOXORDER_WEBHOOK_SECRET", Some(""));
        let _header = EnvVarGuard::set("VOXORDER_SIGNATURE_HEADER", Some("ElevenLabs-Signature"));
        let _offset = EnvVarGuard::set("VOXORDER_DELIVERY_UTC_OFFSET_MINUTES", Some("-300"));

        let config = WebhookConfig::from_env()?;
        assert!(!config.has_secret());
        assert_eq!(config.signature_header, "elevenlabs-signature");
        assert_eq!(config.delivery_offset.local_minus_utc(), -300 * 60);
        Ok(())
    }

    #[test]
    fn test_offset_out_of_range() {
        assert!(parse_offset_minutes("1440").is_err());
        assert!(parse_offset_minutes("soon").is_err());
        assert!(parse_offset_minutes("330").is_ok());
    }

    #[test]
    fn test_production_requires_secret_and_durable_store() {
        let api = ApiConfig {
            environment: "production".to_string(),
            ..ApiConfig::default()
        };
        let no_secret = WebhookConfig::default();
        assert!(validate_for_production(&api, &no_secret).is_err());

        let with_secret = WebhookConfig {
            secret: Some(SecretString::from("whsec".to_string())),
            ..WebhookConfig::default()
        };
        assert!(validate_for_production(&api, &with_secret).is_ok());

        let memory = ApiConfig {
            store_backend: StoreBackend::Memory,
            ..api
        };
        assert!(validate_for_production(&memory, &with_secret).is_err());
    }

    #[test]
    fn test_development_allows_missing_secret() {
        let api = ApiConfig {
            store_backend: StoreBackend::Memory,
            ..ApiConfig::default()
        };
        assert!(validate_for_production(&api, &WebhookConfig::default()).is_ok());
    }

    #[test]
    fn test_bind_addr() -> ApiResult<()> {
        let config = ApiConfig {
            bind_host: "127.0.0.1".to_string(),
            port: 9000,
            ..ApiConfig::default()
        };
        assert_eq!(config.bind_addr()?.to_string(), "127.0.0.1:9000");
        Ok(())
    }
}
