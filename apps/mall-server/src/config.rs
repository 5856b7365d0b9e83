//! # Server Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MALL_PORT=9000                                                     │
//! │     MALL_WECHAT_API_KEY=...                                            │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     $MALL_CONFIG, else ./mall.toml when present                        │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     0.0.0.0:8080, ./mall.db, no payment providers                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # mall.toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//! request_timeout_secs = 30
//!
//! [database]
//! path = "./mall.db"
//! max_connections = 8
//! acquire_timeout_secs = 30
//!
//! [wechat]
//! app_id = "wx8888888888888888"
//! mch_id = "1900000109"
//! api_key = "..."
//! notify_url = "https://mall.example.com/api/v1/payment/wechat/callback"
//! spbill_create_ip = "127.0.0.1"
//!
//! [alipay]
//! app_id = "2021000000000000"
//! private_key_path = "/etc/mall/alipay_app_private.pem"
//! public_key_path = "/etc/mall/alipay_public.pem"
//! notify_url = "https://mall.example.com/api/v1/payment/alipay/callback"
//! ```
//!
//! A provider section with missing credentials is skipped: the provider is
//! not registered and payments with that method are rejected.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use mall_core::provider::{Alipay, WechatPay};
use mall_core::{GatewayRegistry, ProviderError};
use mall_db::DbConfig;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "MALL_CONFIG";

/// Config file looked up in the working directory when `MALL_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "mall.toml";

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("Failed to read {provider} key file {path}: {source}")]
    KeyFile {
        provider: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.into(),
    }
}

// =============================================================================
// Sections
// =============================================================================

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Requests running longer than this are answered with 408.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for HttpSettings {
    fn default() -> Self {
        HttpSettings {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// SQLite settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./mall.db")
}

fn default_max_connections() -> u32 {
    8
}

fn default_acquire_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout(),
        }
    }
}

/// WeChat Pay merchant credentials.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct WechatSettings {
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub mch_id: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub notify_url: String,
    #[serde(default = "default_client_ip")]
    pub spbill_create_ip: String,
}

fn default_client_ip() -> String {
    "127.0.0.1".to_string()
}

impl WechatSettings {
    /// All three merchant credentials are present.
    pub fn is_configured(&self) -> bool {
        !self.app_id.is_empty() && !self.mch_id.is_empty() && !self.api_key.is_empty()
    }
}

impl std::fmt::Debug for WechatSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WechatSettings")
            .field("app_id", &self.app_id)
            .field("mch_id", &self.mch_id)
            .field("api_key", &"<redacted>")
            .field("notify_url", &self.notify_url)
            .field("spbill_create_ip", &self.spbill_create_ip)
            .finish()
    }
}

/// Alipay application credentials. Keys are read from PEM files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlipaySettings {
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    #[serde(default)]
    pub public_key_path: Option<PathBuf>,
    #[serde(default)]
    pub notify_url: String,
}

impl AlipaySettings {
    pub fn is_configured(&self) -> bool {
        !self.app_id.is_empty() && self.private_key_path.is_some() && self.public_key_path.is_some()
    }
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Complete server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub wechat: WechatSettings,

    #[serde(default)]
    pub alipay: AlipaySettings,
}

impl ServerConfig {
    /// Loads configuration: defaults, then the TOML file, then environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match config_file_path() {
            Some(path) => {
                info!(path = %path.display(), "Loading config file");
                Self::from_file(&path)?
            }
            None => {
                debug!("No config file found, using defaults");
                ServerConfig::default()
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Applies `MALL_*` overrides. `lookup` abstracts the environment so
    /// tests do not have to mutate process state.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("MALL_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("MALL_PORT") {
            self.server.port = parse_env("MALL_PORT", &port)?;
        }
        if let Some(secs) = lookup("MALL_REQUEST_TIMEOUT_SECS") {
            self.server.request_timeout_secs = parse_env("MALL_REQUEST_TIMEOUT_SECS", &secs)?;
        }

        if let Some(path) = lookup("MALL_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(max) = lookup("MALL_DB_MAX_CONNECTIONS") {
            self.database.max_connections = parse_env("MALL_DB_MAX_CONNECTIONS", &max)?;
        }

        if let Some(v) = lookup("MALL_WECHAT_APP_ID") {
            self.wechat.app_id = v;
        }
        if let Some(v) = lookup("MALL_WECHAT_MCH_ID") {
            self.wechat.mch_id = v;
        }
        if let Some(v) = lookup("MALL_WECHAT_API_KEY") {
            self.wechat.api_key = v;
        }
        if let Some(v) = lookup("MALL_WECHAT_NOTIFY_URL") {
            self.wechat.notify_url = v;
        }
        if let Some(v) = lookup("MALL_CLIENT_IP") {
            self.wechat.spbill_create_ip = v;
        }

        if let Some(v) = lookup("MALL_ALIPAY_APP_ID") {
            self.alipay.app_id = v;
        }
        if let Some(v) = lookup("MALL_ALIPAY_PRIVATE_KEY_PATH") {
            self.alipay.private_key_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("MALL_ALIPAY_PUBLIC_KEY_PATH") {
            self.alipay.public_key_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("MALL_ALIPAY_NOTIFY_URL") {
            self.alipay.notify_url = v;
        }

        Ok(())
    }

    /// Rejects values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(invalid("server.port", "must not be 0"));
        }
        if self.server.request_timeout_secs == 0 {
            return Err(invalid("server.request_timeout_secs", "must be positive"));
        }
        if self.database.max_connections == 0 {
            return Err(invalid("database.max_connections", "must be positive"));
        }
        if self.database.acquire_timeout_secs == 0 {
            return Err(invalid("database.acquire_timeout_secs", "must be positive"));
        }
        if self.wechat.is_configured() {
            validate_notify_url("wechat.notify_url", &self.wechat.notify_url)?;
        }
        if self.alipay.is_configured() {
            validate_notify_url("alipay.notify_url", &self.alipay.notify_url)?;
        }
        Ok(())
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone())
            .max_connections(self.database.max_connections)
            .acquire_timeout(Duration::from_secs(self.database.acquire_timeout_secs))
    }

    /// Builds a gateway for every provider whose credentials are present.
    pub fn build_gateways(&self) -> Result<GatewayRegistry, ConfigError> {
        let mut registry = GatewayRegistry::new();

        if self.wechat.is_configured() {
            let wechat = WechatPay::new(
                self.wechat.app_id.clone(),
                self.wechat.mch_id.clone(),
                self.wechat.api_key.clone(),
                self.wechat.notify_url.clone(),
                self.wechat.spbill_create_ip.clone(),
            )?;
            registry = registry.register(wechat);
            info!(app_id = %self.wechat.app_id, "WeChat Pay enabled");
        } else {
            warn!("WeChat Pay credentials missing, provider disabled");
        }

        if let (true, Some(private_path), Some(public_path)) = (
            self.alipay.is_configured(),
            &self.alipay.private_key_path,
            &self.alipay.public_key_path,
        ) {
            let private_pem = read_key_file(private_path)?;
            let public_pem = read_key_file(public_path)?;
            let alipay = Alipay::from_pem(
                self.alipay.app_id.clone(),
                &private_pem,
                &public_pem,
                self.alipay.notify_url.clone(),
            )?;
            registry = registry.register(alipay);
            info!(app_id = %self.alipay.app_id, "Alipay enabled");
        } else {
            warn!("Alipay credentials missing, provider disabled");
        }

        Ok(registry)
    }
}

fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    local.exists().then_some(local)
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, format!("'{}': {}", value, e)))
}

fn validate_notify_url(key: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(invalid(key, format!("'{}' is not an http(s) URL", url)))
    }
}

fn read_key_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::KeyFile {
        provider: "alipay",
        path: path.to_path_buf(),
        source,
    })
}

// =============================================================================
// Tests
// =============================================================================
