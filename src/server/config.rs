//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use sqlx::mysql::MySqlConnectOptions;

use crate::registry::{DeliveryMode, RegistryConfig};
use crate::status::DEFAULT_REVERSION_DELAY;
use crate::tts::DEFAULT_TTS_TIMEOUT;

/// Invalid configuration value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable held a value that could not be parsed
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue { key, value, reason } => {
                write!(f, "invalid {}={:?}: {}", key, value, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Hospital database connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    /// Pool size
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 3306,
            username: "root".into(),
            password: String::new(),
            database: "sik".into(),
            max_connections: 10,
        }
    }
}

impl DatabaseConfig {
    /// sqlx connect options for these settings
    pub fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.database)
    }
}

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Public base URL, used only in log output
    pub app_url: Option<String>,

    /// Hospital database
    pub database: DatabaseConfig,

    /// Origin allowed by CORS
    pub cors_origin: String,

    /// Directory served under `/assets`
    pub assets_dir: PathBuf,

    /// Where announcement audio is written (served under `/assets/audio`)
    pub audio_dir: PathBuf,

    /// Built single-page app served for every other path
    pub spa_dir: PathBuf,

    /// Speech language code
    pub tts_language: String,

    /// Longest a call waits for its announcement audio
    pub tts_timeout: Duration,

    /// How long a called visit stays `BeingCalled`
    pub reversion_delay: Duration,

    /// Maximum concurrent push connections (0 = unlimited)
    pub max_connections: usize,

    /// Push connection registry settings
    pub registry: RegistryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            app_url: None,
            database: DatabaseConfig::default(),
            cors_origin: "http://localhost:3000".into(),
            assets_dir: PathBuf::from("assets"),
            audio_dir: PathBuf::from("assets/audio"),
            spa_dir: PathBuf::from("react-app/build"),
            tts_language: "id".into(),
            tts_timeout: DEFAULT_TTS_TIMEOUT,
            reversion_delay: DEFAULT_REVERSION_DELAY,
            max_connections: 0, // Unlimited
            registry: RegistryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; unset or blank keys keep defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(port) = get("PORT") {
            config.bind_addr.set_port(parse("PORT", &port)?);
        }
        config.app_url = get("APP_URL");

        if let Some(host) = get("DB_HOST") {
            config.database.host = host;
        }
        if let Some(port) = get("DB_PORT") {
            config.database.port = parse("DB_PORT", &port)?;
        }
        if let Some(username) = get("DB_USERNAME") {
            config.database.username = username;
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            config.database.password = password;
        }
        if let Some(database) = get("DB_DATABASE") {
            config.database.database = database;
        }
        if let Some(max) = get("DB_MAX_CONNECTIONS") {
            config.database.max_connections = parse("DB_MAX_CONNECTIONS", &max)?;
        }

        if let Some(origin) = get("CORS_ORIGIN") {
            config.cors_origin = origin;
        }
        if let Some(dir) = get("ASSETS_DIR") {
            config.assets_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("AUDIO_DIR") {
            config.audio_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("SPA_DIR") {
            config.spa_dir = PathBuf::from(dir);
        }
        if let Some(language) = get("TTS_LANGUAGE") {
            config.tts_language = language;
        }
        if let Some(secs) = get("TTS_TIMEOUT_SECS") {
            config.tts_timeout = Duration::from_secs(parse("TTS_TIMEOUT_SECS", &secs)?);
        }
        if let Some(secs) = get("CALL_REVERSION_SECS") {
            config.reversion_delay = Duration::from_secs(parse("CALL_REVERSION_SECS", &secs)?);
        }
        if let Some(max) = get("MAX_CONNECTIONS") {
            config.max_connections = parse("MAX_CONNECTIONS", &max)?;
        }
        if let Some(size) = get("CONNECTION_BUFFER") {
            config.registry = config
                .registry
                .connection_buffer(parse("CONNECTION_BUFFER", &size)?);
        }
        if let Some(mode) = get("DELIVERY_MODE") {
            config.registry = config
                .registry
                .delivery_mode(parse::<DeliveryMode>("DELIVERY_MODE", &mode)?);
        }

        Ok(config)
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set database settings
    pub fn database(mut self, database: DatabaseConfig) -> Self {
        self.database = database;
        self
    }

    /// Set the CORS origin
    pub fn cors_origin(mut self, origin: impl Into<String>) -> Self {
        self.cors_origin = origin.into();
        self
    }

    /// Set the audio output directory
    pub fn audio_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.audio_dir = dir.into();
        self
    }

    /// Set the reversion delay
    pub fn reversion_delay(mut self, delay: Duration) -> Self {
        self.reversion_delay = delay;
        self
    }

    /// Set the announcement audio timeout
    pub fn tts_timeout(mut self, timeout: Duration) -> Self {
        self.tts_timeout = timeout;
        self
    }

    /// Set maximum push connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the registry configuration
    pub fn registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.cors_origin, "http://localhost:3000");
        assert_eq!(config.audio_dir, PathBuf::from("assets/audio"));
        assert_eq!(config.tts_language, "id");
        assert_eq!(config.tts_timeout, Duration::from_secs(10));
        assert_eq!(config.reversion_delay, Duration::from_secs(300));
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.registry.delivery_mode, DeliveryMode::All);
    }

    #[test]
    fn test_from_lookup() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("PORT", "9000"),
            ("APP_URL", "http://board.local"),
            ("DB_HOST", "db"),
            ("DB_PORT", "3307"),
            ("DB_USERNAME", "sik"),
            ("DB_PASSWORD", "rahasia"),
            ("DB_DATABASE", "khanza"),
            ("CALL_REVERSION_SECS", "60"),
            ("DELIVERY_MODE", "scoped"),
            ("AUDIO_DIR", "/var/audio"),
            ("TTS_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.app_url.as_deref(), Some("http://board.local"));
        assert_eq!(config.database.host, "db");
        assert_eq!(config.database.port, 3307);
        assert_eq!(config.database.username, "sik");
        assert_eq!(config.database.password, "rahasia");
        assert_eq!(config.database.database, "khanza");
        assert_eq!(config.reversion_delay, Duration::from_secs(60));
        assert_eq!(config.registry.delivery_mode, DeliveryMode::Scoped);
        assert_eq!(config.audio_dir, PathBuf::from("/var/audio"));
        assert_eq!(config.tts_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_blank_values_keep_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[("PORT", " "), ("DB_HOST", "")])).unwrap();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.database.host, "localhost");
    }

    #[test]
    fn test_invalid_number() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        let ConfigError::InvalidValue { key, value, .. } = err;

        assert_eq!(key, "PORT");
        assert_eq!(value, "eighty");
    }

    #[test]
    fn test_invalid_delivery_mode() {
        let err = ServerConfig::from_lookup(lookup(&[("DELIVERY_MODE", "nearest")])).unwrap_err();
        assert!(err.to_string().contains("DELIVERY_MODE"));
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:8081".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .cors_origin("http://kiosk")
            .audio_dir("/tmp/audio")
            .reversion_delay(Duration::from_secs(5))
            .tts_timeout(Duration::from_secs(2))
            .max_connections(50)
            .registry(RegistryConfig::default().connection_buffer(8));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.cors_origin, "http://kiosk");
        assert_eq!(config.audio_dir, PathBuf::from("/tmp/audio"));
        assert_eq!(config.reversion_delay, Duration::from_secs(5));
        assert_eq!(config.tts_timeout, Duration::from_secs(2));
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.registry.connection_buffer, 8);
    }
}
