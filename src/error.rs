//! Error types
//!
//! Crate-wide error type. Subsystems with their own failure modes
//! (registry delivery, configuration) keep dedicated enums and convert into
//! this one at the boundary.

use crate::registry::RegistryError;
use crate::router::RouterClosed;
use crate::server::config::ConfigError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Debug)]
pub enum Error {
    /// I/O failure (socket bind, audio file write)
    Io(std::io::Error),
    /// Queue store query failed
    Store(sqlx::Error),
    /// Speech synthesis request failed
    Speech(reqwest::Error),
    /// Speech backend answered with a non-success status
    SpeechRejected(u16),
    /// Connection registry failure
    Registry(RegistryError),
    /// Broadcast router is not running
    Broadcast(RouterClosed),
    /// Invalid configuration
    Config(ConfigError),
    /// Request failed validation
    Validation(String),
    /// Referenced record does not exist
    NotFound(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Store(e) => write!(f, "Store error: {}", e),
            Error::Speech(e) => write!(f, "Speech synthesis error: {}", e),
            Error::SpeechRejected(status) => {
                write!(f, "Speech backend rejected request with status {}", status)
            }
            Error::Registry(e) => write!(f, "Registry error: {}", e),
            Error::Broadcast(e) => write!(f, "{}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e),
            Error::Validation(msg) => write!(f, "Invalid request: {}", msg),
            Error::NotFound(what) => write!(f, "Not found: {}", what),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Store(e) => Some(e),
            Error::Speech(e) => Some(e),
            Error::Registry(e) => Some(e),
            Error::Broadcast(e) => Some(e),
            Error::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Store(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Speech(e)
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Error::Registry(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<RouterClosed> for Error {
    fn from(e: RouterClosed) -> Self {
        Error::Broadcast(e)
    }
}
