//! HTTP and WebSocket server

pub mod config;
pub mod error;
pub mod handlers;
pub mod listener;
pub mod state;
pub mod ws;

pub use config::{ConfigError, DatabaseConfig, ServerConfig};
pub use error::ApiError;
pub use listener::QueueServer;
pub use state::AppState;
