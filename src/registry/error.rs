//! Registry error types

use super::frame::ConnectionId;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Connection is not (or no longer) registered
    ConnectionNotFound(ConnectionId),
    /// Connection's outbound buffer is full; the client stopped reading
    ConnectionBackedUp(ConnectionId),
    /// Connection's writer has gone away
    ConnectionClosed(ConnectionId),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::ConnectionNotFound(id) => write!(f, "Connection not found: {}", id),
            RegistryError::ConnectionBackedUp(id) => {
                write!(f, "Connection outbound buffer full: {}", id)
            }
            RegistryError::ConnectionClosed(id) => write!(f, "Connection closed: {}", id),
        }
    }
}

impl std::error::Error for RegistryError {}
