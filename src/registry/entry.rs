//! Connection entry
//!
//! Per-connection state stored in the registry.

use std::net::SocketAddr;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::error::RegistryError;
use super::frame::{BroadcastFrame, ConnectionId, ConnectionScope};

/// Entry for a single live push connection
pub struct ConnectionEntry {
    /// Connection id
    pub id: ConnectionId,

    /// Display or room the connection subscribed to
    pub scope: ConnectionScope,

    /// Remote peer, when known
    pub peer_addr: Option<SocketAddr>,

    /// When the connection was registered
    pub connected_at: Instant,

    /// Outbound queue drained by the connection's writer task
    pub(super) tx: mpsc::Sender<BroadcastFrame>,
}

impl ConnectionEntry {
    pub(super) fn new(
        id: ConnectionId,
        scope: ConnectionScope,
        peer_addr: Option<SocketAddr>,
        tx: mpsc::Sender<BroadcastFrame>,
    ) -> Self {
        Self {
            id,
            scope,
            peer_addr,
            connected_at: Instant::now(),
            tx,
        }
    }

    /// Queue a frame for this connection without waiting
    ///
    /// A closed writer or a full buffer both count as a failed write.
    pub fn try_send(&self, frame: BroadcastFrame) -> Result<(), RegistryError> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => RegistryError::ConnectionBackedUp(self.id),
            TrySendError::Closed(_) => RegistryError::ConnectionClosed(self.id),
        })
    }

    /// Whether the writer side has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Public snapshot of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub scope: ConnectionScope,
    pub peer_addr: Option<SocketAddr>,
}

impl From<&ConnectionEntry> for ConnectionInfo {
    fn from(entry: &ConnectionEntry) -> Self {
        Self {
            id: entry.id,
            scope: entry.scope.clone(),
            peer_addr: entry.peer_addr,
        }
    }
}
