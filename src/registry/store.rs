//! Connection registry implementation
//!
//! Tracks every live push connection and fans frames out to them.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, RwLock};

use super::config::{DeliveryMode, RegistryConfig};
use super::entry::{ConnectionEntry, ConnectionInfo};
use super::error::RegistryError;
use super::frame::{BroadcastFrame, ConnectionId, ConnectionScope};
use crate::stats::{BroadcastCounters, BroadcastStats, DeliveryReport};

/// Handle returned to a connection task on registration
#[derive(Debug)]
pub struct Registration {
    /// Id to unregister with
    pub id: ConnectionId,
    /// Frames addressed to this connection
    pub rx: mpsc::Receiver<BroadcastFrame>,
}

/// Central registry for all live push connections
///
/// Register/unregister come from the connection tasks, iteration comes from
/// the broadcast router. The write lock is held for the whole fan-out so a
/// concurrent unregister waits until delivery is done.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, ConnectionEntry>>,
    next_id: AtomicU64,
    counters: BroadcastCounters,
    config: RegistryConfig,
}

impl ConnectionRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            counters: BroadcastCounters::new(),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a connection under a scope
    pub async fn register(
        &self,
        scope: ConnectionScope,
        peer_addr: Option<SocketAddr>,
    ) -> Registration {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.config.connection_buffer);

        let mut connections = self.connections.write().await;
        connections.insert(id, ConnectionEntry::new(id, scope.clone(), peer_addr, tx));
        self.counters.record_connection();

        tracing::info!(
            connection = %id,
            scope = %scope,
            peer = ?peer_addr,
            connections = connections.len(),
            "Connection registered"
        );

        Registration { id, rx }
    }

    /// Remove a connection
    ///
    /// Returns false if it was already gone (e.g. dropped by a failed broadcast).
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(&id);

        if let Some(ref entry) = removed {
            tracing::info!(
                connection = %id,
                scope = %entry.scope,
                connections = connections.len(),
                "Connection unregistered"
            );
        }

        removed.is_some()
    }

    /// Send one frame to one connection
    ///
    /// A failed write removes the connection.
    pub async fn send_to(
        &self,
        id: ConnectionId,
        frame: BroadcastFrame,
    ) -> Result<(), RegistryError> {
        let mut connections = self.connections.write().await;
        let entry = connections
            .get(&id)
            .ok_or(RegistryError::ConnectionNotFound(id))?;

        if let Err(e) = entry.try_send(frame) {
            connections.remove(&id);
            tracing::warn!(connection = %id, error = %e, "Write failed, connection dropped");
            return Err(e);
        }

        Ok(())
    }

    /// Apply `deliver` to every live connection
    ///
    /// Connections for which `deliver` fails are removed; delivery continues
    /// with the rest. No ordering among connections.
    pub async fn for_each_all<F>(&self, deliver: F) -> DeliveryReport
    where
        F: FnMut(&ConnectionEntry) -> Result<(), RegistryError>,
    {
        self.for_each_matching(|_| true, deliver).await
    }

    /// Apply `deliver` to live connections whose scope satisfies `in_scope`
    pub async fn for_each_in_scope<P, F>(&self, in_scope: P, deliver: F) -> DeliveryReport
    where
        P: Fn(&ConnectionScope) -> bool,
        F: FnMut(&ConnectionEntry) -> Result<(), RegistryError>,
    {
        self.for_each_matching(in_scope, deliver).await
    }

    async fn for_each_matching<P, F>(&self, in_scope: P, mut deliver: F) -> DeliveryReport
    where
        P: Fn(&ConnectionScope) -> bool,
        F: FnMut(&ConnectionEntry) -> Result<(), RegistryError>,
    {
        let mut connections = self.connections.write().await;
        let mut report = DeliveryReport::default();

        connections.retain(|id, entry| {
            if !in_scope(&entry.scope) {
                report.skipped += 1;
                return true;
            }

            match deliver(entry) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(e) => {
                    report.dropped += 1;
                    tracing::warn!(
                        connection = %id,
                        scope = %entry.scope,
                        error = %e,
                        "Write failed, connection dropped"
                    );
                    false
                }
            }
        });

        report
    }

    /// Fan a frame out according to `mode`
    pub async fn broadcast(&self, frame: &BroadcastFrame, mode: DeliveryMode) -> DeliveryReport {
        let report = match mode {
            DeliveryMode::All => self.for_each_all(|entry| entry.try_send(frame.clone())).await,
            DeliveryMode::Scoped => {
                self.for_each_in_scope(
                    |scope| frame.addressed_to(scope),
                    |entry| entry.try_send(frame.clone()),
                )
                .await
            }
        };

        self.counters.record_broadcast(&report);
        report
    }

    /// Number of live connections
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether a connection is still registered
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    /// Snapshot of live connections
    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        let connections = self.connections.read().await;
        let mut infos: Vec<ConnectionInfo> =
            connections.values().map(ConnectionInfo::from).collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    /// Current counters
    pub async fn stats(&self) -> BroadcastStats {
        let connections = self.connections.read().await;
        let displays = connections
            .values()
            .filter(|entry| matches!(entry.scope, ConnectionScope::Display(_)))
            .count() as u64;
        let rooms = connections.len() as u64 - displays;
        self.counters.snapshot(displays, rooms)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CallMessage;

    fn frame(room: &str, display: &str) -> BroadcastFrame {
        BroadcastFrame::from_message(&CallMessage {
            patient_name: "Budi".into(),
            room_code: room.into(),
            queue_number: "007".into(),
            display_code: display.into(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_register_unregister() {
        let registry = ConnectionRegistry::new();

        let a = registry
            .register(ConnectionScope::Display("D1".into()), None)
            .await;
        let b = registry.register(ConnectionScope::Room("R1".into()), None).await;
        assert_ne!(a.id, b.id);
        assert_eq!(registry.connection_count().await, 2);

        assert!(registry.unregister(a.id).await);
        assert!(!registry.unregister(a.id).await);
        assert_eq!(registry.connection_count().await, 1);
        assert!(registry.contains(b.id).await);
    }

    #[tokio::test]
    async fn test_broadcast_all_ignores_scope() {
        let registry = ConnectionRegistry::new();
        let mut d1 = registry
            .register(ConnectionScope::Display("D1".into()), None)
            .await;
        let mut d2 = registry
            .register(ConnectionScope::Display("D2".into()), None)
            .await;
        let mut r9 = registry.register(ConnectionScope::Room("R9".into()), None).await;

        let report = registry.broadcast(&frame("R1", "D1"), DeliveryMode::All).await;
        assert_eq!(report.delivered, 3);
        assert_eq!(report.dropped, 0);

        assert_eq!(d1.rx.recv().await.unwrap().room_code, "R1");
        assert_eq!(d2.rx.recv().await.unwrap().room_code, "R1");
        assert_eq!(r9.rx.recv().await.unwrap().room_code, "R1");
    }

    #[tokio::test]
    async fn test_broadcast_scoped() {
        let registry = ConnectionRegistry::new();
        let mut d1 = registry
            .register(ConnectionScope::Display("D1".into()), None)
            .await;
        let mut d2 = registry
            .register(ConnectionScope::Display("D2".into()), None)
            .await;
        let mut r1 = registry.register(ConnectionScope::Room("R1".into()), None).await;

        let report = registry
            .broadcast(&frame("R1", "D1"), DeliveryMode::Scoped)
            .await;
        assert_eq!(report.delivered, 2);
        assert_eq!(report.skipped, 1);

        assert!(d1.rx.try_recv().is_ok());
        assert!(r1.rx.try_recv().is_ok());
        assert!(d2.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_write_drops_only_that_connection() {
        let registry = ConnectionRegistry::new();
        let mut live = Vec::new();
        for i in 0..4 {
            live.push(
                registry
                    .register(ConnectionScope::Display(format!("D{}", i)), None)
                    .await,
            );
        }
        let dead = live.remove(2);
        let dead_id = dead.id;
        drop(dead);

        let report = registry.broadcast(&frame("R1", "D1"), DeliveryMode::All).await;
        assert_eq!(report.delivered, 3);
        assert_eq!(report.dropped, 1);
        assert!(!registry.contains(dead_id).await);
        assert_eq!(registry.connection_count().await, 3);

        for reg in live.iter_mut() {
            let received = reg.rx.recv().await.unwrap();
            assert_eq!(received.display_code, "D1");
        }
    }

    #[tokio::test]
    async fn test_full_buffer_counts_as_failed_write() {
        let registry =
            ConnectionRegistry::with_config(RegistryConfig::default().connection_buffer(1));
        let stalled = registry
            .register(ConnectionScope::Display("D1".into()), None)
            .await;

        let first = registry.broadcast(&frame("R1", "D1"), DeliveryMode::All).await;
        assert_eq!(first.delivered, 1);

        let second = registry.broadcast(&frame("R1", "D1"), DeliveryMode::All).await;
        assert_eq!(second.dropped, 1);
        assert!(!registry.contains(stalled.id).await);
    }

    #[tokio::test]
    async fn test_send_to_single_connection() {
        let registry = ConnectionRegistry::new();
        let mut reg = registry
            .register(ConnectionScope::Display("D1".into()), None)
            .await;

        registry.send_to(reg.id, frame("INITIAL", "D1")).await.unwrap();
        assert_eq!(reg.rx.recv().await.unwrap().room_code, "INITIAL");

        let missing = registry.send_to(ConnectionId(999), frame("R1", "D1")).await;
        assert_eq!(missing, Err(RegistryError::ConnectionNotFound(ConnectionId(999))));
    }

    #[tokio::test]
    async fn test_stats() {
        let registry = ConnectionRegistry::new();
        let _d = registry
            .register(ConnectionScope::Display("D1".into()), None)
            .await;
        let r = registry.register(ConnectionScope::Room("R1".into()), None).await;
        drop(r);

        registry.broadcast(&frame("R1", "D1"), DeliveryMode::All).await;

        let stats = registry.stats().await;
        assert_eq!(stats.display_connections, 1);
        assert_eq!(stats.room_connections, 0);
        assert_eq!(stats.total_connections, 2);
        assert_eq!(stats.broadcasts, 1);
        assert_eq!(stats.frames_delivered, 1);
        assert_eq!(stats.connections_dropped, 1);
    }
}
