//! Counters for push connections and call broadcasts

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Outcome of fanning one frame out over the registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Connections the frame was queued to
    pub delivered: usize,
    /// Connections removed because the write failed
    pub dropped: usize,
    /// Connections skipped because they are out of scope
    pub skipped: usize,
}

impl DeliveryReport {
    /// Connections that were attempted
    pub fn attempted(&self) -> usize {
        self.delivered + self.dropped
    }
}

/// Live counters shared by the registry and router
#[derive(Debug)]
pub struct BroadcastCounters {
    started_at: Instant,
    total_connections: AtomicU64,
    broadcasts: AtomicU64,
    frames_delivered: AtomicU64,
    connections_dropped: AtomicU64,
}

impl Default for BroadcastCounters {
    fn default() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            broadcasts: AtomicU64::new(0),
            frames_delivered: AtomicU64::new(0),
            connections_dropped: AtomicU64::new(0),
        }
    }
}

impl BroadcastCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a newly registered connection
    pub fn record_connection(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a completed fan-out
    pub fn record_broadcast(&self, report: &DeliveryReport) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.frames_delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.connections_dropped
            .fetch_add(report.dropped as u64, Ordering::Relaxed);
    }

    /// Take a snapshot, filling in the live connection counts
    pub fn snapshot(&self, display_connections: u64, room_connections: u64) -> BroadcastStats {
        BroadcastStats {
            active_connections: display_connections + room_connections,
            display_connections,
            room_connections,
            total_connections: self.total_connections.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            connections_dropped: self.connections_dropped.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

/// Point-in-time statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct BroadcastStats {
    /// Currently registered connections
    pub active_connections: u64,
    /// Currently registered display-board connections
    pub display_connections: u64,
    /// Currently registered room queue connections
    pub room_connections: u64,
    /// Connections ever registered
    pub total_connections: u64,
    /// Call messages fanned out
    pub broadcasts: u64,
    /// Frames queued to connections
    pub frames_delivered: u64,
    /// Connections removed after a failed write
    pub connections_dropped: u64,
    /// Time since the counters were created
    #[serde(with = "duration_secs")]
    pub uptime: Duration,
}

mod duration_secs {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}
