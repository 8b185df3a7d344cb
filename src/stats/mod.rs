//! Statistics for push connections and broadcasts

pub mod metrics;

pub use metrics::{BroadcastCounters, BroadcastStats, DeliveryReport};
