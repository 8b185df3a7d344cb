//! Connection registry for display push channels
//!
//! The registry tracks live display-board and room-queue connections and
//! fans call messages out to them.
//!
//! # Architecture
//!
//! ```text
//!                      Arc<ConnectionRegistry>
//!                 ┌─────────────────────────────┐
//!                 │ connections: HashMap<Id,    │
//!                 │   ConnectionEntry {         │
//!                 │     scope,                  │
//!                 │     tx: mpsc::Sender,       │
//!                 │   }                         │
//!                 │ >                           │
//!                 └──────────────┬──────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!  [BroadcastRouter]        [ws writer]             [ws writer]
//!   registry.broadcast()    rx.recv()               rx.recv()
//!        │                       │                       │
//!        └──► try_send() ────────┴──► socket.send() ─────┘
//! ```
//!
//! Each frame's JSON payload is a `bytes::Bytes`, so every connection shares
//! one serialized copy. A write that cannot be queued (writer gone, or the
//! client stopped reading and its buffer filled) removes that connection and
//! nothing else.

pub mod config;
pub mod entry;
pub mod error;
pub mod frame;
pub mod store;

pub use config::{DeliveryMode, RegistryConfig};
pub use entry::{ConnectionEntry, ConnectionInfo};
pub use error::RegistryError;
pub use frame::{BroadcastFrame, CallMessage, ConnectionId, ConnectionScope};
pub use store::{ConnectionRegistry, Registration};
