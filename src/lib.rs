//! Clinic queue calling and waiting-room display boards
//!
//! Staff call the next patient from a room's calling screen; the server
//! synthesizes an announcement, marks the visit as being called and pushes
//! the call over WebSocket to every display board. A called visit falls
//! back to the waiting queue after a reversion delay unless it is marked
//! missed, present, or called again first.
//!
//! # Example
//!
//! ```no_run
//! use poli_display::store::MemoryStore;
//! use poli_display::tts::GoogleTranslateTts;
//! use poli_display::{QueueServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> poli_display::Result<()> {
//!     let config = ServerConfig::default();
//!     let tts = GoogleTranslateTts::new(config.tts_language.clone());
//!     let server = QueueServer::new(config, MemoryStore::new(), tts);
//!     server.run().await
//! }
//! ```

pub mod board;
pub mod calendar;
pub mod call;
pub mod error;
pub mod registry;
pub mod router;
pub mod server;
pub mod stats;
pub mod status;
pub mod store;
pub mod tts;

pub use error::{Error, Result};
pub use registry::{CallMessage, ConnectionRegistry, DeliveryMode, RegistryConfig};
pub use router::{BroadcastRouter, RouterHandle};
pub use server::{QueueServer, ServerConfig};
pub use status::{CallStatus, CallStatusMachine};
pub use store::{MemoryStore, MySqlStore, QueueStore};
