//! Call-status state machine
//!
//! ```text
//!            call                 timer / reset
//!   Normal ───────▶ BeingCalled ───────────────▶ Normal
//!     │                  ▲
//!     │ mark absent      │ call
//!     ▼                  │
//!   Missed ──────────────┘
//!     │ reset / mark present
//!     ▼
//!   Normal
//! ```
//!
//! `Normal` is the absence of a status record.

pub mod machine;
pub mod state;

pub use machine::{CallStatusMachine, DEFAULT_REVERSION_DELAY};
pub use state::{CallStatus, QueueState, StatusRecord};
