//! HTTP handlers
//!
//! Every handler is generic over the store and speech backend and reads the
//! shared [`AppState`](super::state::AppState).

pub mod call;
pub mod display;
pub mod settings;
