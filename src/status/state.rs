//! Call status values
//!
//! A visit with no status record is in the normal queue. A record holds
//! either `Missed` or `BeingCalled`.

use serde::{Deserialize, Serialize};

/// Persisted call status of a visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Called (or eligible) but the patient was not present
    Missed,
    /// Currently being announced in its room
    BeingCalled,
}

impl CallStatus {
    /// Status code stored in the status table
    pub fn code(self) -> &'static str {
        match self {
            CallStatus::Missed => "1",
            CallStatus::BeingCalled => "2",
        }
    }

    /// Parse a stored status code
    ///
    /// `"0"` (present) and unknown codes mean no status.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "1" => Some(CallStatus::Missed),
            "2" => Some(CallStatus::BeingCalled),
            _ => None,
        }
    }
}

impl std::fmt::Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallStatus::Missed => write!(f, "missed"),
            CallStatus::BeingCalled => write!(f, "being_called"),
        }
    }
}

/// Derived queue state of a visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    /// No status record
    Normal,
    Missed,
    BeingCalled,
}

impl From<Option<CallStatus>> for QueueState {
    fn from(status: Option<CallStatus>) -> Self {
        match status {
            None => QueueState::Normal,
            Some(CallStatus::Missed) => QueueState::Missed,
            Some(CallStatus::BeingCalled) => QueueState::BeingCalled,
        }
    }
}

/// A stored status record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRecord {
    /// Visit identifier
    #[serde(rename = "no_rawat")]
    pub visit_id: String,
    /// Room the status applies to
    #[serde(rename = "kd_ruang_poli")]
    pub room_code: String,
    pub status: CallStatus,
}
