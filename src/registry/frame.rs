//! Call messages and broadcast frames
//!
//! A [`CallMessage`] is the envelope pushed to display boards. It is
//! serialized once into a [`BroadcastFrame`] whose `Bytes` payload is shared
//! by every connection the frame is delivered to.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Unique identifier of a registered push connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What a connection subscribed to at handshake
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConnectionScope {
    /// Waiting-room board for a display code
    Display(String),
    /// Queue-update feed for a polyclinic room code
    Room(String),
}

impl ConnectionScope {
    /// Whether a message addressed to `display_code` / `room_code` belongs to this scope
    pub fn matches(&self, display_code: &str, room_code: &str) -> bool {
        match self {
            ConnectionScope::Display(code) => code == display_code,
            ConnectionScope::Room(code) => code == room_code,
        }
    }

    /// The scope key (display or room code)
    pub fn key(&self) -> &str {
        match self {
            ConnectionScope::Display(code) | ConnectionScope::Room(code) => code,
        }
    }
}

impl std::fmt::Display for ConnectionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionScope::Display(code) => write!(f, "display/{}", code),
            ConnectionScope::Room(code) => write!(f, "room/{}", code),
        }
    }
}

/// Envelope announcing a called patient
///
/// Field aliases accept the snake_case names older clients send. Missing
/// fields read as empty and are caught by request validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CallMessage {
    #[serde(alias = "nm_pasien")]
    pub patient_name: String,
    #[serde(alias = "kd_ruang_poli")]
    pub room_code: String,
    #[serde(alias = "nm_poli")]
    pub polyclinic_name: String,
    #[serde(alias = "no_reg")]
    pub queue_number: String,
    #[serde(alias = "kd_display")]
    pub display_code: String,
    #[serde(alias = "audio_url")]
    pub audio_url: String,
}

impl CallMessage {
    /// Handshake envelope sent to a freshly opened connection
    pub fn handshake(scope: &ConnectionScope) -> Self {
        match scope {
            ConnectionScope::Display(code) => Self {
                patient_name: "Connected".into(),
                room_code: "INITIAL".into(),
                queue_number: "0".into(),
                display_code: code.clone(),
                ..Default::default()
            },
            ConnectionScope::Room(code) => Self {
                patient_name: "Connected".into(),
                room_code: code.clone(),
                queue_number: "0".into(),
                ..Default::default()
            },
        }
    }
}

/// A serialized message ready to be written to any number of connections
///
/// Cheap to clone: the payload is reference counted.
#[derive(Debug, Clone)]
pub struct BroadcastFrame {
    /// Display code the message was addressed to
    pub display_code: String,
    /// Room code the message was addressed to
    pub room_code: String,
    /// JSON payload
    pub payload: Bytes,
}

impl BroadcastFrame {
    /// Serialize a call message into a frame
    pub fn from_message(message: &CallMessage) -> Result<Self, serde_json::Error> {
        let payload = serde_json::to_vec(message)?;
        Ok(Self {
            display_code: message.display_code.clone(),
            room_code: message.room_code.clone(),
            payload: Bytes::from(payload),
        })
    }

    /// Payload as UTF-8 text (always valid since it is produced by serde_json)
    pub fn as_text(&self) -> &str {
        std::str::from_utf8(&self.payload).unwrap_or_default()
    }

    /// Whether a connection with `scope` is addressed by this frame
    pub fn addressed_to(&self, scope: &ConnectionScope) -> bool {
        scope.matches(&self.display_code, &self.room_code)
    }
}
