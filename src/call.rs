//! The call action
//!
//! Calling a patient generates the announcement audio, moves the visit to
//! `BeingCalled` and queues the envelope for broadcast. Audio and status
//! failures are logged and do not stop the broadcast; only a stopped
//! router fails the call. Audio slower than the desk's timeout is
//! abandoned and the call goes out without it.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::registry::CallMessage;
use crate::router::RouterHandle;
use crate::status::CallStatusMachine;
use crate::store::QueueStore;
use crate::tts::{announcement, AudioGenerator, SpeechSynthesizer, DEFAULT_TTS_TIMEOUT};

/// Body of a call request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    #[serde(flatten)]
    pub message: CallMessage,
    /// Visit whose status follows the call, if known
    #[serde(default, alias = "no_rawat")]
    pub visit_id: Option<String>,
}

impl CallRequest {
    /// Every field but the visit id must be present and non-blank
    pub fn validate(&self) -> Result<()> {
        let m = &self.message;
        let required = [
            ("patientName", &m.patient_name),
            ("roomCode", &m.room_code),
            ("polyclinicName", &m.polyclinic_name),
            ("queueNumber", &m.queue_number),
            ("displayCode", &m.display_code),
        ];

        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(Error::Validation(format!("{} is required", field))),
            None => Ok(()),
        }
    }

    fn visit_id(&self) -> Option<&str> {
        self.visit_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Runs call actions
pub struct CallDesk<S, V> {
    router: RouterHandle,
    status: Arc<CallStatusMachine<S>>,
    audio: Arc<AudioGenerator<V>>,
    audio_timeout: Duration,
}

impl<S: QueueStore, V: SpeechSynthesizer> CallDesk<S, V> {
    pub fn new(
        router: RouterHandle,
        status: Arc<CallStatusMachine<S>>,
        audio: Arc<AudioGenerator<V>>,
    ) -> Self {
        Self {
            router,
            status,
            audio,
            audio_timeout: DEFAULT_TTS_TIMEOUT,
        }
    }

    /// Longest the call waits for its announcement audio
    pub fn audio_timeout(mut self, timeout: Duration) -> Self {
        self.audio_timeout = timeout;
        self
    }

    /// Announce a patient; returns the envelope that was broadcast
    pub async fn call(&self, request: CallRequest) -> Result<CallMessage> {
        request.validate()?;
        let m = &request.message;

        let text = announcement(&m.queue_number, &m.patient_name, &m.polyclinic_name);
        let generate = self.audio.generate(&text, &m.room_code, &m.queue_number);
        let audio_url = match tokio::time::timeout(self.audio_timeout, generate).await {
            Ok(Ok(url)) => url,
            Ok(Err(e)) => {
                tracing::warn!(
                    room = %m.room_code,
                    queue_number = %m.queue_number,
                    error = %e,
                    "Announcement audio unavailable"
                );
                String::new()
            }
            Err(_) => {
                tracing::warn!(
                    room = %m.room_code,
                    queue_number = %m.queue_number,
                    timeout_ms = self.audio_timeout.as_millis() as u64,
                    "Announcement audio timed out"
                );
                String::new()
            }
        };

        if let Some(visit_id) = request.visit_id() {
            if let Err(e) = self.status.call(visit_id, &m.room_code).await {
                tracing::error!(
                    visit = %visit_id,
                    room = %m.room_code,
                    error = %e,
                    "Failed to record call status"
                );
            }
        }

        let message = CallMessage {
            audio_url,
            ..request.message
        };
        self.router.publish(message.clone())?;

        tracing::info!(
            display = %message.display_code,
            room = %message.room_code,
            queue_number = %message.queue_number,
            "Patient called"
        );
        Ok(message)
    }
}

impl<S, V> Clone for CallDesk<S, V> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            status: Arc::clone(&self.status),
            audio: Arc::clone(&self.audio),
            audio_timeout: self.audio_timeout,
        }
    }
}
