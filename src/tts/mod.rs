//! Text-to-speech for call announcements
//!
//! A [`SpeechSynthesizer`] turns text into MP3 bytes. The [`AudioGenerator`]
//! stores each announcement under a unique content-addressed file name and
//! returns the URL the display boards play it from.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

pub mod audio;
pub mod google;

pub use audio::AudioGenerator;
pub use google::GoogleTranslateTts;

/// Default bound on one announcement's synthesis
pub const DEFAULT_TTS_TIMEOUT: Duration = Duration::from_secs(10);

/// Speech synthesis backend
pub trait SpeechSynthesizer: Send + Sync + 'static {
    /// Synthesize `text` into MP3 audio
    fn synthesize(&self, text: &str) -> impl Future<Output = Result<Bytes>> + Send;
}

/// Announcement read out when a patient is called
pub fn announcement(queue_number: &str, patient_name: &str, polyclinic_name: &str) -> String {
    format!(
        "Nomor antrian {}, atas nama {}, silakan menuju {}",
        queue_number, patient_name, polyclinic_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_announcement() {
        assert_eq!(
            announcement("007", "Budi", "Poli Umum"),
            "Nomor antrian 007, atas nama Budi, silakan menuju Poli Umum"
        );
    }
}
