//! Announcement audio files
//!
//! File names are the SHA-256 of text, room, queue number, wall-clock time
//! and a sequence number, so repeating the same announcement always yields
//! a new file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use super::SpeechSynthesizer;
use crate::error::Result;

/// Writes synthesized announcements to disk and returns their public URL
pub struct AudioGenerator<V> {
    synthesizer: V,
    audio_dir: PathBuf,
    url_prefix: String,
    sequence: AtomicU64,
}

impl<V: SpeechSynthesizer> AudioGenerator<V> {
    /// Files go to `audio_dir` and are served under `url_prefix`
    pub fn new(
        synthesizer: V,
        audio_dir: impl Into<PathBuf>,
        url_prefix: impl Into<String>,
    ) -> Self {
        Self {
            synthesizer,
            audio_dir: audio_dir.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    pub fn synthesizer(&self) -> &V {
        &self.synthesizer
    }

    /// Synthesize `text` and store it; returns the file's URL
    pub async fn generate(
        &self,
        text: &str,
        room_code: &str,
        queue_number: &str,
    ) -> Result<String> {
        let file_name = self.file_name(text, room_code, queue_number);
        let audio = self.synthesizer.synthesize(text).await?;

        tokio::fs::create_dir_all(&self.audio_dir).await?;
        let path = self.audio_dir.join(&file_name);
        tokio::fs::write(&path, &audio).await?;

        tracing::info!(
            room = %room_code,
            queue_number = %queue_number,
            file = %path.display(),
            bytes = audio.len(),
            "Announcement audio written"
        );
        Ok(format!("{}/{}", self.url_prefix, file_name))
    }

    fn file_name(&self, text: &str, room_code: &str, queue_number: &str) -> String {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);

        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(room_code.as_bytes());
        hasher.update(queue_number.as_bytes());
        hasher.update(now.as_bytes());
        hasher.update(sequence.to_be_bytes());
        format!("{:x}.mp3", hasher.finalize())
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::*;
    use super::*;

    #[tokio::test]
    async fn test_generate_writes_file() {
        let dir = scratch_dir("audio");
        let generator = AudioGenerator::new(FakeSynthesizer::default(), &dir, "/assets/audio/");

        let url = generator.generate("halo", "R1", "007").await.unwrap();
        assert!(url.starts_with("/assets/audio/"));
        assert!(url.ends_with(".mp3"));

        let name = url.rsplit('/').next().unwrap();
        assert_eq!(name.len(), 64 + 4);
        let written = tokio::fs::read(dir.join(name)).await.unwrap();
        assert_eq!(written, b"mp3:halo");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_repeated_announcement_gets_new_file() {
        let dir = scratch_dir("repeat");
        let generator = AudioGenerator::new(FakeSynthesizer::default(), &dir, "/assets/audio");

        let a = generator.generate("halo", "R1", "007").await.unwrap();
        let b = generator.generate("halo", "R1", "007").await.unwrap();
        assert_ne!(a, b);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_synthesis_failure_writes_nothing() {
        let dir = scratch_dir("fail");
        let generator = AudioGenerator::new(FakeSynthesizer::failing(), &dir, "/assets/audio");

        assert!(generator.generate("halo", "R1", "007").await.is_err());
        assert!(!dir.exists());
    }
}
