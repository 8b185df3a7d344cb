//! Google Translate speech endpoint
//!
//! The endpoint reads at most [`MAX_CHUNK_CHARS`] characters per request,
//! so longer text is split on whitespace and the MP3 chunks concatenated.

use std::time::Duration;

use bytes::{Bytes, BytesMut};

use super::{SpeechSynthesizer, DEFAULT_TTS_TIMEOUT};
use crate::error::{Error, Result};

pub const DEFAULT_ENDPOINT: &str = "https://translate.google.com/translate_tts";

/// Longest text accepted in one request
pub const MAX_CHUNK_CHARS: usize = 200;

/// Speech synthesizer backed by Google Translate
#[derive(Debug, Clone)]
pub struct GoogleTranslateTts {
    client: reqwest::Client,
    endpoint: String,
    language: String,
}

impl GoogleTranslateTts {
    /// Synthesizer speaking `language` (e.g. `"id"`)
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            client: http_client(DEFAULT_TTS_TIMEOUT),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            language: language.into(),
        }
    }

    /// Bound connect and whole-request time per chunk
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    /// Override the endpoint URL
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    async fn fetch_chunk(&self, chunk: &str, idx: usize, total: usize) -> Result<Bytes> {
        let textlen = chunk.chars().count().to_string();
        let idx = idx.to_string();
        let total = total.to_string();

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", self.language.as_str()),
                ("q", chunk),
                ("textlen", textlen.as_str()),
                ("idx", idx.as_str()),
                ("total", total.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::SpeechRejected(status.as_u16()));
        }
        Ok(response.bytes().await?)
    }
}

impl SpeechSynthesizer for GoogleTranslateTts {
    async fn synthesize(&self, text: &str) -> Result<Bytes> {
        let chunks = split_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(Error::Validation("empty announcement text".into()));
        }

        let mut audio = BytesMut::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let bytes = self.fetch_chunk(chunk, idx, chunks.len()).await?;
            audio.extend_from_slice(&bytes);
        }

        tracing::debug!(
            chars = text.chars().count(),
            chunks = chunks.len(),
            bytes = audio.len(),
            "Speech synthesized"
        );
        Ok(audio.freeze())
    }
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Speech client setup failed, using defaults");
            reqwest::Client::default()
        })
}

/// Split text into chunks of at most `max` characters, breaking on
/// whitespace; a single word longer than `max` is cut
fn split_text(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > max {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(max);
            chunks.push(word.into_iter().collect());
            word = rest;
        }

        let needed = if current.is_empty() { word.len() } else { word.len() + 1 };
        if current_len + needed > max {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_short_text() {
        assert_eq!(split_text("Nomor antrian 007", 200), vec!["Nomor antrian 007"]);
        assert!(split_text("   ", 200).is_empty());
    }

    #[test]
    fn test_split_on_whitespace() {
        let chunks = split_text("satu dua tiga empat", 9);
        assert_eq!(chunks, vec!["satu dua", "tiga", "empat"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 9));
    }

    #[test]
    fn test_split_long_word() {
        let chunks = split_text("ab abcdefgh c", 4);
        assert_eq!(chunks, vec!["ab", "abcd", "efgh", "c"]);
    }

    /// Accepts connections and never answers
    async fn silent_endpoint() -> (String, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/tts", listener.local_addr().unwrap());
        let task = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        (url, task)
    }

    #[tokio::test]
    async fn test_hung_endpoint_times_out() {
        let (url, server) = silent_endpoint().await;
        let tts = GoogleTranslateTts::new("id")
            .endpoint(url)
            .timeout(Duration::from_millis(200));

        let result = tokio::time::timeout(Duration::from_secs(5), tts.synthesize("Nomor 007"))
            .await
            .expect("synthesis should give up on its own");
        assert!(matches!(result, Err(Error::Speech(_))));

        server.abort();
    }

    #[test]
    fn test_builder() {
        let tts = GoogleTranslateTts::new("id").endpoint("http://localhost:9/tts");
        assert_eq!(tts.language(), "id");
        assert_eq!(tts.endpoint, "http://localhost:9/tts");
    }
}
