//! Speech synthesis
//!
//! Stateless façade over an OpenAI-style `/audio/speech` endpoint.
//! Synthesis failure is never an error: callers get `None` and downgrade
//! to a text-only payload.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::credentials::ApiKeyStore;

/// Seam for speech synthesis
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Render text to encoded audio bytes; `None` on any failure
    async fn synthesize(&self, text: &str) -> Option<Vec<u8>>;
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
}

/// HTTP speech synthesizer
pub struct SpeechSynthesizer {
    client: reqwest::Client,
    base_url: String,
    model: String,
    voice: String,
    keys: Arc<ApiKeyStore>,
}

impl SpeechSynthesizer {
    /// Create a new synthesizer
    #[must_use]
    pub fn new(base_url: String, model: String, voice: String, keys: Arc<ApiKeyStore>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            model,
            voice,
            keys,
        }
    }
}

#[async_trait]
impl Synthesizer for SpeechSynthesizer {
    async fn synthesize(&self, text: &str) -> Option<Vec<u8>> {
        let key = self.keys.bearer()?;
        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
        };

        let response = match self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(&key)
            .json(&request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "TTS request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "TTS API error");
            return None;
        }

        match response.bytes().await {
            Ok(bytes) => {
                tracing::debug!(audio_bytes = bytes.len(), "speech synthesized");
                Some(bytes.to_vec())
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read TTS response");
                None
            }
        }
    }
}
