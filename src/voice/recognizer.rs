//! Bounded phrase capture and transcription
//!
//! One capture attempt waits for speech onset (RMS energy over a
//! threshold), accumulates until trailing silence or the phrase limit,
//! then transcribes the segment. Runs on the dedicated capture thread,
//! so the HTTP call uses the blocking client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::credentials::ApiKeyStore;
use crate::voice::mic::{MicCapture, SAMPLE_RATE, samples_to_wav};

/// Minimum RMS energy to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum phrase length to bother transcribing (0.3s at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Trailing silence that ends a phrase (0.5s)
const TRAILING_SILENCE_SAMPLES: usize = 8000;

/// Poll interval for draining the microphone buffer
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Why a capture attempt produced no text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureFailure {
    /// No speech onset within the capture window
    Timeout,
    /// Audio captured but nothing recognizable in it
    Unclear,
    /// Device or transcription failure
    Failed(String),
}

/// Black-box speech capture: one bounded attempt, audio to text
pub trait PhraseRecognizer {
    /// Capture one phrase and transcribe it
    ///
    /// # Errors
    ///
    /// [`CaptureFailure::Timeout`] and [`CaptureFailure::Unclear`] are
    /// routine and silently ignored by the caller.
    fn capture_phrase(&mut self) -> std::result::Result<String, CaptureFailure>;
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Whisper-style recognizer over the microphone
pub struct WhisperRecognizer {
    mic: MicCapture,
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    keys: Arc<ApiKeyStore>,
    onset_timeout: Duration,
    phrase_limit: Duration,
}

impl WhisperRecognizer {
    /// Open the microphone and build a recognizer
    ///
    /// # Errors
    ///
    /// Returns error if the input device cannot be opened
    pub fn new(
        base_url: String,
        model: String,
        keys: Arc<ApiKeyStore>,
        onset_timeout: Duration,
        phrase_limit: Duration,
    ) -> crate::Result<Self> {
        Ok(Self {
            mic: MicCapture::open()?,
            client: reqwest::blocking::Client::new(),
            base_url,
            model,
            keys,
            onset_timeout,
            phrase_limit,
        })
    }

    /// Accumulate one energy-gated speech segment
    fn capture_segment(&mut self) -> std::result::Result<Vec<f32>, CaptureFailure> {
        self.mic
            .start()
            .map_err(|e| CaptureFailure::Failed(e.to_string()))?;
        self.mic.clear();

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let phrase_limit_samples =
            (self.phrase_limit.as_secs_f64() * f64::from(SAMPLE_RATE)) as usize;

        let started = Instant::now();
        let mut phrase: Vec<f32> = Vec::new();
        let mut in_speech = false;
        let mut trailing_silence = 0usize;

        loop {
            std::thread::sleep(POLL_INTERVAL);
            let chunk = self.mic.drain();
            let is_speech = rms(&chunk) > ENERGY_THRESHOLD;

            if in_speech {
                phrase.extend_from_slice(&chunk);
                if is_speech {
                    trailing_silence = 0;
                } else {
                    trailing_silence += chunk.len();
                }

                if trailing_silence > TRAILING_SILENCE_SAMPLES
                    || phrase.len() >= phrase_limit_samples
                {
                    break;
                }
            } else if is_speech {
                in_speech = true;
                phrase.extend_from_slice(&chunk);
            } else if started.elapsed() >= self.onset_timeout {
                return Err(CaptureFailure::Timeout);
            }
        }

        if phrase.len() < MIN_SPEECH_SAMPLES {
            return Err(CaptureFailure::Unclear);
        }
        Ok(phrase)
    }

    /// Transcribe a WAV segment via the transcription endpoint
    fn transcribe(&self, wav: Vec<u8>) -> std::result::Result<String, CaptureFailure> {
        let key = self
            .keys
            .bearer()
            .ok_or_else(|| CaptureFailure::Failed("no API key for transcription".to_string()))?;

        let form = reqwest::blocking::multipart::Form::new()
            .part(
                "file",
                reqwest::blocking::multipart::Part::bytes(wav)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| CaptureFailure::Failed(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&key)
            .multipart(form)
            .send()
            .map_err(|e| CaptureFailure::Failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(CaptureFailure::Failed(format!(
                "transcription API error {status}: {body}"
            )));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .map_err(|e| CaptureFailure::Failed(e.to_string()))?;

        let text = parsed.text.trim().to_string();
        if text.is_empty() {
            return Err(CaptureFailure::Unclear);
        }
        tracing::debug!(transcript = %text, "phrase transcribed");
        Ok(text)
    }
}

impl PhraseRecognizer for WhisperRecognizer {
    fn capture_phrase(&mut self) -> std::result::Result<String, CaptureFailure> {
        let segment = self.capture_segment()?;
        let wav = samples_to_wav(&segment, SAMPLE_RATE)
            .map_err(|e| CaptureFailure::Failed(e.to_string()))?;
        self.transcribe(wav)
    }
}

impl Drop for WhisperRecognizer {
    fn drop(&mut self) {
        self.mic.stop();
    }
}

/// RMS energy of a sample chunk
#[allow(clippy::cast_precision_loss)]
fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
