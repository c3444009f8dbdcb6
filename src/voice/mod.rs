//! Microphone capture and phrase recognition
//!
//! The speech-to-text engine is a boundary: the rest of the crate only
//! sees [`PhraseRecognizer`], a blocking audio-chunk-to-text function.

mod mic;
mod recognizer;

pub use mic::{MicCapture, SAMPLE_RATE, samples_to_wav};
pub use recognizer::{CaptureFailure, PhraseRecognizer, WhisperRecognizer};
