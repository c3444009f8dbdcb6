//! Error types for viva

use thiserror::Error;

/// Result type alias for viva operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in viva
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Interview session error (invalid transition, no active question)
    #[error("session error: {0}")]
    Session(String),

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Completion API error (terminal, after retries and model fallback)
    #[error("completion error: {0}")]
    Completion(String),

    /// No API key configured
    #[error("no API key configured; set GROQ_API_KEY or save one from the UI")]
    MissingApiKey,

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
