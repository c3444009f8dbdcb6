//! Configuration for viva
//!
//! Defaults are defined in code and may be overridden by an optional
//! `viva.toml` in the data directory (or an explicit path).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, Result};

/// Default LLM models, tried in order (fallback on invalid model)
const DEFAULT_CHAT_MODELS: &[&str] = &["llama-3.1-8b-instant", "llama3-8b-8192"];

/// Local topic bank used when remote topic generation yields nothing
const TOPIC_BANK: &[&str] = &[
    "API",
    "HTML",
    "CSS",
    "JavaScript",
    "Python",
    "Java",
    "Docker",
    "Kubernetes",
    "Linux",
    "Git",
    "Database",
    "Algorithm",
    "Networking",
    "Cloud",
    "DevOps",
];

/// viva configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (credential file, overrides)
    pub data_dir: PathBuf,

    /// Base URL of the OpenAI-compatible API
    pub api_base_url: String,

    /// Chat models tried in order
    pub chat_models: Vec<String>,

    /// STT model for phrase transcription
    pub stt_model: String,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// Maximum number of interview questions per session
    pub questions_limit: usize,

    /// Fallback topic bank
    pub topic_bank: Vec<String>,

    /// Port for the GUI shell boundary
    pub port: u16,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// TTS model identifier
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// Whether speech synthesis starts enabled
    pub tts_enabled: bool,

    /// Minimum idle interval between accepted captures
    pub cooldown: Duration,

    /// How long to wait for speech onset before giving up a capture
    pub capture_timeout: Duration,

    /// Maximum length of a single captured phrase
    pub phrase_limit: Duration,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            tts_model: "playai-tts".to_string(),
            tts_voice: "Fritz-PlayAI".to_string(),
            tts_enabled: true,
            cooldown: Duration::from_secs(2),
            capture_timeout: Duration::from_secs(7),
            phrase_limit: Duration::from_secs(12),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            api_base_url: "https://api.groq.com/openai/v1".to_string(),
            chat_models: DEFAULT_CHAT_MODELS.iter().map(ToString::to_string).collect(),
            stt_model: "whisper-large-v3".to_string(),
            voice: VoiceConfig::default(),
            questions_limit: 5,
            topic_bank: TOPIC_BANK.iter().map(ToString::to_string).collect(),
            port: 8321,
        }
    }
}

/// Optional overrides read from `viva.toml`
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    api_base_url: Option<String>,
    chat_models: Option<Vec<String>>,
    stt_model: Option<String>,
    tts_model: Option<String>,
    tts_voice: Option<String>,
    tts_enabled: Option<bool>,
    questions_limit: Option<usize>,
    topic_bank: Option<Vec<String>>,
    port: Option<u16>,
}

impl Config {
    /// Load configuration, applying `viva.toml` overrides when present
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config path is unreadable or invalid
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let file = match path {
            Some(p) => Some(
                std::fs::read_to_string(p)
                    .map_err(|e| Error::Config(format!("cannot read {}: {e}", p.display())))?,
            ),
            None => {
                let default_path = config.data_dir.join("viva.toml");
                std::fs::read_to_string(&default_path).ok()
            }
        };

        if let Some(contents) = file {
            let overrides: FileConfig = toml::from_str(&contents)?;
            config.apply(overrides);
        }

        if config.questions_limit == 0 {
            return Err(Error::Config("questions_limit must be at least 1".to_string()));
        }
        if config.chat_models.is_empty() {
            return Err(Error::Config("at least one chat model is required".to_string()));
        }

        Ok(config)
    }

    /// Path of the credential file (`{"api_key": "..."}`)
    #[must_use]
    pub fn credential_path(&self) -> PathBuf {
        self.data_dir.join("config.json")
    }

    fn apply(&mut self, overrides: FileConfig) {
        if let Some(url) = overrides.api_base_url {
            self.api_base_url = url;
        }
        if let Some(models) = overrides.chat_models {
            self.chat_models = models;
        }
        if let Some(model) = overrides.stt_model {
            self.stt_model = model;
        }
        if let Some(model) = overrides.tts_model {
            self.voice.tts_model = model;
        }
        if let Some(voice) = overrides.tts_voice {
            self.voice.tts_voice = voice;
        }
        if let Some(enabled) = overrides.tts_enabled {
            self.voice.tts_enabled = enabled;
        }
        if let Some(limit) = overrides.questions_limit {
            self.questions_limit = limit;
        }
        if let Some(bank) = overrides.topic_bank {
            self.topic_bank = bank;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
    }
}

/// Resolve the platform data directory, falling back to the current dir
fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "viva", "viva")
        .map_or_else(|| PathBuf::from("."), |dirs| dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_defaults() {
        let config = Config::default();

        assert_eq!(config.questions_limit, 5);
        assert_eq!(config.topic_bank.len(), 15);
        assert_eq!(config.chat_models.len(), 2);
        assert!(config.voice.tts_enabled);
        assert_eq!(config.voice.cooldown, Duration::from_secs(2));
    }

    #[test]
    fn test_toml_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "questions_limit = 3\ntts_enabled = false\nchat_models = [\"test-model\"]"
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();

        assert_eq!(config.questions_limit, 3);
        assert!(!config.voice.tts_enabled);
        assert_eq!(config.chat_models, vec!["test-model"]);
        // untouched fields keep defaults
        assert_eq!(config.topic_bank.len(), 15);
    }

    #[test]
    fn test_zero_question_limit_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "questions_limit = 0").unwrap();

        assert!(Config::load(Some(file.path())).is_err());
    }
}
