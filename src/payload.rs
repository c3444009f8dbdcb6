//! Response payloads pushed to the GUI shell
//!
//! Every externally exposed command resolves to a `Payload` with exactly
//! two fields: the display text and optional base64-encoded audio.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

/// A `{text, audio}` payload for the display layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Display text
    pub text: String,

    /// Base64-encoded audio bytes, or `null` for text-only responses
    pub audio: Option<String>,
}

impl Payload {
    /// Create a text-only payload
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            audio: None,
        }
    }

    /// Create a payload carrying synthesized audio
    #[must_use]
    pub fn with_audio(text: impl Into<String>, audio: &[u8]) -> Self {
        Self {
            text: text.into(),
            audio: Some(BASE64.encode(audio)),
        }
    }

    /// Pack text with optional audio; `None` downgrades to text-only
    #[must_use]
    pub fn pack(text: impl Into<String>, audio: Option<&[u8]>) -> Self {
        match audio {
            Some(bytes) => Self::with_audio(text, bytes),
            None => Self::text(text),
        }
    }

    /// Serialize to the wire JSON
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"text":"","audio":null}"#.to_string())
    }

    /// Whether this payload carries audio
    #[must_use]
    pub const fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_only_wire_shape() {
        let payload = Payload::text("hello");
        let json: serde_json::Value = serde_json::from_str(&payload.to_json()).unwrap();

        assert_eq!(json["text"], "hello");
        assert!(json["audio"].is_null());
        assert_eq!(json.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_audio_is_base64() {
        let payload = Payload::with_audio("hi", &[1, 2, 3]);
        assert_eq!(payload.audio.as_deref(), Some("AQID"));
    }

    #[test]
    fn test_pack_downgrades_on_none() {
        let payload = Payload::pack("hi", None);
        assert!(!payload.has_audio());
    }
}
