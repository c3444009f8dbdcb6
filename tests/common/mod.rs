//! Shared test doubles for the command-layer seams

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use viva::commands::{Assistant, Notify};
use viva::completion::CompletionBackend;
use viva::config::{Config, VoiceConfig};
use viva::credentials::ApiKeyStore;
use viva::listener::RecognizerFactory;
use viva::payload::Payload;
use viva::synthesis::Synthesizer;

/// Completion backend with scripted replies and fixed topics
pub struct FakeCompletion {
    replies: Mutex<Vec<viva::Result<String>>>,
    topics: Vec<String>,
}

impl FakeCompletion {
    pub fn new(replies: Vec<viva::Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            topics: Vec::new(),
        }
    }

    pub fn with_topics(mut self, topics: &[&str]) -> Self {
        self.topics = topics.iter().map(ToString::to_string).collect();
        self
    }
}

#[async_trait]
impl CompletionBackend for FakeCompletion {
    async fn complete(&self, _system: &str, _user: &str) -> viva::Result<String> {
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            Err(viva::Error::Completion("no scripted reply left".to_string()))
        } else {
            replies.remove(0)
        }
    }

    async fn generate_topics(&self, _count: usize) -> Vec<String> {
        self.topics.clone()
    }
}

/// Synthesizer returning a fixed audio blob (or nothing)
pub struct FakeSynth {
    pub audio: Option<Vec<u8>>,
}

#[async_trait]
impl Synthesizer for FakeSynth {
    async fn synthesize(&self, _text: &str) -> Option<Vec<u8>> {
        self.audio.clone()
    }
}

/// Notifier collecting everything pushed to the shell
#[derive(Default)]
pub struct CollectingNotifier {
    pub responses: Mutex<Vec<Payload>>,
    pub statuses: Mutex<Vec<String>>,
}

impl CollectingNotifier {
    pub fn response_texts(&self) -> Vec<String> {
        self.responses
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.text.clone())
            .collect()
    }
}

impl Notify for CollectingNotifier {
    fn respond(&self, payload: Payload) {
        self.responses.lock().unwrap().push(payload);
    }

    fn status(&self, line: &str) {
        self.statuses.lock().unwrap().push(line.to_string());
    }
}

/// Build an assistant wired to fakes; no microphone involved
pub fn assistant_with(
    backend: FakeCompletion,
    synth: FakeSynth,
    tts_enabled: bool,
) -> (Arc<Assistant>, Arc<CollectingNotifier>) {
    let keys = Arc::new(ApiKeyStore::empty(
        std::env::temp_dir().join("viva-it-config.json"),
    ));
    keys.save("gsk_test");

    let notifier = Arc::new(CollectingNotifier::default());
    let factory: RecognizerFactory =
        Arc::new(|| Err(viva::Error::Audio("no device in tests".to_string())));

    let config = Config {
        voice: VoiceConfig {
            tts_enabled,
            ..VoiceConfig::default()
        },
        ..Config::default()
    };

    let (assistant, _rx) = Assistant::new(
        config,
        keys,
        Arc::new(backend),
        Arc::new(synth),
        Arc::clone(&notifier) as Arc<dyn Notify>,
        factory,
    );
    (assistant, notifier)
}
