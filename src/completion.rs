//! Completion API client
//!
//! Stateless façade over an OpenAI-compatible chat-completions endpoint.
//! Each call walks an ordered model list; transient failures (429/5xx)
//! are retried with capped exponential backoff and jitter, an invalid
//! model skips ahead to the next identifier, and any other non-success
//! status is terminal for the whole call.

use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng as _;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::credentials::ApiKeyStore;
use crate::{Error, Result};

/// Retry attempts per model
const MAX_ATTEMPTS: u32 = 3;

/// Backoff cap in seconds
const MAX_BACKOFF_SECS: u64 = 8;

/// System prompt for topic generation
const TOPIC_SYSTEM_PROMPT: &str = "You generate beginner-friendly single-word tech topics \
    (e.g., 'API', 'Docker', 'HTML'). Return ONLY a JSON array of single-word strings. \
    No punctuation, no numbering, no explanations.";

/// First bracketed array substring in a completion reply
static ARRAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("valid regex"));

/// What to do with a non-success response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    /// 429 or 5xx: back off and retry the same model
    Retry,
    /// The model identifier was rejected: try the next one
    NextModel,
    /// Terminal for the whole call
    Fatal,
}

/// Seam for the remote completion API
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run one completion call
    ///
    /// # Errors
    ///
    /// Returns error when no model yields a non-empty completion
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Request up to `count` distinct single-word topics
    ///
    /// Any failure (missing key, transport, unparseable reply) yields an
    /// empty list; callers fall back to the local topic bank.
    async fn generate_topics(&self, count: usize) -> Vec<String> {
        let user_prompt = format!("Generate {count} distinct one-word tech terms.");
        match self.complete(TOPIC_SYSTEM_PROMPT, &user_prompt).await {
            Ok(content) => parse_topic_list(&content, count),
            Err(e) => {
                tracing::warn!(error = %e, "topic generation failed, using local bank");
                Vec::new()
            }
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatResponse {
    /// First non-empty completion text, trimmed
    fn content(self) -> String {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.and_then(|m| m.content).or(c.text))
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

/// HTTP completion client
pub struct CompletionClient {
    client: reqwest::Client,
    base_url: String,
    models: Vec<String>,
    keys: Arc<ApiKeyStore>,
}

impl CompletionClient {
    /// Create a new completion client
    #[must_use]
    pub fn new(base_url: String, models: Vec<String>, keys: Arc<ApiKeyStore>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            models,
            keys,
        }
    }
}

#[async_trait]
impl CompletionBackend for CompletionClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let key = self.keys.bearer().ok_or(Error::MissingApiKey)?;
        let url = format!("{}/chat/completions", self.base_url);
        let mut last_error: Option<String> = None;

        'models: for model in &self.models {
            for attempt in 0..MAX_ATTEMPTS {
                let request = ChatRequest {
                    model,
                    messages: vec![
                        ChatMessage {
                            role: "system",
                            content: system_prompt,
                        },
                        ChatMessage {
                            role: "user",
                            content: user_prompt,
                        },
                    ],
                };

                let response = match self
                    .client
                    .post(&url)
                    .bearer_auth(&key)
                    .json(&request)
                    .send()
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(error = %e, model = %model, attempt, "completion request failed");
                        last_error = Some(e.to_string());
                        tokio::time::sleep(backoff_delay(attempt)).await;
                        continue;
                    }
                };

                let status = response.status();
                if status.is_success() {
                    let parsed: ChatResponse = response.json().await?;
                    let content = parsed.content();
                    if content.is_empty() {
                        tracing::debug!(model = %model, "empty completion, trying next model");
                        last_error = Some(format!("empty completion from {model}"));
                        continue 'models;
                    }
                    return Ok(content);
                }

                let body = response.text().await.unwrap_or_default();
                let detail = format!("HTTP {status} for {model}: {body}");
                match classify_status(status.as_u16(), &body) {
                    Disposition::Retry => {
                        let delay = backoff_delay(attempt);
                        tracing::debug!(model = %model, attempt, delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX), "retrying");
                        last_error = Some(detail);
                        tokio::time::sleep(delay).await;
                    }
                    Disposition::NextModel => {
                        tracing::debug!(model = %model, "model rejected, falling back");
                        last_error = Some(detail);
                        continue 'models;
                    }
                    Disposition::Fatal => return Err(Error::Completion(detail)),
                }
            }
        }

        Err(Error::Completion(last_error.unwrap_or_else(|| {
            "no successful response from any model".to_string()
        })))
    }
}

/// Classify a non-success HTTP response
fn classify_status(status: u16, body: &str) -> Disposition {
    if status == 429 || (500..600).contains(&status) {
        return Disposition::Retry;
    }
    let lower = body.to_lowercase();
    if lower.contains("invalid_model") || lower.contains("model_not_found") {
        return Disposition::NextModel;
    }
    Disposition::Fatal
}

/// Backoff for the given attempt: `min(8, 2^attempt)` seconds plus up to
/// 250 ms of jitter
fn backoff_delay(attempt: u32) -> Duration {
    let base = (1u64 << attempt.min(6)).min(MAX_BACKOFF_SECS);
    let jitter = rand::thread_rng().gen_range(0..=250);
    Duration::from_secs(base) + Duration::from_millis(jitter)
}

/// Extract a topic list from a completion reply
///
/// Takes the first bracketed JSON array, keeps each entry's first
/// whitespace-delimited token stripped of everything but alphanumerics
/// and `+`/`#`, de-duplicates case-insensitively preserving order, and
/// truncates to `count`. Any parse failure yields an empty list.
#[must_use]
pub fn parse_topic_list(content: &str, count: usize) -> Vec<String> {
    let Some(found) = ARRAY_RE.find(content) else {
        return Vec::new();
    };
    let Ok(values) = serde_json::from_str::<Vec<serde_json::Value>>(found.as_str()) else {
        return Vec::new();
    };

    let mut seen = std::collections::HashSet::new();
    let mut topics = Vec::new();
    for value in values {
        let raw = match value {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        let Some(token) = raw.split_whitespace().next() else {
            continue;
        };
        let term: String = token
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '+' || *c == '#')
            .collect();
        if term.is_empty() {
            continue;
        }
        if seen.insert(term.to_lowercase()) {
            topics.push(term);
        }
    }

    topics.truncate(count);
    topics
}
