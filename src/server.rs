//! GUI shell boundary
//!
//! A local HTTP surface for the display layer: commands arrive as plain
//! POSTs, push traffic (status lines, response payloads) goes out over a
//! WebSocket, and playback lifecycle signals come back in on the same
//! socket. Everything rides a broadcast channel, so any number of
//! connected shells see the same events.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt as _, StreamExt as _};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::Error;
use crate::commands::{Assistant, Notify};
use crate::payload::Payload;

/// Broadcast capacity for UI events
const EVENT_BUFFER: usize = 64;

/// Events pushed to connected shells
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    /// Plain status line (countdown ticks, echoed transcripts)
    Status {
        /// Display text
        line: String,
    },
    /// A full response payload
    Response {
        /// Text plus optional base64 audio
        payload: Payload,
    },
}

/// Playback lifecycle signals from the shell
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsIncoming {
    PlaybackStarted,
    PlaybackFinished,
    SpeakingEnded,
    StopPlayback,
}

/// [`Notify`] implementation backed by the UI broadcast channel
pub struct WsNotifier {
    events: broadcast::Sender<UiEvent>,
}

impl WsNotifier {
    /// Create a notifier and its broadcast channel
    #[must_use]
    pub fn new() -> (Arc<Self>, broadcast::Sender<UiEvent>) {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        (
            Arc::new(Self {
                events: events.clone(),
            }),
            events,
        )
    }
}

impl Notify for WsNotifier {
    fn respond(&self, payload: Payload) {
        // no receivers connected is fine
        let _ = self.events.send(UiEvent::Response { payload });
    }

    fn status(&self, line: &str) {
        let _ = self.events.send(UiEvent::Status {
            line: line.to_string(),
        });
    }
}

#[derive(Clone)]
struct AppState {
    assistant: Arc<Assistant>,
    events: broadcast::Sender<UiEvent>,
}

/// Error wrapper mapping domain errors to HTTP responses
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            Error::MissingApiKey => StatusCode::BAD_REQUEST,
            Error::Session(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

#[derive(Deserialize)]
struct KeyRequest {
    api_key: String,
}

#[derive(Deserialize)]
struct TextRequest {
    text: String,
}

#[derive(Deserialize)]
struct NotesRequest {
    notes: Vec<String>,
}

/// Build the router for the GUI boundary
#[must_use]
pub fn router(assistant: Arc<Assistant>, events: broadcast::Sender<UiEvent>) -> Router {
    let state = AppState { assistant, events };

    Router::new()
        .route("/health", get(health))
        .route("/listening/toggle", post(toggle_listening))
        .route("/keys", get(key_status).post(save_key).delete(delete_key))
        .route("/tts/toggle", post(toggle_tts))
        .route("/response/stop", post(stop_response))
        .route("/interview/start", post(start_interview))
        .route("/interview/stop", post(stop_interview))
        .route("/interview/answer", post(submit_answer))
        .route("/interview/complete", post(complete_answer))
        .route("/question", post(ask_question))
        .route("/proctoring", post(set_proctoring_notes))
        .route("/ws", get(ws_upgrade))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the GUI boundary until the process exits
///
/// # Errors
///
/// Returns error if the port cannot be bound
pub async fn serve(
    assistant: Arc<Assistant>,
    events: broadcast::Sender<UiEvent>,
    port: u16,
) -> crate::Result<()> {
    let app = router(assistant, events);
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    tracing::info!(port, "GUI boundary listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Command failures become text-only payloads, never HTTP errors: the
/// shell just displays them
fn payload_or_error(result: crate::Result<Payload>) -> Json<Payload> {
    match result {
        Ok(payload) => Json(payload),
        Err(e) => {
            tracing::warn!(error = %e, "command failed");
            Json(Payload::text(e.to_string()))
        }
    }
}

#[allow(clippy::unused_async)]
async fn health() -> &'static str {
    "ok"
}

#[allow(clippy::unused_async)]
async fn toggle_listening(State(state): State<AppState>) -> Result<Json<bool>, ApiError> {
    Ok(Json(state.assistant.toggle_listening()?))
}

#[allow(clippy::unused_async)]
async fn key_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "present": state.assistant.has_api_key() }))
}

#[allow(clippy::unused_async)]
async fn save_key(
    State(state): State<AppState>,
    Json(request): Json<KeyRequest>,
) -> Json<bool> {
    Json(state.assistant.save_api_key(&request.api_key))
}

#[allow(clippy::unused_async)]
async fn delete_key(State(state): State<AppState>) -> Result<Json<bool>, ApiError> {
    state.assistant.delete_api_key()?;
    Ok(Json(true))
}

#[allow(clippy::unused_async)]
async fn toggle_tts(State(state): State<AppState>) -> Json<bool> {
    Json(state.assistant.toggle_tts())
}

#[allow(clippy::unused_async)]
async fn stop_response(State(state): State<AppState>) -> Json<bool> {
    state.assistant.stop_response();
    Json(true)
}

async fn start_interview(State(state): State<AppState>) -> Json<Payload> {
    payload_or_error(state.assistant.start_interview().await)
}

#[allow(clippy::unused_async)]
async fn stop_interview(State(state): State<AppState>) -> Json<Payload> {
    Json(state.assistant.stop_interview())
}

async fn submit_answer(
    State(state): State<AppState>,
    Json(request): Json<TextRequest>,
) -> Json<Payload> {
    payload_or_error(state.assistant.submit_answer(&request.text).await)
}

async fn complete_answer(State(state): State<AppState>) -> Json<Payload> {
    payload_or_error(state.assistant.complete_answer().await)
}

async fn ask_question(
    State(state): State<AppState>,
    Json(request): Json<TextRequest>,
) -> Json<Payload> {
    payload_or_error(state.assistant.ask_question(&request.text).await)
}

#[allow(clippy::unused_async)]
async fn set_proctoring_notes(
    State(state): State<AppState>,
    Json(request): Json<NotesRequest>,
) -> Json<bool> {
    state.assistant.set_proctoring_notes(request.notes);
    Json(true)
}

#[allow(clippy::unused_async)]
async fn ws_upgrade(State(state): State<AppState>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One connected shell: forward broadcast events out, take playback
/// signals in
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let mut events = state.events.subscribe();

    let mut forward = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    let Ok(text) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "shell lagging behind UI events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut forward => break,
            incoming = stream.next() => {
                let Some(Ok(message)) = incoming else { break };
                if let Message::Text(text) = message {
                    handle_signal(&state.assistant, text.as_str()).await;
                }
            }
        }
    }
    forward.abort();
    tracing::debug!("shell disconnected");
}

/// Apply one playback lifecycle signal
async fn handle_signal(assistant: &Arc<Assistant>, text: &str) {
    let signal: WsIncoming = match serde_json::from_str(text) {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(error = %e, "unrecognized shell message");
            return;
        }
    };

    match signal {
        WsIncoming::PlaybackStarted => assistant.on_playback_started(),
        WsIncoming::PlaybackFinished => assistant.on_playback_finished().await,
        WsIncoming::SpeakingEnded => assistant.on_speaking_ended(),
        WsIncoming::StopPlayback => assistant.stop_response(),
    }
}
