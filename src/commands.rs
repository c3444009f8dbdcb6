//! Command layer
//!
//! [`Assistant`] owns the session, the turn coordinator, and the remote
//! façades, and implements every command the GUI shell can issue. All
//! session access goes through a std `Mutex` that is never held across
//! an await point; remote calls happen between lock scopes and their
//! results are re-validated against the session afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::seq::SliceRandom as _;
use tokio::sync::mpsc;

use crate::completion::CompletionBackend;
use crate::config::Config;
use crate::credentials::ApiKeyStore;
use crate::detector::{is_question, normalize_question};
use crate::listener::{RecognizerFactory, spawn_capture_loop};
use crate::payload::Payload;
use crate::session::{Advance, InterviewSession, SessionState};
use crate::synthesis::Synthesizer;
use crate::turn::TurnCoordinator;
use crate::{Error, Result};

/// Capacity of the utterance channel
const UTTERANCE_BUFFER: usize = 16;

/// System prompt for free-form questions
const ASSISTANT_SYSTEM_PROMPT: &str =
    "You are a helpful voice assistant. Answer clearly in a few short sentences.";

/// System prompt for answer evaluation
const EVALUATION_SYSTEM_PROMPT: &str = "You are a friendly technical interviewer and remote \
    proctor. Give brief, constructive feedback (2-3 sentences) on the candidate's answer, then \
    a score out of 5. If proctoring notes are present, add one short remark about conduct. \
    Strictly format as: Feedback: <text> | Score: <n>/5 | Proctoring: <short note or None>";

/// Push channel from the assistant to the GUI shell
pub trait Notify: Send + Sync {
    /// Push a response payload (text plus optional audio)
    fn respond(&self, payload: Payload);

    /// Push a plain status line (countdown ticks, buffered transcripts)
    fn status(&self, line: &str);
}

/// The application core behind every GUI command
pub struct Assistant {
    config: Config,
    keys: Arc<ApiKeyStore>,
    session: Mutex<InterviewSession>,
    completion: Arc<dyn CompletionBackend>,
    synthesizer: Arc<dyn Synthesizer>,
    notifier: Arc<dyn Notify>,
    turn: Arc<TurnCoordinator>,
    tts_enabled: AtomicBool,
    recognizer_factory: RecognizerFactory,
    utterance_tx: mpsc::Sender<String>,
}

impl Assistant {
    /// Build the assistant and the utterance channel
    ///
    /// The returned receiver must be passed to [`Self::route_utterances`];
    /// captured phrases are lost otherwise.
    #[must_use]
    pub fn new(
        config: Config,
        keys: Arc<ApiKeyStore>,
        completion: Arc<dyn CompletionBackend>,
        synthesizer: Arc<dyn Synthesizer>,
        notifier: Arc<dyn Notify>,
        recognizer_factory: RecognizerFactory,
    ) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (utterance_tx, utterance_rx) = mpsc::channel(UTTERANCE_BUFFER);
        let tts_enabled = AtomicBool::new(config.voice.tts_enabled);
        let turn = Arc::new(TurnCoordinator::new(config.voice.cooldown));

        let assistant = Arc::new(Self {
            config,
            keys,
            session: Mutex::new(InterviewSession::new()),
            completion,
            synthesizer,
            notifier,
            turn,
            tts_enabled,
            recognizer_factory,
            utterance_tx,
        });
        (assistant, utterance_rx)
    }

    /// Turn coordinator shared with the GUI boundary
    #[must_use]
    pub fn turn(&self) -> &Arc<TurnCoordinator> {
        &self.turn
    }

    fn session(&self) -> MutexGuard<'_, InterviewSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current interview lifecycle state
    #[must_use]
    pub fn session_state(&self) -> SessionState {
        self.session().state()
    }

    /// Toggle microphone listening, returning the new state
    ///
    /// Enabling spawns the capture loop (one at most).
    ///
    /// # Errors
    ///
    /// Returns error if no API key is configured
    pub fn toggle_listening(&self) -> Result<bool> {
        if !self.keys.has_key() {
            return Err(Error::MissingApiKey);
        }

        let listening = self.turn.toggle_listening();
        if listening {
            // detached; the loop exits on its own when listening drops
            let _ = spawn_capture_loop(
                Arc::clone(&self.turn),
                Arc::clone(&self.recognizer_factory),
                self.utterance_tx.clone(),
            );
        }
        tracing::info!(listening, "listening toggled");
        Ok(listening)
    }

    /// Whether the microphone is currently live
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.turn.is_listening()
    }

    /// Store an API key for this process (not persisted to disk)
    ///
    /// Returns false for a blank key.
    #[must_use]
    pub fn save_api_key(&self, key: &str) -> bool {
        let key = key.trim();
        if key.is_empty() {
            return false;
        }
        self.keys.save(key);
        true
    }

    /// Remove the key from memory and delete the credential file
    ///
    /// # Errors
    ///
    /// Returns error if the credential file cannot be removed
    pub fn delete_api_key(&self) -> Result<()> {
        self.keys.delete()
    }

    /// Whether an API key is available
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.keys.has_key()
    }

    /// Toggle speech synthesis, returning the new state
    #[must_use]
    pub fn toggle_tts(&self) -> bool {
        !self.tts_enabled.fetch_xor(true, Ordering::SeqCst)
    }

    /// Suppress audio for the in-flight and next response
    ///
    /// Also drops the playback gate: the shell halts its audio on stop,
    /// so no `playback_finished` signal will arrive to do it.
    pub fn stop_response(&self) {
        self.turn.request_stop();
        self.turn.halt_playback();
    }

    /// Abort the interview and reset the session
    #[must_use]
    pub fn stop_interview(&self) -> Payload {
        self.session().stop();
        self.turn.halt_playback();
        Payload::text("Interview stopped.")
    }

    /// Answer a free-form question
    ///
    /// # Errors
    ///
    /// Returns error if no API key is configured or the completion call
    /// fails terminally
    pub async fn ask_question(&self, text: &str) -> Result<Payload> {
        let question = normalize_question(text);
        if question.is_empty() {
            return Ok(Payload::text("Please ask a question."));
        }

        self.turn.clear_stop();
        let answer = self
            .completion
            .complete(ASSISTANT_SYSTEM_PROMPT, &question)
            .await?;
        Ok(self.speak(&answer).await)
    }

    /// Start a mock interview
    ///
    /// Selects topics (remote generation, local bank fallback), makes
    /// sure the microphone is live, runs the countdown, and opens the
    /// first question.
    ///
    /// # Errors
    ///
    /// Returns error if no API key is configured or an interview is
    /// already in progress
    pub async fn start_interview(&self) -> Result<Payload> {
        if !self.keys.has_key() {
            return Err(Error::MissingApiKey);
        }
        if self.session().is_active() {
            return Err(Error::Session("interview already in progress".to_string()));
        }

        self.turn.clear_stop();
        let topics = self.select_topics().await;
        if topics.is_empty() {
            let mut session = self.session();
            session.begin(Vec::new())?;
            // empty question list: straight to Completed
            session.open_question();
            return Ok(Payload::text("No questions available."));
        }

        self.session().begin(topics)?;

        if !self.turn.is_listening() {
            // key presence was checked above
            let _ = self.toggle_listening();
        }

        for tick in ["3...", "2...", "1..."] {
            self.notifier.status(tick);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        // collection only opens after the countdown, so countdown chatter
        // never lands in the answer buffer
        let Some(first) = self.session().open_question() else {
            // stopped during the countdown
            return Ok(Payload::text("Interview stopped."));
        };

        let payload = self.speak(&first).await;
        Ok(payload)
    }

    /// Submit a typed answer to the open question
    ///
    /// # Errors
    ///
    /// Returns error if the evaluation call fails in a way that is not
    /// absorbed (absorbed failures score 0 and the interview continues)
    pub async fn submit_answer(&self, text: &str) -> Result<Payload> {
        let answer = text.trim().to_string();
        if answer.is_empty() {
            return Ok(Payload::text("Please provide an answer."));
        }
        self.finish_answer(answer).await
    }

    /// Close the spoken answer and evaluate the buffered transcripts
    ///
    /// # Errors
    ///
    /// Same surface as [`Self::submit_answer`]
    pub async fn complete_answer(&self) -> Result<Payload> {
        let answer = {
            let session = self.session();
            if !session.is_awaiting_answer() {
                return Ok(Payload::text("No question is awaiting an answer."));
            }
            session.joined_transcript()
        };

        if answer.is_empty() {
            // keep collecting, the candidate gets another go
            return Ok(Payload::text("I didn't catch an answer. Please try again."));
        }
        self.finish_answer(answer).await
    }

    /// Replace the proctoring notes attached to the next evaluation
    pub fn set_proctoring_notes(&self, notes: Vec<String>) {
        self.session().set_proctoring_notes(notes);
    }

    /// GUI signal: queued audio started playing
    pub fn on_playback_started(&self) {
        self.turn.playback_started();
    }

    /// GUI signal: spoken response finished rendering
    pub fn on_speaking_ended(&self) {
        self.turn.speaking_ended();
    }

    /// GUI signal: queued audio finished playing
    ///
    /// During an interview this is what advances past feedback to the
    /// next question (or the final summary). Safe to call repeatedly.
    pub async fn on_playback_finished(&self) {
        self.turn.playback_ended();
        self.advance_interview().await;
    }

    /// Evaluate a closed answer and enter the feedback phase
    async fn finish_answer(&self, answer: String) -> Result<Payload> {
        let (topic, notes) = {
            let mut session = self.session();
            if !session.is_awaiting_answer() {
                return Ok(Payload::text("No question is awaiting an answer."));
            }
            session.close_answer();
            let topic = session.current_topic().unwrap_or_default().to_string();
            (topic, session.proctoring_notes().join("; "))
        };

        self.turn.clear_stop();
        let evaluation = self.evaluate(&topic, &answer, &notes).await;

        let feedback = {
            let mut session = self.session();
            let Some(score) = session.record_evaluation(evaluation.as_deref()) else {
                // interview was stopped while the evaluation was in flight
                return Ok(Payload::text("Interview is not running."));
            };
            evaluation.unwrap_or_else(|| {
                format!("I couldn't evaluate that answer. Score: {score}/5")
            })
        };

        let payload = self.speak(&feedback).await;
        if !payload.has_audio() {
            // no playback-finished signal will come for a text-only payload
            self.advance_interview().await;
        }
        Ok(payload)
    }

    /// One evaluation round-trip; failures are absorbed as `None`
    async fn evaluate(&self, topic: &str, answer: &str, notes: &str) -> Option<String> {
        let notes = if notes.is_empty() { "None" } else { notes };
        let user_prompt =
            format!("Question: {topic}\nAnswer: {answer}\n\nProctoring notes: {notes}");

        match self
            .completion
            .complete(EVALUATION_SYSTEM_PROMPT, &user_prompt)
            .await
        {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(error = %e, "evaluation failed, scoring 0");
                None
            }
        }
    }

    /// Advance past a finished feedback playback, if one is pending
    async fn advance_interview(&self) {
        let advance = self.session().playback_finished();
        match advance {
            Some(Advance::NextQuestion(question)) => {
                let payload = self.speak(&question).await;
                self.notifier.respond(payload);
            }
            Some(Advance::Completed { summary }) => {
                let payload = self.speak(&summary).await;
                self.notifier.respond(payload);
            }
            None => {}
        }
    }

    /// Pick interview topics: remote generation, with the local bank as
    /// fallback only when generation yields nothing
    ///
    /// A short generated list (the model under-delivered or duplicates
    /// collapsed) is used as-is and shortens the interview.
    async fn select_topics(&self) -> Vec<String> {
        let limit = self.config.questions_limit;
        let generated = self.completion.generate_topics(limit).await;
        if !generated.is_empty() {
            return generated;
        }

        let mut bank = self.config.topic_bank.clone();
        bank.shuffle(&mut rand::thread_rng());
        bank.truncate(limit);
        tracing::debug!(topics = bank.len(), "using local topic bank");
        bank
    }

    /// Synthesize text when TTS is on and not suppressed
    async fn speak(&self, text: &str) -> Payload {
        if !self.tts_enabled.load(Ordering::SeqCst) || self.turn.stop_requested() {
            return Payload::text(text);
        }

        self.turn.begin_speaking();
        let audio = self.synthesizer.synthesize(text).await;

        // a stop request racing the synthesis call wins
        if self.turn.stop_requested() || audio.is_none() {
            self.turn.speaking_ended();
            return Payload::text(text);
        }
        Payload::pack(text, audio.as_deref())
    }

    /// Route captured utterances to their single consumer
    ///
    /// While an answer is being collected, utterances are buffered into
    /// the session and echoed as status lines. During other interview
    /// phases they are dropped (the candidate talking over feedback is
    /// not a question). Outside an interview, question-like phrases get
    /// answered.
    pub async fn route_utterances(self: Arc<Self>, mut rx: mpsc::Receiver<String>) {
        enum Route {
            Buffered,
            Dropped,
            FreeForm,
        }

        while let Some(text) = rx.recv().await {
            let route = {
                let mut session = self.session();
                if session.is_collecting() {
                    if session.push_transcript(&text) {
                        Route::Buffered
                    } else {
                        Route::Dropped
                    }
                } else if session.is_active() {
                    Route::Dropped
                } else {
                    Route::FreeForm
                }
            };

            match route {
                Route::Buffered => {
                    self.notifier.status(&format!("You: {text}"));
                    self.turn.mark_accepted();
                }
                Route::Dropped => {
                    tracing::debug!(text = %text, "utterance dropped outside collection window");
                    self.turn.mark_accepted();
                }
                Route::FreeForm => {
                    if !is_question(&text) {
                        tracing::debug!(text = %text, "not a question, ignoring");
                        continue;
                    }
                    self.notifier.status(&format!("You: {text}"));
                    match self.ask_question(&text).await {
                        Ok(payload) => self.notifier.respond(payload),
                        Err(e) => {
                            tracing::warn!(error = %e, "free-form question failed");
                            self.notifier.status(&e.to_string());
                        }
                    }
                    // cooldown starts once the question has been handled
                    self.turn.mark_accepted();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    struct FakeBackend {
        replies: StdMutex<Vec<Result<String>>>,
        topics: Vec<String>,
    }

    impl FakeBackend {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: StdMutex::new(replies),
                topics: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl CompletionBackend for FakeBackend {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Err(Error::Completion("no scripted reply".to_string()))
            } else {
                replies.remove(0)
            }
        }

        async fn generate_topics(&self, _count: usize) -> Vec<String> {
            self.topics.clone()
        }
    }

    struct NullSynth;

    #[async_trait]
    impl Synthesizer for NullSynth {
        async fn synthesize(&self, _text: &str) -> Option<Vec<u8>> {
            None
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        responses: StdMutex<Vec<Payload>>,
        statuses: StdMutex<Vec<String>>,
    }

    impl Notify for RecordingNotifier {
        fn respond(&self, payload: Payload) {
            self.responses.lock().unwrap().push(payload);
        }

        fn status(&self, line: &str) {
            self.statuses.lock().unwrap().push(line.to_string());
        }
    }

    fn build(
        backend: FakeBackend,
        with_key: bool,
    ) -> (Arc<Assistant>, Arc<RecordingNotifier>, mpsc::Receiver<String>) {
        let dir = std::env::temp_dir().join("viva-commands-test");
        let keys = Arc::new(ApiKeyStore::empty(dir.join("config.json")));
        if with_key {
            keys.save("gsk_test");
        }
        let notifier = Arc::new(RecordingNotifier::default());
        let factory: RecognizerFactory =
            Arc::new(|| Err(Error::Audio("no device in tests".to_string())));

        let config = Config {
            voice: crate::config::VoiceConfig {
                tts_enabled: false,
                ..Default::default()
            },
            ..Default::default()
        };

        let (assistant, rx) = Assistant::new(
            config,
            keys,
            Arc::new(backend),
            Arc::new(NullSynth),
            Arc::clone(&notifier) as Arc<dyn Notify>,
            factory,
        );
        (assistant, notifier, rx)
    }

    #[tokio::test]
    async fn test_toggle_listening_requires_key() {
        let (assistant, _, _rx) = build(FakeBackend::new(Vec::new()), false);
        assert!(matches!(
            assistant.toggle_listening(),
            Err(Error::MissingApiKey)
        ));
    }

    #[tokio::test]
    async fn test_ask_question_normalizes_and_answers() {
        let (assistant, _, _rx) = build(
            FakeBackend::new(vec![Ok("Rust is a systems language.".to_string())]),
            true,
        );

        let payload = assistant.ask_question("what is rust").await.unwrap();
        assert_eq!(payload.text, "Rust is a systems language.");
        assert!(!payload.has_audio());
    }

    #[tokio::test]
    async fn test_empty_typed_answer_rejected() {
        let (assistant, _, _rx) = build(FakeBackend::new(Vec::new()), true);
        let payload = assistant.submit_answer("   ").await.unwrap();
        assert_eq!(payload.text, "Please provide an answer.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_interview_falls_back_to_topic_bank() {
        let (assistant, _, _rx) = build(FakeBackend::new(Vec::new()), true);

        let payload = assistant.start_interview().await.unwrap();
        assert!(payload.text.starts_with("[1/5] "));

        let questions = assistant.session().questions().to_vec();
        assert_eq!(questions.len(), 5);
        let mut unique = questions.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_answer_feedback_and_advance_without_audio() {
        let backend = FakeBackend::new(vec![Ok(
            "Feedback: solid | Score: 4/5 | Proctoring: None".to_string(),
        )]);
        let (assistant, notifier, _rx) = build(backend, true);

        assistant.start_interview().await.unwrap();
        let feedback = assistant.submit_answer("my answer").await.unwrap();
        assert!(feedback.text.contains("Score: 4/5"));

        // text-only feedback advances immediately: the next question was
        // pushed through the notifier
        let responses = notifier.responses.lock().unwrap();
        assert_eq!(responses.len(), 1);
        assert!(responses[0].text.starts_with("[2/5] "));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interview_discards_in_flight_evaluation() {
        let (assistant, _, _rx) = build(
            FakeBackend::new(vec![Ok("Score: 5/5".to_string())]),
            true,
        );

        assistant.start_interview().await.unwrap();
        let stopped = assistant.stop_interview();
        assert_eq!(stopped.text, "Interview stopped.");

        let payload = assistant.submit_answer("late answer").await.unwrap();
        assert_eq!(payload.text, "No question is awaiting an answer.");
        assert_eq!(assistant.session().state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_stop_response_reopens_capture_gate() {
        let (assistant, _, _rx) = build(FakeBackend::new(Vec::new()), true);

        assistant.on_playback_started();
        assert!(!assistant.turn.may_capture());

        // the shell halts its audio on stop, so no playback_finished
        // signal arrives to clear the flag
        assistant.stop_response();
        assert!(assistant.turn.may_capture());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interview_clears_turn_flags() {
        let (assistant, _, _rx) = build(FakeBackend::new(Vec::new()), true);

        assistant.start_interview().await.unwrap();
        assistant.on_playback_started();

        let _ = assistant.stop_interview();
        assert!(assistant.turn.may_capture());
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_buffers_transcripts_while_collecting() {
        let (assistant, notifier, rx) = build(FakeBackend::new(Vec::new()), true);
        assistant.start_interview().await.unwrap();

        let tx = assistant.utterance_tx.clone();
        let router = tokio::spawn(Arc::clone(&assistant).route_utterances(rx));
        tx.send("an API is an interface".to_string()).await.unwrap();
        drop(tx);
        // dropping the sender alone does not close the channel; the
        // assistant holds a clone, so give the router a beat instead
        tokio::time::sleep(Duration::from_millis(50)).await;
        router.abort();

        assert_eq!(
            assistant.session().joined_transcript(),
            "an API is an interface"
        );
        let statuses = notifier.statuses.lock().unwrap();
        assert!(statuses.iter().any(|s| s == "You: an API is an interface"));
    }

    #[tokio::test]
    async fn test_toggle_tts_alternates() {
        let (assistant, _, _rx) = build(FakeBackend::new(Vec::new()), true);
        // built with TTS off
        assert!(assistant.toggle_tts());
        assert!(!assistant.toggle_tts());
    }
}
