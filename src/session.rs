//! Interview session state machine
//!
//! Pure state: no I/O happens inside this module. The command layer
//! performs remote calls (topic generation, evaluation, synthesis)
//! between transitions, so every method here is synchronous and cheap.
//!
//! States: `Idle → Starting → AwaitingAnswer → Evaluating →
//! (AwaitingAnswer | Completed)`. `stop()` returns to `Idle` from
//! anywhere. The playback-finished signal is the only way out of
//! `Evaluating`, and it is idempotent: repeated signals are no-ops
//! unless `ready_for_next` is set.

use std::sync::LazyLock;

use regex::Regex;

use crate::{Error, Result};

/// Maximum number of retained proctoring notes
const MAX_PROCTORING_NOTES: usize = 10;

/// Maximum length of a single proctoring note
const MAX_NOTE_CHARS: usize = 200;

/// Maximum per-answer score
const MAX_SCORE: f64 = 5.0;

/// First `Score: n/5` occurrence in evaluation text
static SCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)score\s*:\s*(\d+(?:\.\d+)?)\s*/\s*5").expect("valid regex")
});

/// Interview session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No interview running
    Idle,
    /// Questions selected, countdown under way
    Starting,
    /// A question is open and an answer is expected
    AwaitingAnswer,
    /// Answer evaluated, waiting for feedback playback to finish
    Evaluating,
    /// Interview finished (naturally or with no questions available)
    Completed,
}

/// Outcome of advancing past a finished playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// The next question to ask, already numbered
    NextQuestion(String),
    /// Interview over; final score summary
    Completed {
        /// `Interview completed. Score: <total>/<max>` line
        summary: String,
    },
}

/// One run of the scripted interview
#[derive(Debug)]
pub struct InterviewSession {
    state: SessionState,
    selected_questions: Vec<String>,
    current_index: usize,
    collected_transcripts: Vec<String>,
    collecting_answer: bool,
    ready_for_next: bool,
    total_score: f64,
    questions_answered: usize,
    proctoring_notes: Vec<String>,
}

impl Default for InterviewSession {
    fn default() -> Self {
        Self::new()
    }
}

impl InterviewSession {
    /// Create an idle session
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SessionState::Idle,
            selected_questions: Vec::new(),
            current_index: 0,
            collected_transcripts: Vec::new(),
            collecting_answer: false,
            ready_for_next: false,
            total_score: 0.0,
            questions_answered: 0,
            proctoring_notes: Vec::new(),
        }
    }

    /// Current lifecycle state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Whether an interview is in progress
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(
            self.state,
            SessionState::Starting | SessionState::AwaitingAnswer | SessionState::Evaluating
        )
    }

    /// Whether a question is open
    #[must_use]
    pub const fn is_awaiting_answer(&self) -> bool {
        matches!(self.state, SessionState::AwaitingAnswer)
    }

    /// Whether captured speech should be buffered as answer material
    #[must_use]
    pub const fn is_collecting(&self) -> bool {
        self.is_awaiting_answer() && self.collecting_answer
    }

    /// Running score sum
    #[must_use]
    pub const fn total_score(&self) -> f64 {
        self.total_score
    }

    /// Number of answers evaluated so far
    #[must_use]
    pub const fn questions_answered(&self) -> usize {
        self.questions_answered
    }

    /// Selected topics for this run
    #[must_use]
    pub fn questions(&self) -> &[String] {
        &self.selected_questions
    }

    /// Buffered proctoring notes
    #[must_use]
    pub fn proctoring_notes(&self) -> &[String] {
        &self.proctoring_notes
    }

    /// Begin an interview with the given topics
    ///
    /// Valid from `Idle` or `Completed`. Resets score and answer
    /// counters. The caller follows up with the countdown and
    /// [`Self::open_question`].
    ///
    /// # Errors
    ///
    /// Returns error if an interview is already in progress
    pub fn begin(&mut self, questions: Vec<String>) -> Result<()> {
        if self.is_active() {
            return Err(Error::Session("interview already in progress".to_string()));
        }

        self.selected_questions = questions;
        self.current_index = 0;
        self.collected_transcripts.clear();
        self.collecting_answer = false;
        self.ready_for_next = false;
        self.total_score = 0.0;
        self.questions_answered = 0;
        self.state = SessionState::Starting;

        tracing::info!(questions = self.selected_questions.len(), "interview starting");
        Ok(())
    }

    /// Open the question at the current index
    ///
    /// Enters `AwaitingAnswer` with collection enabled and returns the
    /// numbered question text. With no questions remaining the session
    /// transitions to `Completed` and `None` is returned.
    pub fn open_question(&mut self) -> Option<String> {
        if !self.is_active() {
            return None;
        }

        if self.current_index >= self.selected_questions.len() {
            self.state = SessionState::Completed;
            return None;
        }

        let topic = &self.selected_questions[self.current_index];
        let numbered = format!(
            "[{}/{}] {topic}",
            self.current_index + 1,
            self.selected_questions.len()
        );

        self.state = SessionState::AwaitingAnswer;
        self.collecting_answer = true;
        self.ready_for_next = false;
        Some(numbered)
    }

    /// Topic of the currently open question
    #[must_use]
    pub fn current_topic(&self) -> Option<&str> {
        self.selected_questions
            .get(self.current_index)
            .map(String::as_str)
    }

    /// Buffer one recognized utterance while collecting an answer
    ///
    /// Returns false (and drops the utterance) outside the collection
    /// window.
    pub fn push_transcript(&mut self, text: &str) -> bool {
        let cleaned = text.trim();
        if cleaned.is_empty() || !self.is_collecting() {
            return false;
        }
        self.collected_transcripts.push(cleaned.to_string());
        true
    }

    /// All buffered transcripts joined into one answer
    #[must_use]
    pub fn joined_transcript(&self) -> String {
        self.collected_transcripts.join(" ").trim().to_string()
    }

    /// Stop buffering new transcripts for the open question
    ///
    /// Called before the evaluation round-trip so speech captured during
    /// the in-flight call is discarded rather than leaking into the next
    /// answer.
    pub const fn close_answer(&mut self) {
        self.collecting_answer = false;
    }

    /// Record an evaluated answer and queue the next question
    ///
    /// Parses the first `Score: n/5` from the evaluation text (clamped to
    /// [0, 5]; absent or malformed contributes 0), bumps the answered
    /// counter, clears the transcript buffer and proctoring notes, and
    /// enters `Evaluating` with `ready_for_next` set. Returns the score
    /// contribution.
    ///
    /// A call arriving after `stop()` (or outside `AwaitingAnswer`) is a
    /// no-op returning `None`: late results of in-flight evaluations are
    /// ignored.
    pub fn record_evaluation(&mut self, evaluation_text: Option<&str>) -> Option<f64> {
        if self.state != SessionState::AwaitingAnswer {
            return None;
        }

        let score = evaluation_text.and_then(parse_score).unwrap_or(0.0);
        self.total_score += score;
        self.questions_answered =
            (self.questions_answered + 1).min(self.selected_questions.len().max(1));

        self.collected_transcripts.clear();
        self.proctoring_notes.clear();
        self.collecting_answer = false;
        self.ready_for_next = true;
        self.state = SessionState::Evaluating;

        tracing::debug!(
            score,
            total = self.total_score,
            answered = self.questions_answered,
            "answer recorded"
        );
        Some(score)
    }

    /// Handle the playback-finished signal
    ///
    /// No-op unless `Evaluating` with `ready_for_next` set. Advances the
    /// index and either re-opens the next question or finishes with the
    /// score summary.
    pub fn playback_finished(&mut self) -> Option<Advance> {
        if self.state != SessionState::Evaluating || !self.ready_for_next {
            return None;
        }

        self.ready_for_next = false;
        self.current_index += 1;

        self.open_question().map_or_else(
            || {
                let summary = self.score_summary();
                self.state = SessionState::Completed;
                tracing::info!(summary = %summary, "interview completed");
                Some(Advance::Completed { summary })
            },
            |question| Some(Advance::NextQuestion(question)),
        )
    }

    /// Final score line: `Interview completed. Score: <total>/<max>`
    #[must_use]
    pub fn score_summary(&self) -> String {
        let total_questions = self.selected_questions.len();
        #[allow(clippy::cast_precision_loss)]
        let possible = (total_questions as f64) * MAX_SCORE;
        let scored = (self.total_score * 100.0).round() / 100.0;
        // whole totals still render a decimal: "20.0/25", not "20/25"
        if scored.fract() == 0.0 {
            format!("Interview completed. Score: {scored:.1}/{possible}")
        } else {
            format!("Interview completed. Score: {scored}/{possible}")
        }
    }

    /// Reset everything and return to `Idle`
    ///
    /// Discards any pending playback signal and buffered transcripts.
    pub fn stop(&mut self) {
        *self = Self::new();
        tracing::debug!("session reset");
    }

    /// Replace the proctoring notes (last 10 kept, each capped at 200
    /// characters)
    pub fn set_proctoring_notes(&mut self, notes: Vec<String>) {
        let start = notes.len().saturating_sub(MAX_PROCTORING_NOTES);
        self.proctoring_notes = notes[start..]
            .iter()
            .map(|n| n.chars().take(MAX_NOTE_CHARS).collect())
            .collect();
    }
}

/// Parse the first `Score: n/5` occurrence, clamped to [0, 5]
///
/// Only the first match counts; a malformed score is no match and
/// contributes nothing.
#[must_use]
pub fn parse_score(text: &str) -> Option<f64> {
    SCORE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|score| score.clamp(0.0, MAX_SCORE))
}
