//! Interview flow integration tests
//!
//! Drives the command layer end to end through its seams: scripted
//! completions, fake synthesis, collected notifications.

use viva::session::SessionState;

mod common;
use common::{FakeCompletion, FakeSynth, assistant_with};

fn scored(n: u32) -> viva::Result<String> {
    Ok(format!("Feedback: fine | Score: {n}/5 | Proctoring: None"))
}

#[tokio::test(start_paused = true)]
async fn test_full_interview_reaches_summary() {
    let backend = FakeCompletion::new(vec![
        scored(4),
        scored(4),
        scored(4),
        scored(4),
        scored(4),
    ])
    .with_topics(&["API", "Git", "Docker", "Linux", "CSS"]);
    let (assistant, notifier) = assistant_with(backend, FakeSynth { audio: None }, false);

    let first = assistant.start_interview().await.unwrap();
    assert_eq!(first.text, "[1/5] API");

    for _ in 0..5 {
        assistant.submit_answer("a reasonable answer").await.unwrap();
    }

    let texts = notifier.response_texts();
    // four advances to the next question, then the summary
    assert_eq!(texts.len(), 5);
    assert_eq!(texts[0], "[2/5] Git");
    assert_eq!(texts[4], "Interview completed. Score: 20.0/25");
    assert_eq!(assistant.session_state(), SessionState::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_generated_topics_take_priority_over_bank() {
    let backend = FakeCompletion::new(Vec::new()).with_topics(&["Rust", "Go", "C", "Zig", "Nim"]);
    let (assistant, _) = assistant_with(backend, FakeSynth { audio: None }, false);

    let first = assistant.start_interview().await.unwrap();
    assert_eq!(first.text, "[1/5] Rust");
}

#[tokio::test(start_paused = true)]
async fn test_short_generated_list_shortens_interview() {
    // three topics survived generation; the bank must not top them up
    let backend =
        FakeCompletion::new(vec![scored(5), scored(5), scored(5)]).with_topics(&["a", "b", "c"]);
    let (assistant, notifier) = assistant_with(backend, FakeSynth { audio: None }, false);

    let first = assistant.start_interview().await.unwrap();
    assert_eq!(first.text, "[1/3] a");

    for _ in 0..3 {
        assistant.submit_answer("answer").await.unwrap();
    }

    let texts = notifier.response_texts();
    assert_eq!(texts.last().unwrap(), "Interview completed. Score: 15.0/15");
}

#[tokio::test(start_paused = true)]
async fn test_countdown_precedes_first_question() {
    let backend = FakeCompletion::new(Vec::new()).with_topics(&["a", "b", "c", "d", "e"]);
    let (assistant, notifier) = assistant_with(backend, FakeSynth { audio: None }, false);

    assistant.start_interview().await.unwrap();

    let statuses = notifier.statuses.lock().unwrap().clone();
    assert_eq!(statuses, vec!["3...", "2...", "1..."]);
}

#[tokio::test(start_paused = true)]
async fn test_playback_signal_advances_exactly_once() {
    let backend = FakeCompletion::new(vec![scored(3)]).with_topics(&["a", "b", "c", "d", "e"]);
    let (assistant, notifier) = assistant_with(
        backend,
        FakeSynth {
            audio: Some(vec![0xAA; 16]),
        },
        true,
    );

    assistant.start_interview().await.unwrap();
    let feedback = assistant.submit_answer("answer").await.unwrap();
    // audio attached, so nothing advances until the shell says so
    assert!(feedback.has_audio());
    assert!(notifier.responses.lock().unwrap().is_empty());

    assistant.on_playback_finished().await;
    assistant.on_playback_finished().await;

    let texts = notifier.response_texts();
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0], "[2/5] b");
}

#[tokio::test(start_paused = true)]
async fn test_evaluation_failure_scores_zero_and_continues() {
    let backend = FakeCompletion::new(vec![
        Err(viva::Error::Completion("backend down".to_string())),
        scored(5),
    ])
    .with_topics(&["a", "b", "c", "d", "e"]);
    let (assistant, _) = assistant_with(backend, FakeSynth { audio: None }, false);

    assistant.start_interview().await.unwrap();
    let feedback = assistant.submit_answer("answer one").await.unwrap();
    assert!(feedback.text.contains("Score: 0/5"));

    // the interview is still alive and on the next question
    assert_eq!(assistant.session_state(), SessionState::AwaitingAnswer);
}

#[tokio::test(start_paused = true)]
async fn test_stop_resets_and_allows_restart() {
    let backend =
        FakeCompletion::new(Vec::new()).with_topics(&["a", "b", "c", "d", "e"]);
    let (assistant, _) = assistant_with(backend, FakeSynth { audio: None }, false);

    assistant.start_interview().await.unwrap();
    assert!(assistant.start_interview().await.is_err());

    let stopped = assistant.stop_interview();
    assert_eq!(stopped.text, "Interview stopped.");
    assert_eq!(assistant.session_state(), SessionState::Idle);

    let first = assistant.start_interview().await.unwrap();
    assert_eq!(first.text, "[1/5] a");
}

#[tokio::test(start_paused = true)]
async fn test_empty_spoken_answer_keeps_question_open() {
    let backend =
        FakeCompletion::new(Vec::new()).with_topics(&["a", "b", "c", "d", "e"]);
    let (assistant, _) = assistant_with(backend, FakeSynth { audio: None }, false);

    assistant.start_interview().await.unwrap();
    let retry = assistant.complete_answer().await.unwrap();
    assert_eq!(retry.text, "I didn't catch an answer. Please try again.");
    assert_eq!(assistant.session_state(), SessionState::AwaitingAnswer);
}
