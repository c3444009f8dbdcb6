//! Turn-taking coordination between the capture loop and the GUI shell
//!
//! Owns the listening/speaking/playback flags and the capture cooldown
//! clock. The capture thread reads these to decide whether a cycle may
//! run; GUI lifecycle signals and command handlers flip them. All flags
//! are atomics so no lock is shared between the two actors.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cooperative flag set shared by the capture loop and command handlers
pub struct TurnCoordinator {
    listening: AtomicBool,
    speaking: AtomicBool,
    audio_playing: AtomicBool,
    stop_requested: AtomicBool,
    loop_running: AtomicBool,
    last_accepted: Mutex<Option<Instant>>,
    cooldown: Duration,
}

impl TurnCoordinator {
    /// Create a coordinator with the given capture cooldown
    #[must_use]
    pub const fn new(cooldown: Duration) -> Self {
        Self {
            listening: AtomicBool::new(false),
            speaking: AtomicBool::new(false),
            audio_playing: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            loop_running: AtomicBool::new(false),
            last_accepted: Mutex::new(None),
            cooldown,
        }
    }

    /// Flip the listening flag, returning the new value
    #[must_use]
    pub fn toggle_listening(&self) -> bool {
        !self.listening.fetch_xor(true, Ordering::SeqCst)
    }

    /// Whether the capture loop should keep running
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Force the listening flag off (loop init failure, shutdown)
    pub fn stop_listening(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    /// Claim the single capture-loop slot; false if a loop already runs
    #[must_use]
    pub fn claim_loop(&self) -> bool {
        !self.loop_running.swap(true, Ordering::SeqCst)
    }

    /// Release the capture-loop slot (called by the loop on exit)
    pub fn release_loop(&self) {
        self.loop_running.store(false, Ordering::SeqCst);
    }

    /// Whether a capture cycle may run now
    ///
    /// True when nothing is being spoken or played and the cooldown since
    /// the last accepted utterance has elapsed.
    #[must_use]
    pub fn may_capture(&self) -> bool {
        if self.speaking.load(Ordering::SeqCst) || self.audio_playing.load(Ordering::SeqCst) {
            return false;
        }
        self.last_accepted
            .lock()
            .map(|last| last.is_none_or(|t| t.elapsed() >= self.cooldown))
            .unwrap_or(true)
    }

    /// Reset the cooldown clock after an utterance was handled
    pub fn mark_accepted(&self) {
        if let Ok(mut last) = self.last_accepted.lock() {
            *last = Some(Instant::now());
        }
    }

    /// Mark response generation as started
    pub fn begin_speaking(&self) {
        self.speaking.store(true, Ordering::SeqCst);
    }

    /// GUI signal: spoken response finished
    pub fn speaking_ended(&self) {
        self.speaking.store(false, Ordering::SeqCst);
    }

    /// GUI signal: queued audio started playing
    pub fn playback_started(&self) {
        self.audio_playing.store(true, Ordering::SeqCst);
    }

    /// GUI signal: queued audio finished (also clears speaking)
    pub fn playback_ended(&self) {
        self.audio_playing.store(false, Ordering::SeqCst);
        self.speaking.store(false, Ordering::SeqCst);
    }

    /// Forced halt: the shell stopped audio early, so no
    /// `playback_finished` signal will follow
    pub fn halt_playback(&self) {
        self.audio_playing.store(false, Ordering::SeqCst);
        self.speaking.store(false, Ordering::SeqCst);
    }

    /// Suppress audio for the current/next response
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.speaking.store(false, Ordering::SeqCst);
    }

    /// Clear the stop request before a new response
    pub fn clear_stop(&self) {
        self.stop_requested.store(false, Ordering::SeqCst);
    }

    /// Whether audio output was suppressed by the user
    #[must_use]
    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_alternates_strictly() {
        let turn = TurnCoordinator::new(Duration::from_secs(2));

        assert!(turn.toggle_listening());
        assert!(turn.is_listening());
        assert!(!turn.toggle_listening());
        assert!(!turn.is_listening());
        assert!(turn.toggle_listening());
    }

    #[test]
    fn test_loop_slot_is_exclusive() {
        let turn = TurnCoordinator::new(Duration::from_secs(2));

        assert!(turn.claim_loop());
        assert!(!turn.claim_loop());
        turn.release_loop();
        assert!(turn.claim_loop());
    }

    #[test]
    fn test_halt_playback_reopens_capture() {
        let turn = TurnCoordinator::new(Duration::ZERO);

        turn.begin_speaking();
        turn.playback_started();
        assert!(!turn.may_capture());

        // shell stopped the audio early; no playback_finished will come
        turn.halt_playback();
        assert!(turn.may_capture());
    }

    #[test]
    fn test_capture_blocked_while_speaking_or_playing() {
        let turn = TurnCoordinator::new(Duration::ZERO);
        assert!(turn.may_capture());

        turn.begin_speaking();
        assert!(!turn.may_capture());
        turn.speaking_ended();
        assert!(turn.may_capture());

        turn.playback_started();
        assert!(!turn.may_capture());
        turn.playback_ended();
        assert!(turn.may_capture());
    }

    #[test]
    fn test_cooldown_gates_captures() {
        let turn = TurnCoordinator::new(Duration::from_secs(60));

        // no prior accept: allowed immediately
        assert!(turn.may_capture());
        turn.mark_accepted();
        assert!(!turn.may_capture());
    }

    #[test]
    fn test_playback_ended_clears_speaking_too() {
        let turn = TurnCoordinator::new(Duration::ZERO);
        turn.begin_speaking();
        turn.playback_started();

        turn.playback_ended();
        assert!(turn.may_capture());
    }

    #[test]
    fn test_stop_request_roundtrip() {
        let turn = TurnCoordinator::new(Duration::ZERO);
        assert!(!turn.stop_requested());

        turn.begin_speaking();
        turn.request_stop();
        assert!(turn.stop_requested());
        assert!(turn.may_capture());

        turn.clear_stop();
        assert!(!turn.stop_requested());
    }
}
