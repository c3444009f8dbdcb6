//! Background capture loop
//!
//! A dedicated OS thread owns the recognizer (audio streams are not
//! `Send`) and forwards transcribed phrases over a channel. Exactly one
//! consumer routes them, so no handler races another for the same
//! utterance.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::Result;
use crate::turn::TurnCoordinator;
use crate::voice::{CaptureFailure, PhraseRecognizer};

/// How long the loop idles when a capture cycle is not allowed
const IDLE_INTERVAL: Duration = Duration::from_millis(100);

/// Builds a recognizer on the capture thread itself
pub type RecognizerFactory =
    Arc<dyn Fn() -> Result<Box<dyn PhraseRecognizer>> + Send + Sync>;

/// Spawn the capture loop thread
///
/// Runs until the listening flag drops. Timeouts and unclear audio are
/// routine and ignored; device or API failures are logged and the cycle
/// retried. If the recognizer cannot be built at all, listening is
/// switched off so the UI reflects the dead microphone.
pub fn spawn_capture_loop(
    turn: Arc<TurnCoordinator>,
    factory: RecognizerFactory,
    tx: mpsc::Sender<String>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        if !turn.claim_loop() {
            tracing::debug!("capture loop already running, not starting another");
            return;
        }

        let mut recognizer = match factory() {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "failed to open recognizer, disabling listening");
                turn.stop_listening();
                turn.release_loop();
                return;
            }
        };

        tracing::info!("capture loop started");
        while turn.is_listening() {
            if !turn.may_capture() {
                std::thread::sleep(IDLE_INTERVAL);
                continue;
            }

            match recognizer.capture_phrase() {
                Ok(text) => {
                    if tx.blocking_send(text).is_err() {
                        // consumer gone, nothing left to route to
                        break;
                    }
                }
                Err(CaptureFailure::Timeout | CaptureFailure::Unclear) => {}
                Err(CaptureFailure::Failed(reason)) => {
                    tracing::warn!(reason = %reason, "capture cycle failed");
                    std::thread::sleep(IDLE_INTERVAL);
                }
            }
        }

        turn.release_loop();
        tracing::info!("capture loop stopped");
    })
}
