//! viva: voice-driven mock interview assistant
//!
//! Speech captured from the microphone is transcribed, routed to an
//! LLM (free-form Q&A or scripted interview evaluation), optionally
//! synthesized back to audio, and pushed to a local GUI shell as
//! `{text, audio}` payloads.
//!
//! ```text
//!  microphone ──▶ capture loop ──▶ utterance router ──▶ completion API
//!                 (own thread)      (single consumer)        │
//!                                                            ▼
//!  GUI shell ◀── HTTP + WebSocket ◀── payloads ◀── speech synthesis
//! ```
//!
//! The capture loop runs on a dedicated OS thread and hands transcribed
//! phrases to exactly one async consumer; the interview session itself
//! is a pure state machine with no I/O.

pub mod commands;
pub mod completion;
pub mod config;
pub mod credentials;
pub mod detector;
pub mod error;
pub mod listener;
pub mod payload;
pub mod server;
pub mod session;
pub mod synthesis;
pub mod turn;
pub mod voice;

pub use error::{Error, Result};
