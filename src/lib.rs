//! Talkback - push-to-talk voice assistant pipeline
//!
//! One cycle: hold to record, release to send. Speech is transcribed by a
//! streaming speech-to-text provider, the final transcript is posted to a
//! remote text-generation endpoint, and the reply is spoken back.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 Session Controller                    │
//! │   Idle → Recording → Finalizing → AwaitingReply      │
//! │        → Speaking → Idle                             │
//! └───────┬──────────────────┬──────────────────┬────────┘
//!         │                  │                  │
//! ┌───────▼───────┐ ┌────────▼────────┐ ┌───────▼───────┐
//! │ SpeechToText  │ │ ReplyGenerator  │ │  Synthesizer  │
//! │ mic + Whisper │ │ POST {message}  │ │ TTS + speaker │
//! └───────────────┘ └─────────────────┘ └───────────────┘
//! ```
//!
//! The controller owns all session state; providers deliver events through
//! generation-tagged channels so callbacks from a cancelled recognition task
//! can never race a newer one.

pub mod config;
pub mod error;
pub mod generate;
pub mod providers;
pub mod session;
pub mod voice;

pub use config::{Config, VoiceConfig};
pub use error::{Error, Result};
pub use generate::GenerateClient;
pub use providers::{ReplyGenerator, SpeechToText, SttEvent, SttStream, Synthesizer};
pub use session::{Phase, SessionConfig, SessionController, SessionHandle, SessionState};
