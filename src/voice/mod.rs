//! Concrete audio and speech providers
//!
//! Microphone capture, WAV encoding, HTTP speech-to-text, HTTP
//! text-to-speech, and speaker playback.

pub mod capture;
pub mod playback;
pub mod stt;
pub mod tts;

pub use capture::{CaptureHandle, SAMPLE_RATE, samples_to_wav, start_capture};
pub use stt::WhisperStt;
pub use tts::HttpSpeaker;
