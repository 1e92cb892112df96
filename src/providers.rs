//! Collaborator contracts consumed by the session controller
//!
//! The controller never talks to a recognizer, a generation endpoint, or a
//! synthesizer directly; it drives these three traits. Concrete
//! implementations live in [`crate::voice`] and [`crate::generate`], and
//! tests substitute channel-backed mocks.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::Result;

/// Event emitted by an active recognition stream
#[derive(Debug, Clone)]
pub enum SttEvent {
    /// A partial or final transcript for the current utterance
    Transcript {
        /// Recognized text so far
        text: String,
        /// True once the recognizer asserts the text will not be revised
        is_final: bool,
    },
    /// Terminal recognition failure; no further events follow
    Error(String),
}

/// Speech-to-text provider
///
/// One call to [`SpeechToText::start`] opens one recognition stream for one
/// utterance. The provider owns microphone capture for the lifetime of the
/// stream and delivers [`SttEvent`]s on the supplied sender, possibly from
/// background threads.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Open a recognition stream for the given locale
    ///
    /// # Errors
    ///
    /// Returns error if capture or the recognizer cannot be started
    async fn start(
        &self,
        locale: &str,
        events: mpsc::UnboundedSender<SttEvent>,
    ) -> Result<Box<dyn SttStream>>;
}

/// Handle to one active recognition stream
#[async_trait]
pub trait SttStream: Send {
    /// Signal that no more audio is coming and request a final transcript
    ///
    /// The stream finalizes cooperatively: a final [`SttEvent::Transcript`]
    /// (or [`SttEvent::Error`]) is delivered on the event sender afterwards.
    ///
    /// # Errors
    ///
    /// Returns error if the stream worker is already gone
    async fn finish(&mut self) -> Result<()>;

    /// Abort the stream without expecting further events
    ///
    /// Idempotent; safe to call on a stream that already finished.
    fn cancel(&mut self);
}

/// Remote text-generation service
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Produce a reply for the given transcript
    ///
    /// # Errors
    ///
    /// Returns error on transport failure, non-2xx status, or a malformed
    /// response body
    async fn generate(&self, message: &str) -> Result<String>;
}

/// Text-to-speech provider
pub trait Synthesizer: Send + Sync {
    /// Speak the given text, fire-and-forget
    ///
    /// No completion signal is consumed by the caller; failures are logged
    /// by the implementation. Overlapping `speak` calls are a known
    /// limitation, not a guarantee: a second utterance may play over the
    /// first rather than queue behind it.
    fn speak(&self, text: &str, locale: &str);
}
