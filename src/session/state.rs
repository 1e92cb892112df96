//! Observable session state

use std::time::Duration;

/// Phase of the voice-interaction cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// Nothing in flight; ready for a new hold
    #[default]
    Idle,
    /// Microphone and recognizer are live
    Recording,
    /// End-of-audio signaled; waiting for the recognizer's final transcript
    Finalizing,
    /// Generate request dispatched; waiting for its completion
    AwaitingReply,
    /// Synthesis dispatched; transient, synthesis is never awaited.
    /// Published best-effort only: the watch channel coalesces snapshots,
    /// so observers may see the cycle jump straight to [`Phase::Idle`]
    Speaking,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Finalizing => "finalizing",
            Self::AwaitingReply => "awaiting-reply",
            Self::Speaking => "speaking",
        };
        f.write_str(name)
    }
}

/// Snapshot of the session published to observers
///
/// Created once at controller construction and mutated only by the
/// controller; observers receive clones through a watch channel and never
/// write back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Current phase of the cycle
    pub phase: Phase,
    /// True while the microphone and recognizer are live
    pub recording_active: bool,
    /// Latest partial or final transcript; reset at each recording start
    pub transcript: String,
    /// Last reply from the generate endpoint; persists until overwritten
    pub reply: String,
    /// Last user-visible failure; cleared at each recording start
    pub pending_error: Option<String>,
    /// True strictly between generate dispatch and its completion
    pub awaiting_reply: bool,
}

/// Controller tuning
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Recognition locale, e.g. "en-US"
    pub locale: String,
    /// Bounded wait for a final transcript after end-of-audio; once it
    /// elapses the last partial transcript is treated as final
    pub finalize_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            locale: "en-US".to_string(),
            finalize_timeout: Duration::from_secs(2),
        }
    }
}
