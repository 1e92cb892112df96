//! Voice session controller
//!
//! Drives one cycle of hold → record → transcribe → generate → speak.
//! All state mutation happens on the controller's own task: provider
//! callbacks and handle commands are funneled through a single event
//! channel, and every recognition task is tagged with a generation counter
//! so callbacks from a cancelled task are discarded instead of racing a
//! newer one.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::providers::{ReplyGenerator, SpeechToText, SttEvent, SttStream, Synthesizer};
use crate::session::{Phase, SessionConfig, SessionState};

/// Events processed on the controller task
#[derive(Debug)]
enum SessionEvent {
    /// User pressed the hold control
    BeginHold,
    /// User released the hold control
    EndHold,
    /// Transcript from a recognition stream
    Transcript {
        generation: u64,
        text: String,
        is_final: bool,
    },
    /// Terminal recognition failure
    RecognitionError { generation: u64, message: String },
    /// No final transcript arrived within the finalize window
    FinalizeTimeout { generation: u64 },
    /// Generate call completed; Err carries the user-visible description
    ReplyReady {
        generation: u64,
        result: std::result::Result<String, String>,
    },
    /// Stop the controller task
    Shutdown,
}

/// Cloneable handle for driving and observing a [`SessionController`]
#[derive(Clone)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<SessionEvent>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Press the hold control; idempotent while already recording
    pub fn begin_hold(&self) {
        let _ = self.events.send(SessionEvent::BeginHold);
    }

    /// Release the hold control; no-op unless recording
    pub fn end_hold(&self) {
        let _ = self.events.send(SessionEvent::EndHold);
    }

    /// Stop the controller task
    pub fn shutdown(&self) {
        let _ = self.events.send(SessionEvent::Shutdown);
    }

    /// Subscribe to state snapshots
    ///
    /// Snapshots arrive over a watch channel, which keeps only the latest
    /// value: a slow observer sees the current state, not every transition.
    /// Transient phases such as [`Phase::Speaking`] may be coalesced away
    /// entirely; terminal snapshots (idle with the reply, or with
    /// `pending_error` set) are always observable.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Current state snapshot
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }
}

/// Owns the session state and mediates between the three providers
pub struct SessionController {
    config: SessionConfig,
    stt: Arc<dyn SpeechToText>,
    generator: Arc<dyn ReplyGenerator>,
    synthesizer: Arc<dyn Synthesizer>,
    state: SessionState,
    generation: u64,
    active: Option<Box<dyn SttStream>>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    watch_tx: watch::Sender<SessionState>,
}

impl SessionController {
    /// Create a controller and its handle
    #[must_use]
    pub fn new(
        config: SessionConfig,
        stt: Arc<dyn SpeechToText>,
        generator: Arc<dyn ReplyGenerator>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> (Self, SessionHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (watch_tx, watch_rx) = watch::channel(SessionState::default());

        let handle = SessionHandle {
            events: events_tx.clone(),
            state: watch_rx,
        };

        let controller = Self {
            config,
            stt,
            generator,
            synthesizer,
            state: SessionState::default(),
            generation: 0,
            active: None,
            events_tx,
            events_rx,
            watch_tx,
        };

        (controller, handle)
    }

    /// Process events until [`SessionHandle::shutdown`] is called or every
    /// handle is dropped
    pub async fn run(mut self) {
        loop {
            let Some(event) = self.events_rx.recv().await else {
                break;
            };
            if matches!(event, SessionEvent::Shutdown) {
                break;
            }
            self.handle_event(event).await;
        }

        self.cancel_active();
        tracing::debug!("session controller stopped");
    }

    async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::BeginHold => self.begin_hold().await,
            SessionEvent::EndHold => self.end_hold().await,
            SessionEvent::Transcript {
                generation,
                text,
                is_final,
            } => self.on_transcript(generation, text, is_final),
            SessionEvent::RecognitionError {
                generation,
                message,
            } => self.on_recognition_error(generation, message),
            SessionEvent::FinalizeTimeout { generation } => self.on_finalize_timeout(generation),
            SessionEvent::ReplyReady { generation, result } => self.on_reply(generation, result),
            SessionEvent::Shutdown => {}
        }
    }

    /// Transition `Idle → Recording`, cancelling any stale finalizing task
    async fn begin_hold(&mut self) {
        match self.state.phase {
            Phase::Recording => {
                tracing::debug!("already recording, ignoring hold");
                return;
            }
            Phase::AwaitingReply | Phase::Speaking => {
                // The generate call is not cancellable; a hold here would
                // violate the recording/awaiting exclusivity invariant.
                tracing::debug!(phase = %self.state.phase, "reply in flight, ignoring hold");
                return;
            }
            Phase::Finalizing => {
                tracing::debug!(
                    generation = self.generation,
                    "new hold while finalizing, cancelling stale recognition task"
                );
                self.cancel_active();
            }
            Phase::Idle => {}
        }

        self.generation += 1;
        self.state.transcript.clear();
        self.state.pending_error = None;

        let (stt_tx, stt_rx) = mpsc::unbounded_channel();
        match self.stt.start(&self.config.locale, stt_tx).await {
            Ok(stream) => {
                self.active = Some(stream);
                self.spawn_forwarder(stt_rx);
                self.state.recording_active = true;
                self.state.phase = Phase::Recording;
                tracing::info!(generation = self.generation, "recording started");
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to start recognition");
                self.state.pending_error = Some(e.to_string());
                self.state.phase = Phase::Idle;
            }
        }
        self.publish();
    }

    /// Transition `Recording → Finalizing` by signaling end-of-audio
    async fn end_hold(&mut self) {
        if self.state.phase != Phase::Recording {
            tracing::debug!(phase = %self.state.phase, "not recording, ignoring release");
            return;
        }

        if let Some(stream) = self.active.as_mut()
            && let Err(e) = stream.finish().await
        {
            tracing::error!(error = %e, "failed to finalize recognition");
            self.state.pending_error = Some(e.to_string());
            self.cancel_active();
            self.state.phase = Phase::Idle;
            self.publish();
            return;
        }

        self.state.phase = Phase::Finalizing;
        self.publish();

        // The recognizer may never report a final result after end-of-audio;
        // fall back to the last partial once the window elapses.
        let events = self.events_tx.clone();
        let generation = self.generation;
        let timeout = self.config.finalize_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events.send(SessionEvent::FinalizeTimeout { generation });
        });
    }

    fn on_transcript(&mut self, generation: u64, text: String, is_final: bool) {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "stale transcript discarded");
            return;
        }
        if !matches!(self.state.phase, Phase::Recording | Phase::Finalizing) {
            tracing::debug!(phase = %self.state.phase, "transcript outside recording, discarded");
            return;
        }

        self.state.transcript = text;
        if is_final {
            tracing::info!(transcript = %self.state.transcript, "final transcript");
            self.complete_recognition();
        } else {
            self.publish();
        }
    }

    fn on_recognition_error(&mut self, generation: u64, message: String) {
        if generation != self.generation {
            tracing::debug!(generation, "stale recognition error discarded");
            return;
        }
        if !matches!(self.state.phase, Phase::Recording | Phase::Finalizing) {
            return;
        }

        tracing::error!(error = %message, "recognition failed");
        self.cancel_active();
        self.state.pending_error = Some(message);
        self.state.phase = Phase::Idle;
        self.publish();
    }

    fn on_finalize_timeout(&mut self, generation: u64) {
        if generation != self.generation || self.state.phase != Phase::Finalizing {
            return;
        }

        tracing::warn!(
            transcript = %self.state.transcript,
            "no final transcript within the finalize window, using last partial"
        );
        self.complete_recognition();
    }

    /// Close out recognition and either dispatch the generate call or, for
    /// an empty transcript, return to idle without any network traffic
    fn complete_recognition(&mut self) {
        self.cancel_active();

        let message = self.state.transcript.trim().to_string();
        if message.is_empty() {
            tracing::info!("empty transcript, skipping generate call");
            self.state.phase = Phase::Idle;
            self.publish();
            return;
        }

        self.state.awaiting_reply = true;
        self.state.phase = Phase::AwaitingReply;
        self.publish();

        let generator = Arc::clone(&self.generator);
        let events = self.events_tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let result = generator
                .generate(&message)
                .await
                .map_err(|e| format!("API error: {e}"));
            let _ = events.send(SessionEvent::ReplyReady { generation, result });
        });
    }

    fn on_reply(&mut self, generation: u64, result: std::result::Result<String, String>) {
        if generation != self.generation {
            tracing::debug!(generation, "stale reply discarded");
            return;
        }
        if self.state.phase != Phase::AwaitingReply {
            return;
        }

        self.state.awaiting_reply = false;
        match result {
            Ok(answer) => {
                self.state.reply.clone_from(&answer);
                self.state.phase = Phase::Speaking;
                self.publish();

                self.synthesizer.speak(&answer, &self.config.locale);

                // Synthesis is never awaited; the cycle is over.
                self.state.phase = Phase::Idle;
                self.publish();
            }
            Err(message) => {
                tracing::error!(error = %message, "generate call failed");
                self.state.pending_error = Some(message);
                self.state.phase = Phase::Idle;
                self.publish();
            }
        }
    }

    /// Tag recognition events with the generation that produced them and
    /// funnel them onto the controller task
    fn spawn_forwarder(&self, mut stt_rx: mpsc::UnboundedReceiver<SttEvent>) {
        let events = self.events_tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            while let Some(event) = stt_rx.recv().await {
                let forwarded = match event {
                    SttEvent::Transcript { text, is_final } => SessionEvent::Transcript {
                        generation,
                        text,
                        is_final,
                    },
                    SttEvent::Error(message) => SessionEvent::RecognitionError {
                        generation,
                        message,
                    },
                };
                if events.send(forwarded).is_err() {
                    break;
                }
            }
        });
    }

    fn cancel_active(&mut self) {
        if let Some(mut stream) = self.active.take() {
            stream.cancel();
        }
        self.state.recording_active = false;
    }

    fn publish(&self) {
        debug_assert!(
            !(self.state.recording_active && self.state.awaiting_reply),
            "recording and awaiting-reply must be mutually exclusive"
        );
        let _ = self.watch_tx.send(self.state.clone());
    }
}
