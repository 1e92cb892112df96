//! Speech-to-text over a Whisper-style HTTP transcription API
//!
//! Each recognition stream owns microphone capture for one utterance. While
//! recording, the accumulated buffer is re-transcribed on an interval to
//! produce partial transcripts; `finish()` stops capture and transcribes the
//! full utterance for the final result.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::providers::{SpeechToText, SttEvent, SttStream};
use crate::voice::capture::{self, SAMPLE_RATE, samples_to_wav};
use crate::{Error, Result};

/// Utterances shorter than this (0.1s) are reported as an empty final
/// transcript instead of being uploaded
#[allow(clippy::cast_possible_truncation)]
const MIN_UTTERANCE_SAMPLES: usize = SAMPLE_RATE as usize / 10;

/// Response from a Whisper-style transcription API
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Speech-to-text provider backed by a Whisper-style HTTP API
pub struct WhisperStt {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    partial_interval: Duration,
}

impl WhisperStt {
    /// Create a new provider
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::Config(
                "API key required for transcription".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
            partial_interval: Duration::from_millis(1500),
        })
    }
}

#[async_trait]
impl SpeechToText for WhisperStt {
    async fn start(
        &self,
        locale: &str,
        events: mpsc::UnboundedSender<SttEvent>,
    ) -> Result<Box<dyn SttStream>> {
        let (capture, samples) = capture::start_capture()?;
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let worker = StreamWorker {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            language: language_code(locale),
            events,
            capture,
            buffer: Vec::new(),
        };
        tokio::spawn(worker.run(samples, commands_rx, self.partial_interval));

        Ok(Box::new(WhisperStream {
            commands: commands_tx,
        }))
    }
}

/// Commands from the stream handle to its worker
#[derive(Debug)]
enum StreamCommand {
    Finish,
    Cancel,
}

/// Handle returned to the controller; the worker exits when this drops
struct WhisperStream {
    commands: mpsc::UnboundedSender<StreamCommand>,
}

#[async_trait]
impl SttStream for WhisperStream {
    async fn finish(&mut self) -> Result<()> {
        self.commands
            .send(StreamCommand::Finish)
            .map_err(|_| Error::Stt("recognition worker is gone".to_string()))
    }

    fn cancel(&mut self) {
        let _ = self.commands.send(StreamCommand::Cancel);
    }
}

/// Per-utterance worker: accumulates samples and talks to the API
struct StreamWorker {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    language: String,
    events: mpsc::UnboundedSender<SttEvent>,
    capture: capture::CaptureHandle,
    buffer: Vec<f32>,
}

impl StreamWorker {
    async fn run(
        mut self,
        mut samples: mpsc::UnboundedReceiver<Vec<f32>>,
        mut commands: mpsc::UnboundedReceiver<StreamCommand>,
        partial_interval: Duration,
    ) {
        let mut ticker = tokio::time::interval(partial_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Discard the immediate first tick.
        ticker.tick().await;

        let mut grown = false;
        loop {
            tokio::select! {
                chunk = samples.recv() => {
                    match chunk {
                        Some(chunk) => {
                            self.buffer.extend_from_slice(&chunk);
                            grown = true;
                        }
                        None => {
                            // Capture thread died without a stop request.
                            self.capture.stop();
                            let _ = self
                                .events
                                .send(SttEvent::Error("audio capture ended unexpectedly".to_string()));
                            return;
                        }
                    }
                }
                _ = ticker.tick() => {
                    if grown && self.buffer.len() >= MIN_UTTERANCE_SAMPLES {
                        self.emit_partial().await;
                        grown = false;
                    }
                }
                command = commands.recv() => {
                    match command {
                        Some(StreamCommand::Finish) => {
                            self.finalize(&mut samples).await;
                        }
                        Some(StreamCommand::Cancel) | None => {
                            self.capture.stop();
                            tracing::debug!("recognition stream cancelled");
                        }
                    }
                    return;
                }
            }
        }
    }

    /// Transcribe the buffer so far; partial failures are logged, not fatal
    async fn emit_partial(&self) {
        match self.transcribe().await {
            Ok(text) if !text.is_empty() => {
                let _ = self.events.send(SttEvent::Transcript {
                    text,
                    is_final: false,
                });
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "partial transcription failed");
            }
        }
    }

    /// Stop capture, drain remaining samples, and emit the final transcript
    async fn finalize(&mut self, samples: &mut mpsc::UnboundedReceiver<Vec<f32>>) {
        self.capture.stop();
        while let Ok(chunk) = samples.try_recv() {
            self.buffer.extend_from_slice(&chunk);
        }

        if self.buffer.len() < MIN_UTTERANCE_SAMPLES {
            tracing::debug!(samples = self.buffer.len(), "utterance too short to transcribe");
            let _ = self.events.send(SttEvent::Transcript {
                text: String::new(),
                is_final: true,
            });
            return;
        }

        match self.transcribe().await {
            Ok(text) => {
                let _ = self.events.send(SttEvent::Transcript {
                    text,
                    is_final: true,
                });
            }
            Err(e) => {
                let _ = self.events.send(SttEvent::Error(e.to_string()));
            }
        }
    }

    /// Upload the accumulated buffer as WAV and return the transcript
    async fn transcribe(&self) -> Result<String> {
        tracing::debug!(samples = self.buffer.len(), "transcribing");

        let wav = samples_to_wav(&self.buffer, SAMPLE_RATE)?;
        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav)
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("language", self.language.clone());

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(Error::Stt(format!("transcription API error {status}")));
        }

        let decoded: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| Error::Stt(format!("malformed transcription response: {e}")))?;

        Ok(decoded.text.trim().to_string())
    }
}

/// Map a BCP 47 locale to the ISO 639-1 code Whisper expects
fn language_code(locale: &str) -> String {
    locale
        .split(['-', '_'])
        .next()
        .unwrap_or(locale)
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_code_strips_region() {
        assert_eq!(language_code("en-US"), "en");
        assert_eq!(language_code("fi_FI"), "fi");
        assert_eq!(language_code("de"), "de");
    }

    #[test]
    fn rejects_empty_api_key() {
        assert!(WhisperStt::new("https://example.com/v1/transcriptions", "", "whisper-1").is_err());
    }
}
