//! Text-to-speech over an OpenAI-style speech API

use crate::providers::Synthesizer;
use crate::voice::playback;
use crate::{Error, Result};

/// Request body for an OpenAI-style speech endpoint
#[derive(serde::Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    speed: f32,
}

/// Synthesizer backed by an OpenAI-style HTTP API
#[derive(Clone)]
pub struct HttpSpeaker {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    voice: String,
    speed: f32,
}

impl HttpSpeaker {
    /// Create a new synthesizer
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        voice: impl Into<String>,
        speed: f32,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::Config("API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
            voice: voice.into(),
            speed,
        })
    }

    /// Synthesize text to MP3 bytes
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "TTS API error");
            return Err(Error::Tts(format!("TTS API error {status}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

impl Synthesizer for HttpSpeaker {
    fn speak(&self, text: &str, _locale: &str) {
        // Fire-and-forget: synthesis and playback run on their own tasks,
        // failures are logged and never reach the session. A second call
        // while one is playing will play on top of it.
        let speaker = self.clone();
        let text = text.to_string();
        tokio::spawn(async move {
            tracing::debug!(chars = text.len(), "speaking");
            let audio = match speaker.synthesize(&text).await {
                Ok(audio) => audio,
                Err(e) => {
                    tracing::error!(error = %e, "speech synthesis failed");
                    return;
                }
            };

            let played =
                tokio::task::spawn_blocking(move || playback::play_mp3_blocking(&audio)).await;
            match played {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "playback failed"),
                Err(e) => tracing::error!(error = %e, "playback task panicked"),
            }
        });
    }
}
