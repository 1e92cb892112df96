//! Configuration for the talkback pipeline
//!
//! Layering: built-in defaults, then an optional TOML file
//! (`~/.config/talkback/config.toml`), then `TALKBACK_*` environment
//! variables. The STT/TTS API key comes from `OPENAI_API_KEY`.

use std::path::PathBuf;
use std::time::Duration;

use crate::session::SessionConfig;
use crate::{Error, Result};

/// Talkback configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Generate endpoint URL (receives `{"message"}`, returns `{"answer"}`)
    pub generate_url: String,

    /// Recognition and synthesis locale
    pub locale: String,

    /// Bounded wait for a final transcript after end-of-audio, in ms
    pub finalize_timeout_ms: u64,

    /// Voice provider configuration
    pub voice: VoiceConfig,
}

/// Voice provider configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Transcription endpoint URL
    pub stt_url: String,

    /// Transcription model (e.g. "whisper-1")
    pub stt_model: String,

    /// Speech endpoint URL
    pub tts_url: String,

    /// Speech model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier
    pub tts_speed: f32,

    /// API key for the STT/TTS endpoints (from `OPENAI_API_KEY`)
    pub api_key: Option<String>,
}

/// Optional on-disk configuration file
#[derive(Debug, Default, serde::Deserialize)]
struct FileConfig {
    generate_url: Option<String>,
    locale: Option<String>,
    finalize_timeout_ms: Option<u64>,
    #[serde(default)]
    voice: FileVoiceConfig,
}

#[derive(Debug, Default, serde::Deserialize)]
struct FileVoiceConfig {
    stt_url: Option<String>,
    stt_model: Option<String>,
    tts_url: Option<String>,
    tts_model: Option<String>,
    tts_voice: Option<String>,
    tts_speed: Option<f32>,
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns error if the config file exists but cannot be parsed
    pub fn load() -> Result<Self> {
        let file = match Self::config_path() {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)?;
                let parsed: FileConfig = toml::from_str(&content).map_err(|e| {
                    Error::Config(format!("failed to parse {}: {e}", path.display()))
                })?;
                tracing::debug!(path = %path.display(), "loaded config file");
                parsed
            }
            _ => FileConfig::default(),
        };

        let mut config = Self::from_file(file);
        config.apply_env();
        Ok(config)
    }

    /// Path to the user config file, if a config directory exists
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "talkback", "talkback")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Merge file values over built-in defaults
    fn from_file(file: FileConfig) -> Self {
        Self {
            generate_url: file
                .generate_url
                .unwrap_or_else(|| "http://localhost:5001/process".to_string()),
            locale: file.locale.unwrap_or_else(|| "en-US".to_string()),
            finalize_timeout_ms: file.finalize_timeout_ms.unwrap_or(2000),
            voice: VoiceConfig {
                stt_url: file.voice.stt_url.unwrap_or_else(|| {
                    "https://api.openai.com/v1/audio/transcriptions".to_string()
                }),
                stt_model: file
                    .voice
                    .stt_model
                    .unwrap_or_else(|| "whisper-1".to_string()),
                tts_url: file
                    .voice
                    .tts_url
                    .unwrap_or_else(|| "https://api.openai.com/v1/audio/speech".to_string()),
                tts_model: file.voice.tts_model.unwrap_or_else(|| "tts-1".to_string()),
                tts_voice: file.voice.tts_voice.unwrap_or_else(|| "alloy".to_string()),
                tts_speed: file.voice.tts_speed.unwrap_or(1.0),
                api_key: None,
            },
        }
    }

    /// Apply environment overrides on top of file values
    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("TALKBACK_GENERATE_URL") {
            self.generate_url = url;
        }
        if let Ok(locale) = std::env::var("TALKBACK_LOCALE") {
            self.locale = locale;
        }
        if let Ok(timeout) = std::env::var("TALKBACK_FINALIZE_TIMEOUT_MS")
            && let Ok(parsed) = timeout.parse()
        {
            self.finalize_timeout_ms = parsed;
        }
        if let Ok(url) = std::env::var("TALKBACK_STT_URL") {
            self.voice.stt_url = url;
        }
        if let Ok(model) = std::env::var("TALKBACK_STT_MODEL") {
            self.voice.stt_model = model;
        }
        if let Ok(url) = std::env::var("TALKBACK_TTS_URL") {
            self.voice.tts_url = url;
        }
        if let Ok(model) = std::env::var("TALKBACK_TTS_MODEL") {
            self.voice.tts_model = model;
        }
        if let Ok(voice) = std::env::var("TALKBACK_TTS_VOICE") {
            self.voice.tts_voice = voice;
        }
        if let Ok(speed) = std::env::var("TALKBACK_TTS_SPEED")
            && let Ok(parsed) = speed.parse()
        {
            self.voice.tts_speed = parsed;
        }
        self.voice.api_key = std::env::var("OPENAI_API_KEY").ok();
    }

    /// Controller tuning derived from this configuration
    #[must_use]
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            locale: self.locale.clone(),
            finalize_timeout: Duration::from_millis(self.finalize_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_a_file() {
        let config = Config::from_file(FileConfig::default());
        assert_eq!(config.locale, "en-US");
        assert_eq!(config.finalize_timeout_ms, 2000);
        assert_eq!(config.voice.stt_model, "whisper-1");
        assert!((config.voice.tts_speed - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn file_values_override_defaults() {
        let file: FileConfig = toml::from_str(
            r#"
            generate_url = "https://assistant.example.com/process"
            locale = "fi-FI"
            finalize_timeout_ms = 500

            [voice]
            tts_voice = "nova"
            "#,
        )
        .unwrap();

        let config = Config::from_file(file);
        assert_eq!(config.generate_url, "https://assistant.example.com/process");
        assert_eq!(config.locale, "fi-FI");
        assert_eq!(config.finalize_timeout_ms, 500);
        assert_eq!(config.voice.tts_voice, "nova");
        // Untouched sections keep defaults.
        assert_eq!(config.voice.stt_model, "whisper-1");
    }

    #[test]
    fn session_config_converts_timeout() {
        let mut config = Config::from_file(FileConfig::default());
        config.finalize_timeout_ms = 750;
        assert_eq!(config.session().finalize_timeout, Duration::from_millis(750));
        assert_eq!(config.session().locale, "en-US");
    }

    #[test]
    fn unknown_file_keys_are_rejected_gracefully() {
        // Extra keys are ignored rather than failing the load.
        let parsed: std::result::Result<FileConfig, _> =
            toml::from_str("unexpected_key = true");
        assert!(parsed.is_ok());
    }
}
