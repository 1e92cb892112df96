//! Audio playback to speakers
//!
//! Blocking, one utterance at a time; callers that want fire-and-forget
//! semantics run these from a blocking task.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Decode MP3 bytes and play them, blocking until playback completes
///
/// # Errors
///
/// Returns error if decoding fails or no output device is usable
pub fn play_mp3_blocking(mp3_data: &[u8]) -> Result<()> {
    let samples = decode_mp3(mp3_data)?;
    play_samples_blocking(&samples)
}

/// Play f32 samples on the default output device, blocking until done
///
/// # Errors
///
/// Returns error if no output device or suitable configuration exists
pub fn play_samples_blocking(samples: &[f32]) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let config = output_config(&device)?;
    let channels = usize::from(config.channels);

    let samples: Arc<[f32]> = samples.into();
    let position = Arc::new(AtomicUsize::new(0));

    let stream_samples = Arc::clone(&samples);
    let stream_position = Arc::clone(&position);
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let pos = stream_position.load(Ordering::Relaxed);
                    let sample = stream_samples.get(pos).copied().unwrap_or(0.0);
                    frame.fill(sample);
                    if pos < stream_samples.len() {
                        stream_position.store(pos + 1, Ordering::Relaxed);
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    // Sleep out the utterance instead of polling the callback; the position
    // check afterwards only bounds the tail-end latency.
    let duration_ms = (samples.len() as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
    std::thread::sleep(Duration::from_millis(duration_ms));

    let deadline = std::time::Instant::now() + Duration::from_millis(500);
    while position.load(Ordering::Relaxed) < samples.len()
        && std::time::Instant::now() < deadline
    {
        std::thread::sleep(Duration::from_millis(20));
    }

    drop(stream);
    tracing::debug!(samples = samples.len(), "playback complete");
    Ok(())
}

/// Pick a mono (or stereo fallback) output configuration at 24kHz
fn output_config(device: &cpal::Device) -> Result<StreamConfig> {
    let rate = SampleRate(PLAYBACK_SAMPLE_RATE);
    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .min_by_key(cpal::SupportedStreamConfigRange::channels)
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

    Ok(supported.with_sample_rate(rate).config())
}

/// Decode MP3 bytes to mono f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) if frame.channels == 2 => {
                samples.extend(frame.data.chunks_exact(2).map(|pair| {
                    let left = f32::from(pair[0]) / 32768.0;
                    let right = f32::from(pair[1]) / 32768.0;
                    f32::midpoint(left, right)
                }));
            }
            Ok(frame) => {
                samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_playback_is_a_no_op() {
        // Must succeed without touching any audio device.
        assert!(play_samples_blocking(&[]).is_ok());
    }

    #[test]
    fn garbage_mp3_is_rejected_or_empty() {
        // minimp3 skips unsyncable garbage; either outcome is acceptable as
        // long as it does not panic.
        let _ = decode_mp3(&[0x13, 0x37, 0x00, 0xff]);
    }
}
