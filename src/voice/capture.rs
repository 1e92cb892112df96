//! Microphone capture
//!
//! cpal input streams are not `Send`, so the stream lives on a dedicated
//! thread for its whole lifetime and samples are bridged into an async
//! channel from the device callback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream};
use tokio::sync::mpsc;

use crate::{Error, Result};

/// Sample rate for capture (16kHz mono, what speech APIs expect)
pub const SAMPLE_RATE: u32 = 16_000;

/// How long to wait for the capture thread to confirm startup
const STARTUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Handle to a running capture thread; stops capture on drop
pub struct CaptureHandle {
    stop: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl CaptureHandle {
    /// Stop capturing and join the capture thread
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start capturing from the default input device
///
/// Returns a handle and a channel of f32 sample chunks as delivered by the
/// device callback.
///
/// # Errors
///
/// Returns error if no input device exists, no 16kHz mono configuration is
/// supported, or the stream fails to start
pub fn start_capture() -> Result<(CaptureHandle, mpsc::UnboundedReceiver<Vec<f32>>)> {
    let (samples_tx, samples_rx) = mpsc::unbounded_channel();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let thread = std::thread::Builder::new()
        .name("talkback-capture".to_string())
        .spawn(move || {
            let stream = match build_input_stream(&samples_tx) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(Error::Audio(e.to_string())));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            while !stop_flag.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(20));
            }

            drop(stream);
            tracing::debug!("audio capture stopped");
        })?;

    match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
        Ok(Ok(())) => Ok((
            CaptureHandle {
                stop,
                thread: Some(thread),
            },
            samples_rx,
        )),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(Error::Audio(
            "capture thread did not start in time".to_string(),
        )),
    }
}

/// Build a 16kHz mono input stream that forwards chunks to `samples_tx`
fn build_input_stream(samples_tx: &mpsc::UnboundedSender<Vec<f32>>) -> Result<Stream> {
    let host = cpal::default_host();

    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

    let config = device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        })
        .ok_or_else(|| Error::Audio("no 16kHz mono input config found".to_string()))?
        .with_sample_rate(SampleRate(SAMPLE_RATE))
        .config();

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = SAMPLE_RATE,
        "audio capture starting"
    );

    let tx = samples_tx.clone();
    device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                // Receiver gone means the stream is being torn down.
                let _ = tx.send(data.to_vec());
            },
            |err| {
                tracing::error!(error = %err, "audio capture error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))
}

/// Encode f32 samples as 16-bit PCM WAV bytes for upload to STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    let mut writer =
        hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

    for &sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let quantized = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        writer
            .write_sample(quantized)
            .map_err(|e| Error::Audio(e.to_string()))?;
    }

    writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    Ok(cursor.into_inner())
}
