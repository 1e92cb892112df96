use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

use talkback::voice::{self, HttpSpeaker, WhisperStt};
use talkback::{Config, GenerateClient, Phase, ReplyGenerator, SessionController, SessionState};

/// Talkback - push-to-talk voice assistant
#[derive(Parser)]
#[command(name = "talkback", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Send a message to the generate endpoint and print the reply
    TestGenerate {
        /// Text to send
        #[arg(default_value = "Hello! Can you hear me?")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,talkback=info",
        1 => "info,talkback=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestGenerate { text } => test_generate(&text).await,
        };
    }

    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    let api_key = config.voice.api_key.clone().ok_or_else(|| {
        anyhow::anyhow!("OPENAI_API_KEY is required for speech recognition and synthesis")
    })?;

    let stt = Arc::new(WhisperStt::new(
        config.voice.stt_url.clone(),
        api_key.clone(),
        config.voice.stt_model.clone(),
    )?);
    let synthesizer = Arc::new(HttpSpeaker::new(
        config.voice.tts_url.clone(),
        api_key,
        config.voice.tts_model.clone(),
        config.voice.tts_voice.clone(),
        config.voice.tts_speed,
    )?);
    let generator = Arc::new(GenerateClient::new(&config.generate_url)?);

    let (controller, handle) = SessionController::new(config.session(), stt, generator, synthesizer);
    tokio::spawn(controller.run());

    // Print state transitions as they happen.
    let mut states = handle.subscribe();
    tokio::spawn(async move {
        let mut previous = SessionState::default();
        while states.changed().await.is_ok() {
            let current = states.borrow().clone();
            print_transition(&previous, &current);
            previous = current;
        }
    });

    println!("Push-to-talk ready. Press Enter to start recording, Enter again to send. Ctrl-C quits.");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    let mut holding = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                if line?.is_none() {
                    break;
                }
                if holding {
                    handle.end_hold();
                } else {
                    handle.begin_hold();
                }
                holding = !holding;
            }
        }
    }

    handle.shutdown();
    Ok(())
}

/// Print the user-relevant parts of a state change
fn print_transition(previous: &SessionState, current: &SessionState) {
    if current.transcript != previous.transcript && !current.transcript.is_empty() {
        println!("  you: {}", current.transcript);
    }
    if current.reply != previous.reply {
        println!("  assistant: {}", current.reply);
    }
    if let Some(error) = &current.pending_error
        && previous.pending_error.as_deref() != Some(error)
    {
        println!("  error: {error}");
    }
    if current.phase != previous.phase && current.phase == Phase::AwaitingReply {
        println!("  thinking...");
    }
}

/// Test microphone input with a level meter
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let (mut capture, mut samples) = voice::start_capture()?;
    println!("Sample rate: {} Hz", voice::SAMPLE_RATE);
    println!("---");

    for second in 1..=duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let mut window = Vec::new();
        while let Ok(chunk) = samples.try_recv() {
            window.extend_from_slice(&chunk);
        }

        let rms = calculate_rms(&window);
        let peak = window.iter().map(|s| s.abs()).fold(0.0_f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (rms * 100.0).min(50.0) as usize;
        let meter = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{second:2}s] RMS: {rms:.4} | Peak: {peak:.4} | [{meter}]");
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working.");
    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let sample_rate = 24_000_usize;
    let num_samples = sample_rate * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.3
        })
        .collect();

    tokio::task::spawn_blocking(move || voice::playback::play_samples_blocking(&samples)).await??;

    println!("If you heard the tone, your speakers are working.");
    Ok(())
}

/// Send one message to the generate endpoint
async fn test_generate(text: &str) -> anyhow::Result<()> {
    let config = Config::load()?;
    println!("POST {} <- {text:?}", config.generate_url);

    let client = GenerateClient::new(&config.generate_url)?;
    let answer = client.generate(text).await?;
    println!("answer: {answer}");
    Ok(())
}
