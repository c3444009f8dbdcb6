use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use viva::commands::Assistant;
use viva::completion::{CompletionBackend as _, CompletionClient};
use viva::config::Config;
use viva::credentials::ApiKeyStore;
use viva::listener::RecognizerFactory;
use viva::server::{self, WsNotifier};
use viva::synthesis::SpeechSynthesizer;
use viva::voice::{MicCapture, PhraseRecognizer, WhisperRecognizer};

/// viva - voice-driven mock interview assistant
#[derive(Parser)]
#[command(name = "viva", version, about)]
struct Cli {
    /// Path to a viva.toml config file (defaults to the data directory)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Port for the GUI shell boundary (overrides the config file)
    #[arg(long, env = "VIVA_PORT")]
    port: Option<u16>,

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
    /// Ask a single question from the terminal (no audio)
    Ask {
        /// Question text
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,viva=info",
        1 => "info,viva=debug",
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

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let keys = Arc::new(ApiKeyStore::load(config.credential_path()));

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::Ask { text } => ask(&config, &keys, &text).await,
        };
    }

    let port = cli.port.unwrap_or(config.port);
    tracing::info!(
        port,
        has_key = keys.has_key(),
        models = config.chat_models.len(),
        "starting viva"
    );

    let completion = Arc::new(CompletionClient::new(
        config.api_base_url.clone(),
        config.chat_models.clone(),
        Arc::clone(&keys),
    ));
    let synthesizer = Arc::new(SpeechSynthesizer::new(
        config.api_base_url.clone(),
        config.voice.tts_model.clone(),
        config.voice.tts_voice.clone(),
        Arc::clone(&keys),
    ));
    let (notifier, events) = WsNotifier::new();

    let factory: RecognizerFactory = {
        let base_url = config.api_base_url.clone();
        let stt_model = config.stt_model.clone();
        let keys = Arc::clone(&keys);
        let onset_timeout = config.voice.capture_timeout;
        let phrase_limit = config.voice.phrase_limit;
        Arc::new(move || {
            WhisperRecognizer::new(
                base_url.clone(),
                stt_model.clone(),
                Arc::clone(&keys),
                onset_timeout,
                phrase_limit,
            )
            .map(|r| Box::new(r) as Box<dyn PhraseRecognizer>)
        })
    };

    let (assistant, utterances) =
        Assistant::new(config, keys, completion, synthesizer, notifier, factory);

    tokio::spawn(Arc::clone(&assistant).route_utterances(utterances));

    tracing::info!("viva ready - connect a shell and toggle listening");
    server::serve(assistant, events, port).await?;
    Ok(())
}

/// Test microphone input with a terminal RMS meter
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = MicCapture::open()?;
    capture.start()?;
    println!("Sample rate: {} Hz", viva::voice::SAMPLE_RATE);
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.drain();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    Ok(())
}

/// One completion round-trip from the terminal
async fn ask(config: &Config, keys: &Arc<ApiKeyStore>, text: &str) -> anyhow::Result<()> {
    let client = CompletionClient::new(
        config.api_base_url.clone(),
        config.chat_models.clone(),
        Arc::clone(keys),
    );

    let answer = client
        .complete(
            "You are a helpful voice assistant. Answer clearly in a few short sentences.",
            text,
        )
        .await?;
    println!("{answer}");
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
