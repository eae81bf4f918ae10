//! Voice Morph CLI
//!
//! Runs one voice-changer session against the local audio devices. Commands
//! are read from stdin, one per line.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voice_morph::{
    audio::{list_devices, CpalBackend},
    config::AppConfig,
    session::{SessionClient, SessionController, SessionRunner, SessionSnapshot},
    transport::LoopbackTransport,
    visualizer::{DisplaySurface, TextSurface},
};

/// Real-time voice changer
#[derive(Parser)]
#[command(name = "voice-morph", version, about)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, env = "VOICE_MORPH_CONFIG")]
    config: Option<PathBuf>,

    /// Voice profile id to start with
    #[arg(long)]
    voice: Option<String>,

    /// Start streaming immediately
    #[arg(long)]
    start: bool,

    /// Print audio devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Print voice profiles and exit
    #[arg(long)]
    list_voices: bool,

    /// Do not draw the waveform
    #[arg(long)]
    no_visualizer: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Prints the waveform about once a second
struct TerminalSurface {
    inner: TextSurface,
    frames: u64,
    print_every: u64,
}

impl DisplaySurface for TerminalSurface {
    fn size(&self) -> (f32, f32) {
        self.inner.size()
    }

    fn clear(&mut self) {
        self.inner.clear();
    }

    fn stroke_polyline(&mut self, points: &[(f32, f32)]) {
        self.inner.stroke_polyline(points);
        self.frames += 1;
        if self.frames % self.print_every == 0 {
            println!("{}\n", self.inner.render());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    if cli.list_devices {
        print_devices();
        return Ok(());
    }
    if cli.list_voices {
        for voice in &config.voices {
            println!("  {} {:<12} {}", voice.icon, voice.id, voice.name);
        }
        return Ok(());
    }

    if let Some(voice) = cli.voice {
        config.session.default_voice = voice;
    }
    if cli.no_visualizer {
        config.visualizer.enabled = false;
    }

    let surface: Option<Box<dyn DisplaySurface>> = config.visualizer.enabled.then(|| {
        Box::new(TerminalSurface {
            inner: TextSurface::new(config.visualizer.width, config.visualizer.height),
            frames: 0,
            print_every: u64::from(config.visualizer.fps.max(1)),
        }) as Box<dyn DisplaySurface>
    });

    let transport = LoopbackTransport::new(config.playback.sample_rate);
    let (controller, events) =
        SessionController::new(config, Box::new(transport), Box::new(CpalBackend), surface)?;
    let (runner, client) = SessionRunner::new(controller, events);
    let runner_handle = tokio::spawn(runner.run());

    tracing::info!("Voice: {}", client.snapshot().selected_voice.name);
    println!("Commands: start | stop | voice <id> | status | quit");

    if cli.start {
        client.start().await?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut watcher = client.clone();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("Failed to read stdin")? {
                    Some(line) => {
                        if !run_command(&client, line.trim()).await? {
                            break;
                        }
                    }
                    None => break,
                }
            }
            snapshot = watcher.changed() => {
                match snapshot {
                    Ok(snapshot) => report(&snapshot),
                    Err(_) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    // The loop may already be gone if it stopped on its own
    let _ = client.shutdown().await;
    runner_handle.await.context("Session loop panicked")?;
    tracing::info!("Stopped ({})", watcher.snapshot().state);
    Ok(())
}

/// Returns false when the user asked to quit
async fn run_command(client: &SessionClient, line: &str) -> Result<bool> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (None, _) => {}
        (Some("start"), _) => client.start().await?,
        (Some("stop"), _) => client.stop().await?,
        (Some("voice"), Some(id)) => client.select_voice(id).await?,
        (Some("status"), _) => print_status(&client.snapshot()),
        (Some("quit" | "exit"), _) => return Ok(false),
        (Some(other), _) => println!("Unknown command: {}", other),
    }
    Ok(true)
}

fn report(snapshot: &SessionSnapshot) {
    if let Some(error) = &snapshot.error {
        tracing::error!("{}", error);
    }
    tracing::debug!("Session {}", snapshot.state);
}

fn print_status(snapshot: &SessionSnapshot) {
    println!(
        "State: {}  Voice: {} {}",
        snapshot.state, snapshot.selected_voice.icon, snapshot.selected_voice.name
    );
    if let Some(id) = snapshot.session_id {
        println!("Session: {}", id);
    }
    if let Some(error) = &snapshot.error {
        println!("Error: {}", error);
    }
}

fn print_devices() {
    println!("\n=== Available Audio Devices ===");
    for device in list_devices() {
        let device_type = match (device.is_input, device.is_output) {
            (true, true) => "Input/Output",
            (true, false) => "Input",
            (false, true) => "Output",
            _ => "Unknown",
        };
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  {} ({}){}:", device.name, device_type, default_marker);
        println!("    Sample rates: {:?}", device.sample_rates);
        println!("    Channels: {:?}", device.channels);
    }
    println!();
}
