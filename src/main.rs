use anyhow::{Context, Result};
use clap::Parser;
use duplex_voice::{AudioHost, Config, CpalHost, SessionOrchestrator, WebSocketConnector};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "duplex-voice")]
#[command(about = "Full-duplex voice conversation with a remote agent")]
struct Args {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config/duplex-voice")]
    config: String,

    /// Dialog configuration id (selects the SDK transport)
    #[arg(long)]
    config_id: Option<String>,

    /// Target voice id
    #[arg(long)]
    voice_id: Option<String>,

    /// Output device index or name fragment
    #[arg(short, long)]
    output_device: Option<String>,

    /// Never use the SDK transport
    #[arg(long)]
    no_sdk: bool,

    /// Fall back to the raw WebSocket transport if the SDK one fails
    #[arg(long)]
    fallback_ws: bool,

    /// Sample rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Channel count
    #[arg(long)]
    channels: Option<u16>,

    /// Frame duration in milliseconds
    #[arg(long)]
    frame_ms: Option<u32>,

    /// List audio devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if args.list_devices {
        let devices = CpalHost::new().output_devices().context("Failed to enumerate audio devices")?;
        for device in devices {
            println!("{:>3}  {} ({} output channels)", device.index, device.name, device.output_channels);
        }
        return Ok(());
    }

    let cfg = Config::load(&args.config)?;
    info!("Loaded config: {}", cfg.service.name);

    let mut session_config = cfg.session_config();
    if let Some(config_id) = args.config_id {
        session_config.transport.config_id = Some(config_id);
    }
    if let Some(voice_id) = args.voice_id {
        session_config.transport.voice_id = Some(voice_id);
    }
    if let Some(device) = args.output_device {
        session_config.output_device = Some(device);
    }
    if args.no_sdk {
        session_config.transport.disable_sdk = true;
    }
    if args.fallback_ws {
        session_config.transport.fallback_to_raw = true;
    }
    if let Some(rate) = args.sample_rate {
        session_config.audio.sample_rate = rate;
    }
    if let Some(channels) = args.channels {
        session_config.audio.channels = channels;
    }
    if let Some(frame_ms) = args.frame_ms {
        session_config.audio.frame_ms = frame_ms;
    }

    let host = CpalHost::with_playback_buffer(session_config.playback_buffer_chunks);
    let (event_tx, event_rx) = mpsc::channel(64);
    let listener = tokio::spawn(print_events(event_rx));

    let mut orchestrator = SessionOrchestrator::new(session_config, Box::new(host), Arc::new(WebSocketConnector))
        .with_event_listener(event_tx);

    let shutdown = orchestrator.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            shutdown.cancel();
        }
    });

    info!("Speak into the microphone; press Ctrl-C to stop");
    let result = orchestrator.run().await;

    drop(orchestrator);
    if let Err(e) = listener.await {
        warn!("Event printer failed: {}", e);
    }

    let stats = result.context("Voice session failed")?;
    info!(
        "Session {} over {} transport: {:.1}s, {} frames sent, {} dropped, {} replies played",
        stats.session_id,
        stats.transport,
        stats.duration_secs,
        stats.frames_sent,
        stats.frames_dropped,
        stats.payloads_played
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}

/// Print conversation transcripts as they arrive
async fn print_events(mut events: mpsc::Receiver<Value>) {
    while let Some(event) = events.recv().await {
        let kind = event.get("type").and_then(Value::as_str).unwrap_or("unknown");
        let content = event
            .get("message")
            .and_then(|m| m.get("content"))
            .or_else(|| event.get("text"))
            .and_then(Value::as_str);

        match (kind, content) {
            ("user_message", Some(text)) => println!("you:   {}", text),
            ("assistant_message", Some(text)) => println!("agent: {}", text),
            ("error", _) => warn!("Remote error event: {}", event),
            _ => debug!("Event: {}", kind),
        }
    }
}
