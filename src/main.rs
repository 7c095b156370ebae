use anyhow::{Context, Result};
use clap::Parser;
use live_transcribe::{
    config, create_router, AppState, AudioBackendFactory, BroadcastSink, Config, SessionConfig,
    SessionManager, WebSocketConnector,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Stream microphone audio to a real-time transcription service and relay
/// transcripts to browser listeners
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Config file (extension optional)
    #[arg(long, default_value = "config/live-transcribe")]
    config: String,

    /// Address to bind the relay server to
    #[arg(long)]
    bind: Option<String>,

    /// Port to bind the relay server to
    #[arg(long)]
    port: Option<u16>,

    /// Replay a 16-bit PCM WAV file instead of capturing from the microphone
    #[arg(long)]
    wav: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A .env file is optional; real deployments set the environment directly
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut cfg = Config::load(&args.config).context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        cfg.service.http.bind = bind;
    }
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }
    if args.wav.is_some() {
        cfg.audio.wav_path = args.wav;
    }

    let api_key = config::api_key()?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let format = cfg.audio.format();
    let audio = AudioBackendFactory::create(cfg.audio.input())?;
    info!(
        "Audio: {} ({}Hz, {} channel(s), {}ms frames)",
        audio.name(),
        format.sample_rate,
        format.channels,
        format.frame_duration_ms
    );

    let url = cfg.remote.url(format.sample_rate);
    info!("Transcription endpoint: {}", url);
    let connector = Arc::new(WebSocketConnector::new(url, api_key));

    let events = BroadcastSink::default();
    let manager = SessionManager::new(
        SessionConfig {
            format,
            ..Default::default()
        },
        audio,
        connector,
        Arc::new(events.clone()),
    );

    let app = create_router(AppState::new(manager.clone(), events));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Relay listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await
        .context("Server error")?;

    manager.disconnect().await;
    manager.wait_finished().await;
    info!("Shut down cleanly");

    Ok(())
}
