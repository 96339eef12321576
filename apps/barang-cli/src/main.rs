mod report;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use barang_camera::{NoCamera, ReplayCamera};
use barang_lookup::DirectoryLookup;
use barang_ops::{init_tracing, TelemetryStore};
use barang_scanner::{ScanOutcome, ScanSession};
use barang_types::{config::BarangConfig, frame::Frame, BarangError};
use clap::{Parser, Subcommand};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "barang", version, about = "Resolve locker QR labels for Management Barang")]
struct Cli {
    #[arg(long, env = "BARANG_CONFIG", default_value = "configs/dev.toml")]
    config: PathBuf,
    /// Locker directory file; overrides `lookup.directory_path`.
    #[arg(long)]
    directory: Option<PathBuf>,
    /// Print the outcome as JSON.
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a photo of a QR label.
    ScanImage {
        path: PathBuf,
        /// Declared file type; guessed from the extension when omitted.
        #[arg(long)]
        mime: Option<String>,
        /// Write the frame with the detected outline to this file.
        #[arg(long)]
        annotate: Option<PathBuf>,
    },
    /// Resolve a 4-digit code typed by hand.
    Manual { code: String },
    /// Run the live camera pipeline over recorded frames.
    Camera {
        #[arg(long, num_args = 1.., required = true)]
        frames: Vec<PathBuf>,
        /// Origin the scanner pretends to be served from.
        #[arg(long)]
        origin: Option<String>,
        #[arg(long)]
        annotate: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config);
    if let Some(directory) = &cli.directory {
        config.lookup.directory_path = Some(directory.display().to_string());
    }
    init_tracing(&config.ops)?;

    let lookup = match &config.lookup.directory_path {
        Some(path) => DirectoryLookup::from_file(path).await?,
        None => {
            warn!("No locker directory configured; every lookup will fail");
            DirectoryLookup::default()
        }
    };

    let telemetry = TelemetryStore::new();
    let result = run(cli.command, config.clone(), lookup, &telemetry).await;

    if let Some(dir) = &config.ops.telemetry_dir {
        match telemetry.flush_to(dir).await {
            Ok(path) => info!("Telemetry written to {}", path.display()),
            Err(err) => warn!("Could not write telemetry: {}", err),
        }
    }

    match result {
        Ok(outcome) => {
            report::print_outcome(&outcome, cli.json)?;
            Ok(())
        }
        Err((err, hint)) => {
            report::print_error(&err, hint.as_deref(), cli.json)?;
            bail!("scan failed: {err}")
        }
    }
}

/// A failed run plus the follow-up hint it produced, if any.
type Failure = (BarangError, Option<String>);

/// Holds the session until a pending hint has been published, then shuts it down.
async fn finish(
    mut session: ScanSession<DirectoryLookup>,
    recorder: JoinHandle<()>,
    result: std::result::Result<ScanOutcome, BarangError>,
) -> std::result::Result<ScanOutcome, Failure> {
    let hint = match &result {
        Err(_) => session.follow_up_hint().await,
        Ok(_) => None,
    };
    drop(session);
    let _ = recorder.await;
    result.map_err(|err| (err, hint))
}

async fn run(
    command: Command,
    config: BarangConfig,
    lookup: DirectoryLookup,
    telemetry: &TelemetryStore,
) -> std::result::Result<ScanOutcome, Failure> {
    match command {
        Command::ScanImage {
            path,
            mime,
            annotate,
        } => {
            let bytes = tokio::fs::read(&path).await.map_err(|err| {
                let err = BarangError::Configuration(format!(
                    "unable to read {}: {err}",
                    path.display()
                ));
                (err, None)
            })?;
            let mime = mime.unwrap_or_else(|| guess_mime(&path).into());

            let mut session = ScanSession::new(config, NoCamera, lookup);
            let recorder = telemetry.attach(session.events());
            let result = session.scan_image(bytes, &mime).await;
            if let Some(out) = annotate {
                save_frame(session.surface(), &out);
            }
            finish(session, recorder, result).await
        }
        Command::Manual { code } => {
            let mut session = ScanSession::new(config, NoCamera, lookup);
            let recorder = telemetry.attach(session.events());
            let result = session.manual_entry(&code).await;
            finish(session, recorder, result).await
        }
        Command::Camera {
            frames,
            origin,
            annotate,
        } => {
            let mut config = config;
            if let Some(origin) = origin {
                config.camera.origin = origin;
            }
            let mut session = ScanSession::new(config, ReplayCamera::new(frames), lookup);
            let recorder = telemetry.attach(session.events());
            let result = session.scan().await;
            if let Some(out) = annotate {
                save_frame(session.surface(), &out);
            }
            let stats = session.stats();
            info!(
                "Scan finished after {} attempts ({} ms to initialize)",
                stats.attempts, stats.initialization_duration_ms
            );
            finish(session, recorder, result).await
        }
    }
}

fn load_config(path: &Path) -> BarangConfig {
    match BarangConfig::from_file(path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path.display()
                );
                BarangConfig::default()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            BarangConfig::default()
        }
    }
}

fn guess_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

fn save_frame(frame: &Frame, path: &Path) {
    if frame.is_empty() {
        warn!("No frame to annotate");
        return;
    }
    let saved = image::RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
        .context("frame buffer does not match its dimensions")
        .and_then(|img| img.save(path).context("failed to encode annotated frame"));
    match saved {
        Ok(()) => info!("Annotated frame written to {}", path.display()),
        Err(err) => warn!("Could not write {}: {err:#}", path.display()),
    }
}
