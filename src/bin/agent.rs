//! PetPal agent — runs on the Raspberry Pi next to the hardware.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │  Pca9685<I2cdev>   ServoBank   ProcessAudioSink  TcpConnector │
//! │  LogEventSink      FileConfigStore   capture threads          │
//! │  ─────────────────── Port trait boundary ─────────────────── │
//! │        AgentLoop ──▶ AgentService (Motion · Dispense · Audio) │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Exits non-zero on a bus error, zero when the relay stays unreachable
//! past the reconnect budget.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use linux_embedded_hal::Delay;
use log::{info, warn};

use petpal::adapters::capture;
use petpal::adapters::config_file::FileConfigStore;
use petpal::adapters::hardware;
use petpal::adapters::log_sink::LogEventSink;
use petpal::adapters::playback::ProcessAudioSink;
use petpal::app::agent_loop::AgentLoop;
use petpal::app::ports::ConfigPort;
use petpal::app::service::AgentService;
use petpal::config::AgentConfig;
use petpal::control::dispense::DispenseController;
use petpal::control::motion::MotionController;
use petpal::control::playback::PlaybackPipeline;
use petpal::link::channels::TELEMETRY_OUTBOX;
use petpal::link::transport::TcpConnector;

#[derive(Parser)]
#[command(name = "petpal-agent", version, about = "PetPal camera/dispenser agent")]
struct Cli {
    /// JSON configuration file (defaults are used when absent)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    dump_config: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    // ── 1. Configuration ──────────────────────────────────────
    let cfg = match &cli.config {
        Some(path) => FileConfigStore::<AgentConfig>::new(path)
            .load()
            .with_context(|| format!("loading {}", path.display()))?,
        None => AgentConfig::default(),
    };
    if cli.dump_config {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(());
    }
    info!("PetPal agent v{} → relay {}", env!("CARGO_PKG_VERSION"), cfg.relay_addr);

    // ── 2. Hardware ───────────────────────────────────────────
    let hw = hardware::bring_up(&cfg).context("PWM bring-up")?;
    let mut service = AgentService::new(
        MotionController::new(hw.camera, Delay, cfg.motion),
        DispenseController::new(hw.dispense, Delay, cfg.dispense),
        PlaybackPipeline::new(ProcessAudioSink::from_config(&cfg.audio)),
    );
    service.home().context("homing gimbal")?;

    // ── 3. Telemetry capture ──────────────────────────────────
    let _captures = match capture::spawn_all(&cfg.capture, &TELEMETRY_OUTBOX) {
        Ok(handles) => handles,
        Err(e) => {
            warn!("Capture unavailable, continuing without telemetry: {}", e);
            Vec::new()
        }
    };

    // ── 4. Live channel ───────────────────────────────────────
    let connector = TcpConnector::new(
        cfg.relay_addr.clone(),
        cfg.link.max_line_bytes,
        Duration::from_millis(u64::from(cfg.link.connect_timeout_ms)),
    );
    let mut agent = AgentLoop::new(connector, Delay, cfg.link, &TELEMETRY_OUTBOX);
    let mut sink = LogEventSink::new();
    agent
        .run(&mut service, &mut sink)
        .context("agent stopped on a fatal error")?;

    info!("PetPal agent exiting");
    Ok(())
}
