//! PetPal relay — sits between control surfaces and the agent.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use petpal::adapters::config_file::FileConfigStore;
use petpal::app::ports::ConfigPort;
use petpal::config::RelayConfig;
use petpal::relay::server::RelayServer;
use petpal::relay::service::RelayService;

#[derive(Parser)]
#[command(name = "petpal-relay", version, about = "PetPal command relay")]
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

    let cfg = match &cli.config {
        Some(path) => FileConfigStore::<RelayConfig>::new(path)
            .load()
            .with_context(|| format!("loading {}", path.display()))?,
        None => RelayConfig::default(),
    };
    if cli.dump_config {
        println!("{}", serde_json::to_string_pretty(&cfg)?);
        return Ok(());
    }

    let telemetry_dir = cfg.telemetry_dir.as_ref().map(PathBuf::from);
    if let Some(dir) = &telemetry_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating telemetry dir {}", dir.display()))?;
    }

    let service = RelayService::new(&cfg.queues, telemetry_dir);
    let server = RelayServer::bind(&cfg).context("binding listeners")?;
    info!("PetPal relay v{}", env!("CARGO_PKG_VERSION"));
    server.serve(&service);
    Ok(())
}
