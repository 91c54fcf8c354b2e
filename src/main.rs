//! CrowdSec Cloudflare bouncer CLI.

use anyhow::Result;
use clap::Parser;
use crowdsec_cloudflare_bouncer::signal::{spawn_signal_listener, Shutdown};
use crowdsec_cloudflare_bouncer::{Bouncer, Config};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "crowdsec-cloudflare-bouncer")]
#[command(about = "Sync CrowdSec decisions into a Cloudflare IP list")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "crowdsec-cloudflare-bouncer.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: String,

    /// Print example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        println!("{}", Config::example());
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(config = %args.config.display(), "Loading configuration");
    let config = Config::load(&args.config)?;

    if args.validate {
        info!("Configuration is valid");
        return Ok(());
    }

    let bouncer = Bouncer::new(config)?;

    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_listener(shutdown.clone());

    bouncer.run(&shutdown).await
}
