//! Disorder simulator binary - writes an out-of-order copy of a dataset
//!
//! Usage:
//!   cargo run --bin disorder-sim -- -s log.csv -o out.csv          # Defaults (W=5, random)
//!   cargo run --bin disorder-sim -- --config config.toml           # Use config file
//!   cargo run --bin disorder-sim -- -s log.csv -w 10 -p round-robin
//!   cargo run --bin disorder-sim -- -s log.csv -m sorted --json    # Ordered passthrough

use clap::Parser;
use disorder_sim::common::{setup_shutdown, RunArgs};
use disorder_sim::config::Config;
use disorder_sim::pipeline::Pipeline;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Generate a bounded out-of-order event stream from an ordered dataset
#[derive(Parser, Debug)]
#[command(name = "disorder-sim", about = "Out-of-order event stream generator")]
struct Args {
    #[command(flatten)]
    run: RunArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("disorder_sim=info".parse()?))
        .init();

    let args = Args::parse();

    let config_path = &args.run.common.config_file;
    let config = if std::path::Path::new(config_path).exists() {
        info!(config_file = %config_path, "Loaded configuration");
        Config::load(config_path)?
    } else {
        Config::default()
    };
    let config = args.run.apply(config);

    let pipeline = Pipeline::new(config)?;
    let (_shutdown_tx, shutdown_rx) = setup_shutdown();

    let report = pipeline.run(shutdown_rx).await?;

    if args.run.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "accepted={} rejected={} emitted={} max_displacement={} fingerprint={}",
            report.load.accepted,
            report.load.rejected,
            report.emitted,
            report.max_displacement,
            report.arrival_fingerprint
        );
    }

    Ok(())
}
