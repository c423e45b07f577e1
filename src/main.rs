//! CLI entry point for pixbridge
//!
//! Runs the two-domain transport simulation or checks a configuration file.
//!
//! # Usage
//!
//! ```bash
//! pixbridge run --config config/pixbridge.toml --frames 20
//! pixbridge check-config --config config/pixbridge.toml
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pixbridge::config::{BridgeConfig, DEFAULT_CONFIG_PATH};
use pixbridge::{simulation, tracing_init};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pixbridge")]
#[command(about = "Cross-clock-domain pixel transport simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive capture and display on independent clocks and report
    Run {
        /// Configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Override the number of frames to publish
        #[arg(long)]
        frames: Option<u64>,
    },

    /// Load, validate and print the effective configuration
    CheckConfig {
        /// Configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, frames } => run(config, frames).await,
        Commands::CheckConfig { config } => check_config(config),
    }
}

fn load(path: &Path) -> Result<BridgeConfig> {
    let config = BridgeConfig::load_from(path)
        .with_context(|| format!("loading {}", path.display()))?;
    config.validate().context("validating configuration")?;
    Ok(config)
}

async fn run(path: PathBuf, frames: Option<u64>) -> Result<()> {
    let mut config = load(&path)?;
    if let Some(frames) = frames {
        config.simulation.frames = frames;
    }
    tracing_init::init_from_config(&config)?;

    println!("pixbridge - cross-domain pixel transport");
    println!(
        "  frame {}x{} @ {} bits, decimation {}x, queue {} slots, {} sync stages",
        config.frame.width,
        config.frame.height,
        config.frame.pixel_bits,
        config.decimation.factor,
        config.queue.capacity,
        config.queue.sync_stages
    );
    println!(
        "  producer {} steps / {:?}, consumer {} steps / {:?}",
        config.simulation.producer_steps,
        config.simulation.producer_period(),
        config.simulation.consumer_steps,
        config.simulation.consumer_period()
    );
    println!();

    let report = simulation::run(&config).await?;

    println!("Frames published:   {}", report.frames_published);
    println!("Frames observed:    {}", report.frames_observed);
    println!("Frames skipped:     {}", report.frames_skipped);
    println!("Frames repeated:    {}", report.frames_repeated);
    println!("Torn snapshots:     {}", report.torn_snapshots);
    println!(
        "Pixels accepted:    {} (dropped {})",
        report.capture.queue.accepted, report.capture.queue.dropped
    );
    println!(
        "Pixels dequeued:    {} (empty reads {})",
        report.pixels_dequeued, report.display.queue.empty_reads
    );
    println!("Out of order:       {}", report.stream_out_of_order);
    println!(
        "Decimation:         kept {}, dropped {}",
        report.capture.decimated_kept, report.capture.decimated_dropped
    );
    println!("Ready tokens lost:  {}", report.capture.ready_tokens_dropped);
    println!("Elapsed:            {:?}", report.elapsed);

    if !report.queue_drained() {
        anyhow::bail!("pixel queue did not drain: accepted and delivered counts differ");
    }
    if report.stream_out_of_order > 0 {
        anyhow::bail!(
            "{} streamed pixels arrived out of order",
            report.stream_out_of_order
        );
    }
    Ok(())
}

fn check_config(path: PathBuf) -> Result<()> {
    let config = load(&path)?;
    print!("{}", config.to_toml()?);
    Ok(())
}
