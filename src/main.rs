//! CLI entry point for detcon.
//!
//! Drives the simulated detector from the command line:
//!
//! ```bash
//! detcon status
//! detcon acquire --frames 10 --exptime 10ms
//! detcon dac vref_prech 1450
//! detcon read run_d0_f0_0.my302
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use detcon::config::Config;
use detcon::defs::DacIndex;
use detcon::{io, logging, Detector};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "detcon")]
#[command(about = "Detector control from the command line", long_about = None)]
struct Cli {
    /// Config file (defaults to config/detcon.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show per-module status
    Status,

    /// Run one acquisition to completion
    Acquire {
        /// Frames per cycle
        #[arg(long)]
        frames: Option<u64>,

        /// Trigger cycles
        #[arg(long)]
        cycles: Option<u64>,

        /// Exposure time per frame (e.g. "10ms")
        #[arg(long)]
        exptime: Option<humantime::Duration>,

        /// Frame period (e.g. "50ms")
        #[arg(long)]
        period: Option<humantime::Duration>,
    },

    /// Read a DAC, or write it when a value is given
    Dac {
        /// DAC name (e.g. "vref_prech") or raw index
        name: String,

        /// Value to write, in DAC units (or millivolts with --mv)
        value: Option<i32>,

        /// Interpret values as millivolts
        #[arg(long)]
        mv: bool,
    },

    /// Decode a raw file and print a frame summary
    Read {
        /// Path to a .my302 raw file
        file: PathBuf,

        /// Print frame headers as JSON
        #[arg(long)]
        json: bool,
    },
}

fn resolve_dac(name: &str) -> Result<DacIndex> {
    if let Ok(index) = name.parse::<i32>() {
        return Ok(DacIndex::from_index(index)?);
    }
    Ok(DacIndex::from_name(name)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    logging::init_from_config(&config).map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Commands::Status => {
            let detector = Detector::with_config(&config).await?;
            let hostnames = detector.hostname();
            let statuses = detector.status().await?;
            println!(
                "🔬 {} ({} modules)",
                detector.detector_type()?,
                detector.num_modules()
            );
            for (hostname, status) in hostnames.iter().zip(statuses.iter()) {
                println!("   {hostname}: {status}");
            }
        }

        Commands::Acquire {
            frames,
            cycles,
            exptime,
            period,
        } => {
            let detector = Detector::with_config(&config).await?;
            if let Some(frames) = frames {
                detector.set_frames(frames).await?;
            }
            if let Some(cycles) = cycles {
                detector.set_cycles(cycles).await?;
            }
            if let Some(exptime) = exptime {
                detector.set_exptime(exptime.into()).await?;
            }
            if let Some(period) = period {
                detector.set_period(period.into()).await?;
            }

            println!(
                "▶️  Acquiring {} frame(s) x {} cycle(s), exptime {}...",
                detector.frames().await?,
                detector.cycles().await?,
                humantime::format_duration(detector.exptime().await?)
            );
            detector.acquire().await?;

            let caught = detector.frames_caught().await?;
            for (hostname, frames) in detector.hostname().iter().zip(caught.iter()) {
                println!("   {hostname}: {frames} frames caught");
            }
            println!("✅ Acquisition complete");
        }

        Commands::Dac { name, value, mv } => {
            let index = resolve_dac(&name)?;
            let detector = Detector::with_config(&config).await?;
            let experimental = detector.experimental();
            if let Some(value) = value {
                experimental.set_dac(index, value, mv, &[]).await?;
            }
            let values = experimental.get_dac(index, mv, &[]).await?;
            let unit = if mv { "mV" } else { "dacu" };
            for (hostname, value) in detector.hostname().iter().zip(values.iter()) {
                println!("   {hostname}: {index} = {value} {unit}");
            }
        }

        Commands::Read { file, json } => {
            let frames = io::read_my302_file(&file)?;
            if json {
                let headers: Vec<_> = frames.iter().map(|f| f.header).collect();
                println!("{}", serde_json::to_string_pretty(&headers)?);
            } else {
                println!("📂 {}: {} frame(s)", file.display(), frames.len());
                for frame in &frames {
                    let max = frame.data.iter().copied().max().unwrap_or(0);
                    println!(
                        "   frame {:>6}  ts {:>12}  max {max}",
                        frame.header.frame_number, frame.header.timestamp
                    );
                }
            }
        }
    }

    Ok(())
}
