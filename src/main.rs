use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{
    fmt::{writer::MakeWriterExt, Layer as FmtLayer},
    prelude::*,
    EnvFilter,
};

use duplex_engine::oss::{OssReadChannel, OssWriteChannel};
use duplex_engine::{DuplexLoop, FrameClock, RunOptions};

/// Synchronous full-duplex I/O against an OSS device.
#[derive(Debug, Parser)]
#[command(name = "duplex", version, about)]
struct Args {
    /// Dsp node used for both directions.
    #[arg(long, default_value = "/dev/dsp")]
    device: String,

    /// Sample rate in frames per second.
    #[arg(long, default_value_t = 48_000)]
    rate: u32,

    /// Sample width in bits.
    #[arg(long, default_value_t = 32)]
    bits: u32,

    /// Scheduling quantum in frames.
    #[arg(long, default_value_t = 1024)]
    period: usize,

    /// Per-channel period completions, summed across both channels.
    #[arg(long, default_value_t = 100)]
    repetitions: u32,

    /// Leave the device rings unmapped and use plain read/write.
    #[arg(long)]
    no_mmap: bool,
}

fn run(args: &Args) -> anyhow::Result<()> {
    let input = OssReadChannel::open(&args.device, args.rate, args.bits, args.period)
        .with_context(|| format!("opening {} for recording", args.device))?;
    let output = OssWriteChannel::open(&args.device, args.rate, args.bits, args.period)
        .with_context(|| format!("opening {} for playback", args.device))?;

    let mut duplex = DuplexLoop::new(input, output, FrameClock::default());
    duplex.read_write(RunOptions {
        period: args.period,
        repetitions: args.repetitions,
        memory_map: !args.no_mmap,
        simulate_late_wakeup: false,
    })?;
    Ok(())
}

fn main() -> ExitCode {
    let stdout_layer =
        FmtLayer::new().with_writer(std::io::stdout.with_max_level(tracing::Level::TRACE));
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(stdout_layer)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => {
            info!(
                repetitions = args.repetitions,
                period = args.period,
                "duplex run complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
