use anyhow::Result;
use booktrends::standalone::{Args, Job};
use booktrends::workload;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let job = Job::from(args.command);
    let written = workload::run(&job)?;
    info!(records = written, "done");
    Ok(())
}
