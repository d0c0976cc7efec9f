use anyhow::{Context, Result};
use clap::Parser;

use elfilter::app::{Cli, Command, run_check, run_match};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("CLI: Failed to initialize thread pool")?;
    }

    match &cli.command {
        Command::Check(args) => run_check(args),
        Command::Match(args) => {
            let start = std::time::Instant::now();
            let summary = run_match(args, cli.verbose)?;
            let elapsed = start.elapsed();
            tracing::info!(
                "Done! {} of {} elements matched, {} skipped, in {:.2}s ({} elements/s)",
                summary.matched,
                summary.read,
                summary.skipped,
                elapsed.as_secs_f64(),
                (summary.read as f64 / elapsed.as_secs_f64()) as u64
            );
            Ok(())
        }
    }
}
