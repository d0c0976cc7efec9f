use anyhow::{Context, Result, anyhow};
use clap::{ArgGroup, Args, Parser, Subcommand};
use crossbeam_channel::{Receiver, bounded};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use time::Date;

use crate::cache::FilterCache;
use crate::config::EngineConfig;
use crate::dates::{parse_date, today_utc};
use crate::dsl::ElementFilter;
use crate::element::{OsmElement, as_if_it_wasnt};
use crate::registry::FilterRegistry;
use crate::sinks::{DataSink, JsonlSink};
use crate::utils::ProgressCounter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Number of threads (default: all cores)
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compile every filter in a configuration file
    Check(CheckArgs),
    /// Write the elements of a JSON-lines file that match a filter
    Match(MatchArgs),
}

#[derive(Args)]
pub struct CheckArgs {
    /// Engine configuration file (YAML)
    #[arg(short, long)]
    pub config: PathBuf,
}

#[derive(Args)]
#[command(group(ArgGroup::new("query").required(true).args(["filter", "expr"])))]
pub struct MatchArgs {
    /// Name of a filter from the configuration file
    #[arg(short, long, requires = "config")]
    pub filter: Option<String>,

    /// Filter expression given inline
    #[arg(short, long)]
    pub expr: Option<String>,

    /// Engine configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Input JSON-lines file, or - for stdin
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output JSON-lines file, or - for stdout
    #[arg(short, long, default_value = "-")]
    pub output: PathBuf,

    /// Also match elements as if they weren't in this lifecycle state (e.g. disused)
    #[arg(long)]
    pub lifecycle: Option<String>,

    /// Date that relative dates in the filter count from (default: today, UTC)
    #[arg(long, value_parser = parse_today)]
    pub today: Option<Date>,

    /// Elements per batch handed to the worker pool
    #[arg(long, default_value_t = 4096)]
    pub batch_size: usize,
}

fn parse_today(value: &str) -> Result<Date, String> {
    if value.len() != 10 {
        return Err(format!("expected YYYY-MM-DD, got {value:?}"));
    }
    parse_date(value).ok_or_else(|| format!("invalid date: {value:?}"))
}

/// Counts reported after a `match` run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MatchSummary {
    pub read: u64,
    pub skipped: u64,
    pub matched: u64,
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            let config = EngineConfig::load(path)?;
            tracing::info!(
                "Config: {} filters, {} extra units from {:?}",
                config.filters.len(),
                config.units.len(),
                path
            );
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

pub fn run_check(args: &CheckArgs) -> Result<()> {
    let config = load_config(Some(&args.config))?;
    let cache = FilterCache::new(Arc::new(config.unit_table()));

    let reports = FilterRegistry::check(&config, &cache);
    let mut failed = 0;
    for report in &reports {
        match &report.result {
            Ok(filter) => println!("ok    {} ({})", report.name, filter.element_types()),
            Err(err) => {
                failed += 1;
                println!("error {}: {}", report.name, err);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!(
            "CLI: {} of {} filters failed to compile",
            failed,
            reports.len()
        );
    }
    tracing::info!("Check: {} filters compiled", reports.len());
    Ok(())
}

/// Resolve the filter named by `--filter` or given by `--expr`.
pub fn resolve_filter(args: &MatchArgs) -> Result<Arc<ElementFilter>> {
    let config = load_config(args.config.as_deref())?;
    let cache = FilterCache::new(Arc::new(config.unit_table()));

    if let Some(expr) = &args.expr {
        return cache
            .get_or_compile(expr)
            .with_context(|| format!("CLI: Invalid --expr {:?}", expr));
    }

    let name = args
        .filter
        .as_deref()
        .context("CLI: Either --filter or --expr is required")?;
    let registry = FilterRegistry::from_config(&config, &cache)?;
    registry.get(name).cloned().with_context(|| {
        format!(
            "CLI: Unknown filter '{}' (known: {})",
            name,
            registry.names().collect::<Vec<_>>().join(", ")
        )
    })
}

pub fn init_sink(output: &Path) -> Result<Box<dyn DataSink + Send>> {
    if output == Path::new("-") {
        tracing::info!("Sink: jsonl -> stdout");
        Ok(Box::new(JsonlSink::stdout()?))
    } else {
        tracing::info!("Sink: jsonl -> {:?}", output);
        Ok(Box::new(JsonlSink::new(output).with_context(|| {
            format!("CLI: Failed to create output {:?}", output)
        })?))
    }
}

fn open_input(input: &Path) -> Result<Box<dyn BufRead + Send>> {
    if input == Path::new("-") {
        Ok(Box::new(BufReader::new(std::io::stdin())))
    } else {
        let file =
            File::open(input).with_context(|| format!("CLI: Failed to open input {:?}", input))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Decode JSON lines on a dedicated thread and send them on in batches.
/// Returns the number of lines read and skipped.
fn spawn_reader(
    reader: Box<dyn BufRead + Send>,
    batch_size: usize,
) -> (Receiver<Vec<OsmElement>>, JoinHandle<Result<(u64, u64)>>) {
    let batch_size = batch_size.max(1);
    let (tx, rx) = bounded::<Vec<OsmElement>>(64);

    let handle = std::thread::spawn(move || -> Result<(u64, u64)> {
        let mut read = 0u64;
        let mut skipped = 0u64;
        let mut batch = Vec::with_capacity(batch_size);

        for (index, line) in reader.lines().enumerate() {
            let line = line.context("Input: Failed to read line")?;
            if line.trim().is_empty() {
                continue;
            }
            read += 1;
            match serde_json::from_str::<OsmElement>(&line) {
                Ok(element) => batch.push(element),
                Err(err) => {
                    skipped += 1;
                    tracing::warn!("Input: skipping line {}: {}", index + 1, err);
                    continue;
                }
            }
            if batch.len() >= batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                tx.send(full)
                    .map_err(|err| anyhow!("Pipeline: Failed to send element batch: {}", err))?;
            }
        }
        if !batch.is_empty() {
            tx.send(batch)
                .map_err(|err| anyhow!("Pipeline: Failed to send element batch: {}", err))?;
        }
        Ok((read, skipped))
    });

    (rx, handle)
}

/// Whether the element, or its view without the lifecycle prefix, matches.
pub fn element_matches(
    filter: &ElementFilter,
    lifecycle: Option<&str>,
    element: &OsmElement,
    today: Date,
) -> bool {
    filter.matches_at(element, today)
        || lifecycle.is_some_and(|prefix| {
            as_if_it_wasnt(prefix, element).is_some_and(|view| filter.matches_at(&view, today))
        })
}

fn write_matches(
    rx: Receiver<Vec<OsmElement>>,
    filter: &ElementFilter,
    lifecycle: Option<&str>,
    today: Date,
    sink: &mut dyn DataSink,
    progress: &ProgressCounter,
) -> Result<u64> {
    let mut matched = 0u64;
    for batch in rx {
        let hits: Vec<bool> = batch
            .par_iter()
            .map(|element| element_matches(filter, lifecycle, element, today))
            .collect();
        progress.inc(batch.len() as u64);

        for (element, hit) in batch.iter().zip(hits) {
            if hit {
                sink.add_element(element)?;
                matched += 1;
            }
        }
    }
    Ok(matched)
}

pub fn run_match(args: &MatchArgs, verbose: bool) -> Result<MatchSummary> {
    let filter = resolve_filter(args)?;
    let today = args.today.unwrap_or_else(today_utc);
    tracing::info!("Filter: {} (today = {})", filter, today);

    let input = open_input(&args.input)?;
    let mut sink = init_sink(&args.output)?;
    let progress = ProgressCounter::new("Elements", 100_000, verbose);

    let (rx, reader) = spawn_reader(input, args.batch_size);
    let write_result = write_matches(
        rx,
        &filter,
        args.lifecycle.as_deref(),
        today,
        sink.as_mut(),
        &progress,
    );

    // The reader stops on its own once the receiver is gone
    let (read, skipped) = match reader.join() {
        Ok(Ok(counts)) => counts,
        Ok(Err(reader_err)) => {
            return match write_result {
                Err(write_err) => Err(write_err),
                Ok(_) => Err(reader_err),
            };
        }
        Err(panic_payload) => {
            let panic_msg = panic_payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic_payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            return Err(anyhow!("Pipeline: Reader thread panicked: {}", panic_msg));
        }
    };

    let matched = write_result?;
    sink.finish().context("Pipeline: Failed to finalize sink")?;
    progress.finish();

    Ok(MatchSummary {
        read,
        skipped,
        matched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_parse_today() {
        assert_eq!(parse_today("2024-02-29"), Ok(date!(2024 - 02 - 29)));
        assert!(parse_today("2023-02-29").is_err());
        assert!(parse_today("2024-02").is_err());
    }

    #[test]
    fn test_lifecycle_matching() {
        let filter = ElementFilter::parse("nodes with shop").unwrap();
        let today = date!(2024 - 01 - 01);
        let disused = OsmElement::node(1, [("disused:shop", "bakery")]);
        assert!(!element_matches(&filter, None, &disused, today));
        assert!(element_matches(&filter, Some("disused"), &disused, today));
        assert!(!element_matches(&filter, Some("abandoned"), &disused, today));
    }

    #[test]
    fn test_reader_batches_and_skips_bad_lines() {
        let input = concat!(
            "{\"type\":\"node\",\"id\":1,\"tags\":{\"a\":\"b\"}}\n",
            "\n",
            "not json\n",
            "{\"type\":\"way\",\"id\":2}\n",
            "{\"type\":\"blob\",\"id\":3}\n",
            "{\"type\":\"relation\",\"id\":4,\"timestamp\":\"2020-01-01T00:00:00Z\"}\n",
        );
        let reader: Box<dyn BufRead + Send> = Box::new(std::io::Cursor::new(input.to_string()));
        let (rx, handle) = spawn_reader(reader, 2);
        let batches: Vec<Vec<OsmElement>> = rx.iter().collect();
        let (read, skipped) = handle.join().unwrap().unwrap();

        assert_eq!(read, 5);
        assert_eq!(skipped, 2);
        assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 1]);
        assert!(batches[1][0].timestamp.is_some());
    }
}
