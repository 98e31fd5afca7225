mod docparse;
mod fetch;
mod merge;
mod model;
mod process;
mod registry;
mod store;

use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use rand::seq::SliceRandom;

use crate::model::{DisplayRecord, PillRecord};
use crate::store::paths;

#[derive(Parser)]
#[command(name = "drugdata", about = "MFDS drug open-data pipeline: fetch, parse, merge, filter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch drug approval records from the permission-detail API
    FetchApprovals {
        /// Max pages to fetch (default: all)
        #[arg(short = 'n', long)]
        pages: Option<usize>,
    },
    /// Fetch pill appearance records from the identification API
    FetchPills {
        /// Max pages to fetch (default: all)
        #[arg(short = 'n', long)]
        pages: Option<usize>,
    },
    /// Parse the regulatory documents of fetched approvals into display records
    Process,
    /// Join pill appearance data onto processed approvals by ITEM_SEQ
    Merge,
    /// Drop records withdrawn from the nedrug registry
    Filter {
        /// Concurrent registry lookups per batch
        #[arg(short, long)]
        batch: Option<usize>,
        /// Check only a random sample of this many records
        #[arg(short, long)]
        sample: Option<usize>,
    },
    /// Fetch both feeds, process, and merge in one pipeline
    Run {
        /// Max pages to fetch per feed
        #[arg(short = 'n', long)]
        pages: Option<usize>,
    },
    /// Show record counts of every pipeline artifact
    Stats,
    /// Parse a single document from a file (or stdin) and print the result
    Parse {
        /// XML file to parse; reads stdin when omitted
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::FetchApprovals { pages } => fetch_approvals(pages).await,
        Commands::FetchPills { pages } => fetch_pills(pages).await,
        Commands::Process => process_approvals(),
        Commands::Merge => merge_records(),
        Commands::Filter { batch, sample } => filter_records(batch, sample).await,
        Commands::Run { pages } => {
            fetch_approvals(pages).await?;
            fetch_pills(pages).await?;
            process_approvals()?;
            merge_records()
        }
        Commands::Stats => {
            print_stats();
            Ok(())
        }
        Commands::Parse { file } => parse_one(file),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn fetch_approvals(pages: Option<usize>) -> anyhow::Result<()> {
    let outcome = fetch::approvals::fetch_approvals(pages).await?;
    println!(
        "Fetched {} approval records ({} canceled, {} export-only skipped)",
        outcome.records.len(),
        outcome.canceled,
        outcome.export_only
    );
    store::save_records(paths::RAW_APPROVALS, &outcome.records)
}

async fn fetch_pills(pages: Option<usize>) -> anyhow::Result<()> {
    let records = fetch::pills::fetch_pills(pages).await?;
    println!("Fetched {} pill records", records.len());
    store::save_records(paths::RAW_PILLS, &records)
}

fn process_approvals() -> anyhow::Result<()> {
    let records = store::load_records(paths::RAW_APPROVALS)?;
    if records.is_empty() {
        println!("No raw approvals. Run 'fetch-approvals' first.");
        return Ok(());
    }
    println!("Processing {} approval records...", records.len());
    let outcome = process::process_records(records);
    println!(
        "Done: {} display records ({} skipped, {} with parse errors).",
        outcome.display.len(),
        outcome.skipped,
        outcome.report.len()
    );
    store::save_records(paths::PROCESSED_APPROVALS, &outcome.display)?;
    let report = model::ErrorReport {
        generated_at: chrono::Utc::now(),
        records: outcome.report,
    };
    store::save_value(paths::ERROR_REPORT, &report)
}

fn merge_records() -> anyhow::Result<()> {
    let approvals: Vec<DisplayRecord> = store::load_records(paths::PROCESSED_APPROVALS)?;
    let pills: Vec<PillRecord> = store::load_records(paths::RAW_PILLS)?;
    if approvals.is_empty() {
        println!("No processed approvals. Run 'process' first.");
        return Ok(());
    }

    let approvals = merge::preprocess_approvals(approvals);
    let pills = merge::preprocess_pills(pills);
    let outcome = merge::merge(approvals, pills);
    let analysis = merge::analyze(&outcome);
    merge::log_analysis(&analysis);

    store::save_records(paths::MERGED, &outcome.merged)?;
    store::save_records(paths::UNMATCHED_PILLS, &outcome.unmatched_pills)?;
    store::save_records(paths::UNMATCHED_APPROVALS, &outcome.unmatched_approvals)
}

async fn filter_records(batch: Option<usize>, sample: Option<usize>) -> anyhow::Result<()> {
    let approvals: Vec<DisplayRecord> = store::load_records(paths::PROCESSED_APPROVALS)?;
    let pills: Vec<PillRecord> = store::load_records(paths::RAW_PILLS)?;

    let approvals = maybe_sample(approvals, sample);
    let pills = maybe_sample(pills, sample);

    println!("Checking {} approvals against the registry...", approvals.len());
    let (kept, stats) = registry::filter_registered(approvals, batch.unwrap_or(10)).await?;
    println!(
        "Approvals: kept {} of {} ({} withdrawn)",
        kept.len(),
        stats.total,
        stats.not_registered
    );
    store::save_records(paths::FILTERED_APPROVALS, &kept)?;

    println!("Checking {} pills against the registry...", pills.len());
    let (kept, stats) = registry::filter_registered(pills, batch.unwrap_or(15)).await?;
    println!(
        "Pills: kept {} of {} ({} withdrawn)",
        kept.len(),
        stats.total,
        stats.not_registered
    );
    store::save_records(paths::FILTERED_PILLS, &kept)
}

fn maybe_sample<T>(mut records: Vec<T>, sample: Option<usize>) -> Vec<T> {
    let Some(n) = sample else { return records };
    if n >= records.len() {
        return records;
    }
    let mut rng = rand::thread_rng();
    records.shuffle(&mut rng);
    records.truncate(n);
    records
}

fn print_stats() {
    let rows = [
        ("Raw approvals", paths::RAW_APPROVALS),
        ("Raw pills", paths::RAW_PILLS),
        ("Processed approvals", paths::PROCESSED_APPROVALS),
        ("Merged", paths::MERGED),
        ("Unmatched pills", paths::UNMATCHED_PILLS),
        ("Unmatched approvals", paths::UNMATCHED_APPROVALS),
        ("Filtered approvals", paths::FILTERED_APPROVALS),
        ("Filtered pills", paths::FILTERED_PILLS),
    ];
    for (label, path) in rows {
        match store::count_records(path) {
            Some(n) => println!("{:<20} {:>8}  ({})", label, n, path),
            None => println!("{:<20} {:>8}  ({})", label, "-", path),
        }
    }
}

fn parse_one(file: Option<PathBuf>) -> anyhow::Result<()> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(&path)?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    match docparse::extract(&raw) {
        Some(doc) => println!("{}", serde_json::to_string_pretty(&doc)?),
        None => println!("null"),
    }
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
