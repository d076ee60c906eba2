//! # Rewind Inspect
//!
//! A standalone CLI that reads flushed Rewind segments from disk.
//!
//! ## Segment layout
//!
//! ```text
//! {"records":[<record>,<record>,...],"application":{"id":..},"session":{"id":..},
//!  "view":{"id":..},"start":..,"end":..,"records_count":..,"has_full_snapshot":..,
//!  "creation_reason":..,"index_in_view":..,"source":..}\n
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use colored::*;
use rewind_core::Record;
use rewind_segment::{decode_segment, DecodedSegment};

// ─── CLI ───────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "rewind-inspect")]
#[command(about = "Decode Rewind segments and summarize their records")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print segment metadata and a histogram of record kinds
    Show {
        /// Segment file, as delivered to the transport
        file: PathBuf,
    },
    /// Print records one per line
    Records {
        file: PathBuf,
        /// Only records of this kind (e.g. `mutation`, `full_snapshot`)
        #[arg(long)]
        kind: Option<String>,
        /// Stop after this many records
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Check the metadata against the records; exits non-zero on mismatch
    Check { file: PathBuf },
}

// ─── Loading ───────────────────────────────────────────────────────────────

fn load(file: &PathBuf) -> DecodedSegment {
    let bytes = match std::fs::read(file) {
        Ok(bytes) => bytes,
        Err(e) => fail(&format!("cannot read {}: {}", file.display(), e)),
    };
    match decode_segment(&bytes) {
        Ok(segment) => segment,
        Err(e) => fail(&format!("{} is not a segment: {}", file.display(), e)),
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{} {}", "error:".bright_red().bold(), message);
    process::exit(1);
}

/// Kind of an untyped record. Values that do not parse as a record are
/// reported as `unserializable`.
fn kind_of(value: &serde_json::Value) -> String {
    match serde_json::from_value::<Record>(value.clone()) {
        Ok(record) => record.kind_name().to_string(),
        Err(_) => "unserializable".to_string(),
    }
}

fn histogram(segment: &DecodedSegment) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for value in &segment.records {
        *counts.entry(kind_of(value)).or_insert(0) += 1;
    }
    counts
}

// ─── Pretty printing ──────────────────────────────────────────────────────

fn header(text: &str) {
    let bar = "═".repeat(60);
    println!("\n{}", bar.bright_cyan());
    println!("  {}", text.bold().bright_white());
    println!("{}", bar.bright_cyan());
}

fn section(text: &str) {
    println!("\n{} {}", "▸".bright_yellow(), text.bold());
}

fn field(name: &str, value: impl std::fmt::Display) {
    println!("  {:<20} {}", name.dimmed(), value);
}

// ─── Commands ──────────────────────────────────────────────────────────────

fn run_show(file: &PathBuf) {
    let segment = load(file);
    let metadata = &segment.metadata;

    header(&format!("Segment {}", file.display()));
    section("Metadata");
    field("application", &metadata.application.id);
    field("session", &metadata.session.id);
    field("view", &metadata.view.id);
    field("index in view", metadata.index_in_view);
    field("creation reason", metadata.creation_reason.to_string().bright_magenta());
    field("source", &metadata.source);
    field("start", metadata.start);
    field("end", metadata.end);
    field("duration (ms)", metadata.end.saturating_sub(metadata.start));
    field("records", metadata.records_count);
    let snapshot = if metadata.has_full_snapshot {
        "yes".bright_green()
    } else {
        "no".yellow()
    };
    field("full snapshot", snapshot);

    section("Records by kind");
    let counts = histogram(&segment);
    let widest = counts.values().copied().max().unwrap_or(0).max(1);
    for (kind, count) in &counts {
        let bar = "█".repeat((count * 30).div_ceil(widest));
        let label = if kind == "unserializable" {
            kind.bright_red().to_string()
        } else {
            kind.to_string()
        };
        println!("  {:<20} {:>6}  {}", label, count, bar.bright_cyan());
    }
}

fn run_records(file: &PathBuf, kind: Option<&str>, limit: Option<usize>) {
    let segment = load(file);
    let selected = segment
        .records
        .iter()
        .filter(|value| kind.map_or(true, |k| kind_of(value) == k))
        .take(limit.unwrap_or(usize::MAX));

    for value in selected {
        let timestamp = value
            .get("timestamp")
            .and_then(|t| t.as_u64())
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:>14} {:<18} {}", timestamp.dimmed(), kind_of(value).bright_yellow(), value);
    }
}

fn run_check(file: &PathBuf) {
    let segment = load(file);
    let problems = check(&segment);

    header(&format!("Check {}", file.display()));
    if problems.is_empty() {
        println!("\n  {} {}", "✓".bright_green().bold(), "metadata matches the records".bright_green());
        return;
    }
    for problem in &problems {
        println!("  {} {}", "✗".bright_red().bold(), problem);
    }
    process::exit(2);
}

fn check(segment: &DecodedSegment) -> Vec<String> {
    let metadata = &segment.metadata;
    let mut problems = Vec::new();

    if metadata.records_count != segment.records.len() as u64 {
        problems.push(format!(
            "records_count is {} but the segment holds {} records",
            metadata.records_count,
            segment.records.len()
        ));
    }
    if metadata.start > metadata.end {
        problems.push(format!("start {} is after end {}", metadata.start, metadata.end));
    }

    let records = segment.typed_records();
    let has_full_snapshot = records.iter().any(|r| r.is_full_snapshot());
    if has_full_snapshot != metadata.has_full_snapshot {
        problems.push(format!(
            "has_full_snapshot is {} but the records say {}",
            metadata.has_full_snapshot, has_full_snapshot
        ));
    }
    for record in &records {
        let timestamp = record.timestamp();
        if timestamp < metadata.start || timestamp > metadata.end {
            problems.push(format!(
                "{} record at {} is outside [{}, {}]",
                record.kind_name(),
                timestamp,
                metadata.start,
                metadata.end
            ));
        }
    }
    problems
}

// ─── Main ──────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Show { file } => run_show(&file),
        Commands::Records { file, kind, limit } => run_records(&file, kind.as_deref(), limit),
        Commands::Check { file } => run_check(&file),
    }
}
