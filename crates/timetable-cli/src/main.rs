//! `timetable` CLI — expand rules, reconcile and collision-check series stored
//! in a JSON snapshot.
//!
//! ## Usage
//!
//! ```sh
//! # List the named rules
//! timetable presets
//!
//! # Starts of a rule between two instants
//! timetable expand --rule DAILY --start 2026-03-02T09:00:00Z --until 2026-03-30T09:00:00Z
//!
//! # Occurrences of series 2, storing the missing ones
//! timetable reconcile -s store.json --series 2 --commit
//!
//! # Would a new one-off collide in calendar 1?
//! timetable check -s store.json --calendar 1 \
//!     --start 2026-03-02T09:30:00Z --end 2026-03-02T10:30:00Z
//!
//! # Move the end of series 2's recurring period
//! timetable extend -s store.json --series 2 \
//!     --until 2026-04-27T09:00:00Z --from 2026-03-10T00:00:00Z
//! ```

use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use timetable_engine::reconcile::Window;
use timetable_engine::snapshot::Snapshot;
use timetable_engine::validate::ensure_valid;
use timetable_engine::{
    CalendarId, CollisionDetector, Conflict, EngineConfig, MemoryStore, Reconciler, RuleCatalog,
    Series, SeriesId, SeriesRepository, Timetable,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "timetable",
    version,
    about = "Recurring series, occurrence reconciliation and collision checks"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration file (TOML); TIMETABLE_* variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the named recurrence rules
    Presets,
    /// Print the starts a named rule produces in [start, until]
    Expand {
        /// Rule name (empty for one-time)
        #[arg(long, default_value = "")]
        rule: String,
        #[arg(long)]
        start: DateTime<Utc>,
        #[arg(long)]
        until: DateTime<Utc>,
    },
    /// Print a series' occurrences, optionally storing the missing ones
    Reconcile {
        /// Snapshot file (reads from stdin if omitted)
        #[arg(short, long)]
        store: Option<String>,
        /// Where to write the updated snapshot (defaults to --store)
        #[arg(short, long)]
        output: Option<String>,
        #[arg(long)]
        series: u64,
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        #[arg(long)]
        to: Option<DateTime<Utc>>,
        /// Store the missing occurrences
        #[arg(long)]
        commit: bool,
    },
    /// Check a proposed series for collisions inside a calendar
    Check {
        /// Snapshot file (reads from stdin if omitted)
        #[arg(short, long)]
        store: Option<String>,
        #[arg(long)]
        calendar: u64,
        #[arg(long)]
        start: DateTime<Utc>,
        #[arg(long)]
        end: DateTime<Utc>,
        /// Rule name (empty for one-time)
        #[arg(long, default_value = "")]
        rule: String,
        /// End of the recurring period
        #[arg(long)]
        until: Option<DateTime<Utc>>,
    },
    /// Move the end of a series' recurring period
    Extend {
        /// Snapshot file (reads from stdin if omitted)
        #[arg(short, long)]
        store: Option<String>,
        /// Where to write the updated snapshot (defaults to --store)
        #[arg(short, long)]
        output: Option<String>,
        #[arg(long)]
        series: u64,
        /// New end of the recurring period
        #[arg(long)]
        until: DateTime<Utc>,
        /// Instant from which missing occurrences are created
        #[arg(long)]
        from: DateTime<Utc>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let config =
        EngineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let catalog = RuleCatalog::standard();

    match cli.command {
        Commands::Presets => {
            let presets: Vec<serde_json::Value> = catalog
                .choices()
                .iter()
                .map(|c| serde_json::json!({ "name": c.name, "label": c.label }))
                .collect();
            print_json(&presets)?;
        }
        Commands::Expand { rule, start, until } => {
            let starts = match catalog.decode(&rule).context("Failed to decode rule")? {
                Some(rule) => rule
                    .generate_bounded(start, until, config.max_instances)
                    .context("Failed to expand rule")?,
                None if start <= until => vec![start],
                None => Vec::new(),
            };
            print_json(&starts)?;
        }
        Commands::Reconcile {
            store,
            output,
            series,
            from,
            to,
            commit,
        } => {
            let mut memory = load_store(store.as_deref(), &catalog)?;
            let series = find_series(&memory, series)?;
            let window = Window {
                start: from,
                end: to,
            };
            let occurrences = Reconciler::new(&config)
                .reconcile(&mut memory, &series, window, commit, &())
                .context("Failed to reconcile series")?;
            if commit {
                save_store(store.as_deref(), output.as_deref(), &memory, &catalog)?;
            }
            print_json(&occurrences)?;
        }
        Commands::Check {
            store,
            calendar,
            start,
            end,
            rule,
            until,
        } => {
            let memory = load_store(store.as_deref(), &catalog)?;
            let calendar = CalendarId(calendar);
            memory
                .find_calendar(calendar)?
                .with_context(|| format!("Unknown calendar: {calendar}"))?;

            let mut candidate = Series::new(start, end).in_calendar(calendar);
            candidate.rule = catalog.decode(&rule).context("Failed to decode rule")?;
            candidate.recurring_period_end = until;
            ensure_valid(timetable_engine::validate_series(&candidate))
                .context("Invalid series")?;

            let found = CollisionDetector::new(&config)
                .find_series_collision(&memory, calendar, &candidate)
                .context("Failed to check for collisions")?;
            let conflict = found.as_ref().map(Conflict::from_occurrence);
            print_json(&conflict)?;
            if conflict.is_some() {
                process::exit(1);
            }
        }
        Commands::Extend {
            store,
            output,
            series,
            until,
            from,
        } => {
            let mut memory = load_store(store.as_deref(), &catalog)?;
            let occurrences = Timetable::new(&config)
                .update_recurring_period(&mut memory, SeriesId(series), until, from, &())
                .context("Failed to update recurring period")?;
            save_store(store.as_deref(), output.as_deref(), &memory, &catalog)?;
            print_json(&occurrences)?;
        }
    }

    Ok(())
}

fn find_series(memory: &MemoryStore, id: u64) -> Result<Series> {
    let id = SeriesId(id);
    memory
        .find_series(id)?
        .with_context(|| format!("Unknown series: {id}"))
}

fn load_store(path: Option<&str>, catalog: &RuleCatalog) -> Result<MemoryStore> {
    let json = read_input(path)?;
    let snapshot = Snapshot::from_json(&json).context("Failed to parse snapshot")?;
    snapshot
        .restore(catalog)
        .context("Failed to restore snapshot")
}

fn save_store(
    store: Option<&str>,
    output: Option<&str>,
    memory: &MemoryStore,
    catalog: &RuleCatalog,
) -> Result<()> {
    let path = output
        .or(store)
        .context("Writing the snapshot needs --store or --output")?;
    let json = Snapshot::capture(memory, catalog)
        .and_then(|s| s.to_json())
        .context("Failed to serialize snapshot")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write file: {}", path))?;
    tracing::info!(path, "Snapshot written");
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}
