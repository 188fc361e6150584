use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use nodestats::config::{LoggingConfig, NodeStatsConfig, StatsConfig};
use nodestats::{JobRecord, StatsStore};

#[derive(Parser)]
#[command(
    name = "nodestats",
    about = "Per-node job statistics recorder",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct StoreArgs {
    /// Config file (defaults to $NODESTATS_CONFIG, then /etc/nodestats/nodestats.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured history directory
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Scope the store to one node's subdirectory
    #[arg(long)]
    node: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the recorded history and counters
    Show {
        #[command(flatten)]
        store: StoreArgs,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Record one completed job
    Record {
        #[command(flatten)]
        store: StoreArgs,

        /// Job outcome (e.g. success, failure, timeout)
        #[arg(long)]
        status: String,

        /// Start time (RFC 3339)
        #[arg(long)]
        start: DateTime<Utc>,

        /// End time (RFC 3339), defaults to now
        #[arg(long)]
        end: Option<DateTime<Utc>>,
    },

    /// Print success, failure and per-status counters
    Counters {
        #[command(flatten)]
        store: StoreArgs,
    },
}

impl StoreArgs {
    fn resolve(&self) -> Result<(StatsConfig, LoggingConfig)> {
        let file = match &self.config {
            Some(path) => NodeStatsConfig::load(path)?,
            None => NodeStatsConfig::load_or_default(),
        };

        let mut stats = file.stats;
        if let Some(dir) = &self.dir {
            stats.history_dir = dir.clone();
        }
        if let Some(node) = &self.node {
            stats = stats.for_node(node)?;
        }
        Ok((stats, file.logging))
    }

    fn open(&self) -> Result<StatsStore> {
        // Config loading logs before the configured subscriber exists.
        let bootstrap = tracing_subscriber::fmt()
            .with_env_filter(env_filter("info"))
            .with_writer(std::io::stderr)
            .finish();
        let (stats, logging) = tracing::subscriber::with_default(bootstrap, || self.resolve())?;
        init_tracing(&logging);
        let store = StatsStore::open(&stats)
            .with_context(|| format!("failed to open stats in {}", stats.history_dir.display()))?;
        tracing::debug!(outcome = ?store.load_outcome(), "opened stats store");
        Ok(store)
    }
}

fn env_filter(default_level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level))
}

fn init_tracing(logging: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(&logging.level))
        .with_writer(std::io::stderr);
    let _ = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Show { store, json } => {
            let store = store.open()?;
            let snapshot = store.snapshot();
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                println!("Stats in {}", store.stats_path().display());
                println!("{:<20} | {:<25} | {:<25} | Time (s)", "Status", "Start", "End");
                println!("{:-<20}-|-{:-<25}-|-{:-<25}-|-{:-<10}", "", "", "", "");
                for (status, entries) in &snapshot.history {
                    for entry in entries {
                        println!(
                            "{:<20} | {:<25} | {:<25} | {:.3}",
                            status,
                            entry.start.to_rfc3339(),
                            entry.end.to_rfc3339(),
                            entry.elapsed.as_secs_f64()
                        );
                    }
                }
                println!("\nLast touched: {}", store.mtime());
            }
        }
        Commands::Record {
            store,
            status,
            start,
            end,
        } => {
            let mut store = store.open()?;
            let job = JobRecord::new(status, start, end.unwrap_or_else(Utc::now));
            store.add(&job).context("failed to record job")?;
            tracing::info!(status = %job.status, path = %store.stats_path().display(), "job recorded");
        }
        Commands::Counters { store } => {
            let store = store.open()?;
            println!("successes: {}", store.successes());
            println!("failures:  {}", store.failures());
            for (status, count) in store.counters() {
                println!("  {:<20} {}", status, count);
            }
        }
    }

    Ok(())
}
