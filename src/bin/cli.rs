//! metricdb CLI
//!
//! Command-line interface for a local metricdb dataset.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use metricdb::{
    BoundaryPolicy, Config, Encoding, Horizon, Metric, MetricError, MetricStore, Partial, Result,
};
use tracing_subscriber::{fmt, EnvFilter};

/// metricdb CLI
#[derive(Parser, Debug)]
#[command(name = "metricdb-cli")]
#[command(about = "Store and query time-series metrics")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./metricdb_data")]
    data_dir: PathBuf,

    /// Dataset horizon (earliest storable stamp)
    #[arg(long, default_value_t = Horizon::LEGACY.epoch())]
    horizon: u32,

    /// Key/value encoding: text or binary
    #[arg(short, long, default_value_t = Encoding::Binary)]
    encoding: Encoding,

    /// Range boundaries: half-open or left-open
    #[arg(short, long, default_value_t = BoundaryPolicy::HalfOpen)]
    boundary: BoundaryPolicy,

    /// MemTable size limit in MB before flush
    #[arg(short = 'm', long, default_value = "64")]
    memtable_mb: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store one sample
    Put {
        name: String,
        stamp: u32,
        value: f64,
        score: f64,
        average: f64,
    },

    /// Print the samples of NAME between START and END
    Get { name: String, start: u32, end: u32 },

    /// Delete the samples of NAME between START and END
    Delete { name: String, start: u32, end: u32 },

    /// Delete the samples of NAME from the horizon up to END
    DeleteTo { name: String, end: u32 },

    /// Print every stored sample
    Dump,

    /// Copy the dataset into another directory
    Migrate {
        /// Destination data directory
        #[arg(long)]
        to: PathBuf,

        /// Destination horizon (defaults to the source horizon)
        #[arg(long)]
        to_horizon: Option<u32>,

        /// Destination encoding (defaults to the source encoding)
        #[arg(long)]
        to_encoding: Option<Encoding>,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,metricdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        tracing::error!(
            corruption = e.is_corruption(),
            retryable = e.is_retryable(),
            "{}",
            e
        );
        std::process::exit(exit_code(&e));
    }
}

/// Exit status by error class (75 is EX_TEMPFAIL)
fn exit_code(e: &MetricError) -> i32 {
    if e.is_corruption() {
        2
    } else if e.is_retryable() {
        75
    } else {
        1
    }
}

fn run(args: Args) -> Result<()> {
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .horizon(Horizon::new(args.horizon))
        .encoding(args.encoding)
        .boundary(args.boundary)
        .memtable_size_limit(args.memtable_mb * 1024 * 1024)
        .build();

    let store = MetricStore::open(config.clone())?;
    let outcome = execute(&store, &config, args.command);
    let closed = store.close();
    outcome.and(closed)
}

fn execute(store: &MetricStore, config: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Put {
            name,
            stamp,
            value,
            score,
            average,
        } => store.put(&Metric::new(name, stamp, value, score, average)),

        Commands::Get { name, start, end } => {
            let (metrics, error) = store.get(&name, start, end).into_parts();
            metrics.iter().for_each(print_metric);
            error.map_or(Ok(()), Err)
        }

        Commands::Delete { name, start, end } => report_deleted(store.delete(&name, start, end)),

        Commands::DeleteTo { name, end } => report_deleted(store.delete_to(&name, end)),

        Commands::Dump => {
            store.scan_all()?.iter().for_each(print_metric);
            Ok(())
        }

        Commands::Migrate {
            to,
            to_horizon,
            to_encoding,
        } => {
            let dst_config = Config {
                data_dir: to,
                horizon: to_horizon.map_or(config.horizon, Horizon::new),
                encoding: to_encoding.unwrap_or(config.encoding),
                ..config.clone()
            };
            let dst = MetricStore::open(dst_config)?;
            let outcome = metricdb::migrate(store, &dst);
            let closed = dst.close();
            let report = outcome?;
            closed?;

            println!(
                "copied {} samples, skipped {} below horizon",
                report.copied, report.skipped_below_horizon
            );
            Ok(())
        }
    }
}

fn report_deleted(deleted: Partial<usize>) -> Result<()> {
    let (count, error) = deleted.into_parts();
    match error {
        None => {
            println!("deleted {}", count);
            Ok(())
        }
        Some(e) => {
            println!("deleted up to {} (unverified)", count);
            Err(e)
        }
    }
}

fn print_metric(metric: &Metric) {
    println!(
        "{}\t{}\t{}\t{}\t{}",
        metric.name, metric.stamp, metric.value, metric.score, metric.average
    );
}
