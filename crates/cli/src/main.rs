//! lagprobe CLI - enqueue consistency probes and inspect the stores

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lagprobe_core::application::DispatchPlan;
use tracing_subscriber::EnvFilter;

const DEFAULT_QUEUE_DB: &str = "~/.lagprobe/queue.db";
const DEFAULT_PRIMARY_DB: &str = "~/.lagprobe/primary.db";
const DEFAULT_SECONDARY_DB: &str = "~/.lagprobe/secondary.db";

#[derive(Parser, Debug)]
#[command(name = "lagprobe")]
#[command(about = "Replica consistency probe: dispatch read/write probes to the worker queue", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Job queue database
    #[arg(long, env = "LAGPROBE_QUEUE_DB", default_value = DEFAULT_QUEUE_DB, global = true)]
    queue_db: String,

    /// Primary (read/write) store
    #[arg(long, env = "LAGPROBE_PRIMARY_DB", default_value = DEFAULT_PRIMARY_DB, global = true)]
    primary_db: String,

    /// Secondary (read replica) store
    #[arg(long, env = "LAGPROBE_SECONDARY_DB", default_value = DEFAULT_SECONDARY_DB, global = true)]
    secondary_db: String,

    /// Queue the probes are dispatched to
    #[arg(long, env = "LAGPROBE_QUEUE", default_value = "default", global = true)]
    queue: String,

    /// Executions allowed per probe before it is marked FAILED
    #[arg(long, env = "LAGPROBE_MAX_ATTEMPTS", default_value_t = 1, global = true)]
    max_attempts: i32,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Dispatch read probes against the secondary store
    Read {
        /// Number of reads
        #[arg(long = "count-reads", alias = "count_reads", default_value_t = 1, allow_negative_numbers = true)]
        count_reads: i64,
    },

    /// Dispatch reads, then writes, then reads (independent jobs)
    ReadWriteRead {
        /// Reads before and after the writes
        #[arg(long = "count-reads", alias = "count_reads", default_value_t = 1, allow_negative_numbers = true)]
        count_reads: i64,

        /// Number of writes
        #[arg(long = "count-writes", alias = "count_writes", default_value_t = 1, allow_negative_numbers = true)]
        count_writes: i64,
    },

    /// Dispatch chains of reads, writes, then reads on the write connection
    ReadWriteReadChain {
        /// Number of chains
        #[arg(long = "count-repeats", alias = "count_repeats", default_value_t = 1, allow_negative_numbers = true)]
        count_repeats: i64,

        /// Reads before the writes (and reads after, on the primary)
        #[arg(long = "count-reads", alias = "count_reads", default_value_t = 1, allow_negative_numbers = true)]
        count_reads: i64,

        /// Writes per chain
        #[arg(long = "count-writes", alias = "count_writes", default_value_t = 1, allow_negative_numbers = true)]
        count_writes: i64,
    },

    /// Dispatch write probes against the primary store
    Write {
        /// Number of writes
        #[arg(long = "count-writes", alias = "count_writes", default_value_t = 1, allow_negative_numbers = true)]
        count_writes: i64,
    },

    /// Empty the probe table on both stores
    TruncateDatabases,

    /// Show queue job counts and store row counts
    Status,
}

impl Commands {
    /// The probes a dispatching command enqueues
    fn plan(&self) -> Option<DispatchPlan> {
        match *self {
            Commands::Read { count_reads } => Some(DispatchPlan::reads(count_reads)),
            Commands::ReadWriteRead {
                count_reads,
                count_writes,
            } => Some(DispatchPlan::read_write_read(count_reads, count_writes)),
            Commands::ReadWriteReadChain {
                count_repeats,
                count_reads,
                count_writes,
            } => Some(DispatchPlan::read_write_read_chain(
                count_repeats,
                count_reads,
                count_writes,
            )),
            Commands::Write { count_writes } => Some(DispatchPlan::writes(count_writes)),
            Commands::TruncateDatabases | Commands::Status => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let paths = commands::DbPaths {
        queue: shellexpand::tilde(&cli.queue_db).into_owned(),
        primary: shellexpand::tilde(&cli.primary_db).into_owned(),
        secondary: shellexpand::tilde(&cli.secondary_db).into_owned(),
    };

    if let Some(plan) = cli.command.plan() {
        return commands::dispatch(&paths, &cli.queue, cli.max_attempts, &plan).await;
    }

    match cli.command {
        Commands::TruncateDatabases => commands::truncate(&paths).await,
        Commands::Status => commands::status(&paths, &cli.queue).await,
        _ => Ok(()),
    }
}
