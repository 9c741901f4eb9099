use crate::core::settlement::{
    SettlementConfig, DEFAULT_AMOUNT_LIMIT, DEFAULT_FAILURE_RATE, DEFAULT_LATENCY,
    MAX_AMOUNT_LIMIT,
};
use crate::core::sqlite_store::{PoolConfig, DEFAULT_MAX_IDLE, DEFAULT_MAX_OPEN};
use crate::stream::ConsumerConfig;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Default number of partitions of the payment topic
pub const DEFAULT_PARTITIONS: usize = 8;

/// Card-payment intake and settlement ledger
#[derive(Parser, Debug)]
#[command(name = "card-ledger", version)]
#[command(about = "Card-payment intake and settlement ledger", long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub ledger: LedgerArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API and run the consumer pool
    Serve(ServeArgs),

    /// Publish payments from a CSV file, consume them and print account summaries
    Ingest(IngestArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "SERVER_PORT", default_value_t = 8080)]
    pub port: u16,
}

#[derive(Args, Debug)]
pub struct IngestArgs {
    /// Input CSV file of card payments
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Card registrations (`name,email,card_number,card_type`) applied first
    #[arg(long, value_name = "PATH")]
    pub cards: Option<PathBuf>,
}

/// Options shared by every subcommand
#[derive(Args, Debug)]
pub struct LedgerArgs {
    /// SQLite database file (in-memory store when absent)
    #[arg(long, global = true, env = "DATABASE_PATH", value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Upper bound of open database connections (default: 25)
    #[arg(long, global = true, env = "DB_MAX_OPEN_CONNS", value_name = "COUNT")]
    pub db_max_open: Option<u32>,

    /// Idle database connections kept open (default: 25)
    #[arg(long, global = true, env = "DB_MAX_IDLE_CONNS", value_name = "COUNT")]
    pub db_max_idle: Option<u32>,

    #[arg(
        long,
        global = true,
        env = "STREAM_TOPIC",
        default_value = "card-transactions"
    )]
    pub topic: String,

    /// Partitions of the payment topic (default: 8)
    #[arg(long, global = true, env = "STREAM_PARTITIONS", value_name = "COUNT")]
    pub partitions: Option<usize>,

    #[arg(
        long,
        global = true,
        env = "CONSUMER_GROUP",
        default_value = "ledger-consumer"
    )]
    pub consumer_group: String,

    /// Consumer workers (default: CPU cores)
    #[arg(long, global = true, env = "CONSUMER_WORKERS", value_name = "COUNT")]
    pub workers: Option<usize>,

    /// What the consumer does with records it failed to process
    #[arg(
        long,
        global = true,
        env = "COMMIT_STRATEGY",
        value_name = "STRATEGY",
        default_value = "ack"
    )]
    pub commit_strategy: CommitStrategyType,

    /// Per-transaction ceiling in minor units (default: 100000)
    #[arg(long, global = true, env = "AMOUNT_LIMIT", value_name = "MINOR_UNITS")]
    pub amount_limit: Option<i64>,

    /// Fraction of settlements failed as transient errors (default: 0.05)
    #[arg(long, global = true, env = "FAILURE_RATE", value_name = "RATE")]
    pub failure_rate: Option<f64>,

    /// Simulated authorization latency (default: 100)
    #[arg(long, global = true, env = "SETTLEMENT_LATENCY_MS", value_name = "MS")]
    pub settlement_latency_ms: Option<u64>,

    /// Seed of the settlement random source (default: from entropy)
    #[arg(long, global = true, env = "SETTLEMENT_SEED")]
    pub seed: Option<u64>,

    #[arg(
        long,
        global = true,
        env = "LOG_FORMAT",
        value_name = "FORMAT",
        default_value = "text"
    )]
    pub log_format: LogFormat,
}

/// Available commit strategies of the consumer pool
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CommitStrategyType {
    /// Acknowledge failed records and move on
    Ack,
    /// Copy failed records to the dead-letter topic, then acknowledge
    DeadLetter,
}

/// Output format of the log lines
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl LedgerArgs {
    /// Create a SettlementConfig from CLI arguments
    ///
    /// Missing values use the defaults. An amount limit outside
    /// `1..=MAX_AMOUNT_LIMIT` or a failure rate outside `[0, 1]` is logged and
    /// replaced by its default.
    pub fn to_settlement_config(&self) -> SettlementConfig {
        let amount_limit = match self.amount_limit {
            Some(limit) if limit <= 0 || limit > MAX_AMOUNT_LIMIT => {
                warn!(
                    "Invalid amount_limit ({}), using default ({})",
                    limit, DEFAULT_AMOUNT_LIMIT
                );
                DEFAULT_AMOUNT_LIMIT
            }
            Some(limit) => limit,
            None => DEFAULT_AMOUNT_LIMIT,
        };

        let failure_rate = match self.failure_rate {
            Some(rate) if !(0.0..=1.0).contains(&rate) => {
                warn!(
                    "Invalid failure_rate ({}), using default ({})",
                    rate, DEFAULT_FAILURE_RATE
                );
                DEFAULT_FAILURE_RATE
            }
            Some(rate) => rate,
            None => DEFAULT_FAILURE_RATE,
        };

        SettlementConfig {
            amount_limit,
            failure_rate,
            latency: self
                .settlement_latency_ms
                .map_or(DEFAULT_LATENCY, Duration::from_millis),
        }
    }

    /// Create a PoolConfig from CLI arguments
    pub fn to_pool_config(&self) -> PoolConfig {
        PoolConfig::new(
            self.db_max_open.unwrap_or(DEFAULT_MAX_OPEN),
            self.db_max_idle.unwrap_or(DEFAULT_MAX_IDLE),
        )
    }

    /// Create a ConsumerConfig from CLI arguments
    ///
    /// Zero workers is logged and replaced by the CPU count.
    pub fn to_consumer_config(&self) -> ConsumerConfig {
        let default = ConsumerConfig::default();
        let workers = match self.workers {
            Some(0) => {
                warn!("Invalid workers (0), using default ({})", default.workers);
                default.workers
            }
            Some(workers) => workers,
            None => default.workers,
        };

        ConsumerConfig {
            group: self.consumer_group.clone(),
            workers,
            ..default
        }
    }

    /// Partition count of the payment topic
    ///
    /// Zero is logged and replaced by the default.
    pub fn partition_count(&self) -> usize {
        match self.partitions {
            Some(0) => {
                warn!(
                    "Invalid partitions (0), using default ({})",
                    DEFAULT_PARTITIONS
                );
                DEFAULT_PARTITIONS
            }
            Some(partitions) => partitions,
            None => DEFAULT_PARTITIONS,
        }
    }
}
