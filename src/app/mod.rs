//! Application assembly for the `serve` and `ingest` commands
//!
//! A [`Ledger`] owns one instance of every long-lived component: the store,
//! the pipeline, the payment topic with its dead-letter companion, and the
//! consumer pool. Both commands build it from the same [`LedgerArgs`], so a
//! payment follows the same path whether it arrives over HTTP or from a CSV
//! file.
//!
//! # Architecture
//!
//! ```text
//! Ledger
//!     ├── Arc<dyn LedgerStore>       (MemoryStore or SqliteStore)
//!     ├── Arc<LedgerPipeline>        (shared by HTTP handlers and consumers)
//!     ├── Arc<PartitionedTopic>      (payment topic, keyed by card number)
//!     ├── Arc<PartitionedTopic>      (dead-letter topic)
//!     └── ConsumerPool               (competing consumers on the payment topic)
//! ```

use std::sync::Arc;

use tracing::info;

use crate::api::AppState;
use crate::cli::{CommitStrategyType, LedgerArgs};
use crate::core::{LedgerPipeline, LedgerStore, MemoryStore, SettlementEngine, SqliteStore};
use crate::stream::{
    create_strategy, dead_letter_topic_name, ConsumerConfig, ConsumerPool, EventProducer,
    PartitionedTopic,
};
use crate::types::LedgerError;

pub mod ingest;
pub mod serve;

pub use ingest::{ingest, register_cards, IngestReport};
pub use serve::{serve, serve_on};

/// The assembled ledger
#[derive(Debug, Clone)]
pub struct Ledger {
    pipeline: Arc<LedgerPipeline>,
    topic: Arc<PartitionedTopic>,
    dead_letters: Arc<PartitionedTopic>,
    pool: ConsumerPool,
}

impl Ledger {
    /// Assemble a ledger around existing components
    ///
    /// # Arguments
    ///
    /// * `store` - Persistence shared by every component
    /// * `settlement` - Authorization step of the pipeline
    /// * `topic` - Payment topic the pool consumes
    /// * `strategy` - What the pool does with failed records
    /// * `consumer` - Group id and pool size
    pub fn new(
        store: Arc<dyn LedgerStore>,
        settlement: SettlementEngine,
        topic: Arc<PartitionedTopic>,
        strategy: CommitStrategyType,
        consumer: ConsumerConfig,
    ) -> Self {
        let pipeline = Arc::new(LedgerPipeline::new(store, Arc::new(settlement)));
        let dead_letters = Arc::new(PartitionedTopic::new(
            dead_letter_topic_name(topic.name()),
            topic.partition_count(),
        ));
        let pool = ConsumerPool::new(
            Arc::clone(&topic),
            Arc::clone(&pipeline),
            create_strategy(strategy, &dead_letters),
            consumer,
        );

        Self {
            pipeline,
            topic,
            dead_letters,
            pool,
        }
    }

    /// Assemble a ledger from command-line options
    ///
    /// Opens (and migrates) the SQLite database when `--database` is given,
    /// and seeds the settlement random source when `--seed` is given.
    pub fn from_args(args: &LedgerArgs) -> Result<Self, LedgerError> {
        let store: Arc<dyn LedgerStore> = match &args.database {
            Some(path) => {
                info!(path = %path.display(), "opening sqlite store");
                Arc::new(SqliteStore::open_with(path, args.to_pool_config())?)
            }
            None => {
                info!("using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };

        let config = args.to_settlement_config();
        let settlement = match args.seed {
            Some(seed) => SettlementEngine::seeded(config, seed),
            None => SettlementEngine::new(config),
        };

        let topic = Arc::new(PartitionedTopic::new(&args.topic, args.partition_count()));

        Ok(Self::new(
            store,
            settlement,
            topic,
            args.commit_strategy,
            args.to_consumer_config(),
        ))
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        self.pipeline.store()
    }

    pub fn pipeline(&self) -> &Arc<LedgerPipeline> {
        &self.pipeline
    }

    pub fn topic(&self) -> &Arc<PartitionedTopic> {
        &self.topic
    }

    /// Topic the dead-letter strategy copies failed records to
    pub fn dead_letters(&self) -> &Arc<PartitionedTopic> {
        &self.dead_letters
    }

    pub fn pool(&self) -> &ConsumerPool {
        &self.pool
    }

    /// Producer publishing to the payment topic
    pub fn producer(&self) -> EventProducer {
        EventProducer::new(Arc::clone(&self.topic))
    }

    /// Handler state sharing this ledger's pipeline and topic
    pub fn app_state(&self) -> AppState {
        AppState::new(Arc::clone(&self.pipeline), self.producer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::CliArgs;
    use clap::Parser;

    fn args(extra: &[&str]) -> LedgerArgs {
        let mut argv = vec!["program", "serve"];
        argv.extend_from_slice(extra);
        CliArgs::try_parse_from(argv).unwrap().ledger
    }

    #[test]
    fn test_from_args_defaults() {
        let ledger = Ledger::from_args(&args(&[])).unwrap();

        assert_eq!(ledger.topic().name(), "card-transactions");
        assert_eq!(ledger.topic().partition_count(), 8);
        assert_eq!(ledger.dead_letters().name(), "card-transactions.dlq");
        assert_eq!(ledger.pool().group(), "ledger-consumer");
        assert_eq!(ledger.store().transaction_count().unwrap(), 0);
    }

    #[test]
    fn test_from_args_custom_topic() {
        let ledger =
            Ledger::from_args(&args(&["--topic", "payments", "--partitions", "3"])).unwrap();

        assert_eq!(ledger.topic().name(), "payments");
        assert_eq!(ledger.dead_letters().partition_count(), 3);
    }

    #[test]
    fn test_from_args_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let path_arg = path.to_str().unwrap();

        let ledger = Ledger::from_args(&args(&["--database", path_arg])).unwrap();
        ledger
            .app_state()
            .registry
            .register_account("Ada", "ada@example.com")
            .unwrap();
        drop(ledger);

        let reopened = Ledger::from_args(&args(&["--database", path_arg])).unwrap();
        assert_eq!(reopened.store().list_accounts().unwrap().len(), 1);
    }

    #[test]
    fn test_app_state_shares_the_topic() {
        let ledger = Ledger::from_args(&args(&["--partitions", "2"])).unwrap();
        let state = ledger.app_state();

        assert!(Arc::ptr_eq(state.producer.topic(), ledger.topic()));
        assert!(Arc::ptr_eq(&state.pipeline, ledger.pipeline()));
    }
}
