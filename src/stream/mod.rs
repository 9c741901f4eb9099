//! Event bridge between payment producers and the ledger pipeline
//!
//! Producers publish card payloads to a partitioned topic keyed by card
//! number; a pool of competing consumers feeds them into the pipeline.
//!
//! - `topic` - In-process partitioned log with per-group offsets
//! - `producer` - JSON publishing keyed by card number
//! - `consumer` - Worker pool with round-robin partition assignment
//! - `commit` - Offset decisions for failed records

pub mod commit;
pub mod consumer;
pub mod producer;
pub mod topic;

pub use commit::{
    create_strategy, dead_letter_topic_name, AcknowledgeOnFailure, CommitStrategy, DeadLetter,
    Disposition,
};
pub use consumer::{
    join_workers, total_stats, ConsumerConfig, ConsumerPool, ConsumerStats, WorkerReport,
};
pub use producer::EventProducer;
pub use topic::{PartitionedTopic, Record, RecordPosition};
