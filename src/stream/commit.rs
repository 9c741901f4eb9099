//! Commit strategies for the consumer pool
//!
//! When the pipeline fails on a stream record, the worker asks its commit
//! strategy what to do with the offset. The strategy is chosen at start-up,
//! so a stricter delivery policy can be swapped in without touching the
//! pipeline or the worker loop.

use std::sync::Arc;

use tracing::warn;

use super::topic::{PartitionedTopic, Record};
use crate::cli::CommitStrategyType;
use crate::types::LedgerError;

/// What the worker does with the offset of a failed record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Commit the offset and move to the next record
    Acknowledge,

    /// Leave the offset unchanged and retry the record after a back-off
    Redeliver,
}

/// Decides the fate of records the pipeline failed on
///
/// Successful records are always acknowledged; strategies only see failures.
pub trait CommitStrategy: Send + Sync {
    /// Handle a failed record
    ///
    /// # Arguments
    ///
    /// * `record` - The record the pipeline failed on
    /// * `error` - Why it failed
    fn on_failure(&self, record: &Record, error: &LedgerError) -> Disposition;

    /// Name used in logs
    fn name(&self) -> &'static str;
}

/// Acknowledge failed records; replay is left to an operator
#[derive(Debug, Default, Clone, Copy)]
pub struct AcknowledgeOnFailure;

impl CommitStrategy for AcknowledgeOnFailure {
    fn on_failure(&self, _record: &Record, _error: &LedgerError) -> Disposition {
        Disposition::Acknowledge
    }

    fn name(&self) -> &'static str {
        "ack"
    }
}

/// Copy failed records to a dead-letter topic, then acknowledge
#[derive(Debug)]
pub struct DeadLetter {
    topic: Arc<PartitionedTopic>,
}

impl DeadLetter {
    pub fn new(topic: Arc<PartitionedTopic>) -> Self {
        Self { topic }
    }

    pub fn topic(&self) -> &Arc<PartitionedTopic> {
        &self.topic
    }
}

impl CommitStrategy for DeadLetter {
    fn on_failure(&self, record: &Record, error: &LedgerError) -> Disposition {
        let position = self.topic.append(&record.key, record.value.clone());
        warn!(
            source_partition = record.partition,
            source_offset = record.offset,
            dead_letter_topic = %position.topic,
            dead_letter_offset = position.offset,
            code = error.code(),
            "record moved to dead-letter topic"
        );
        Disposition::Acknowledge
    }

    fn name(&self) -> &'static str {
        "dead-letter"
    }
}

/// Name of the dead-letter topic paired with `topic`
pub fn dead_letter_topic_name(topic: &str) -> String {
    format!("{}.dlq", topic)
}

/// Create a commit strategy
///
/// # Arguments
///
/// * `strategy_type` - Which strategy to create
/// * `dead_letters` - Topic failed records are copied to (dead-letter only)
pub fn create_strategy(
    strategy_type: CommitStrategyType,
    dead_letters: &Arc<PartitionedTopic>,
) -> Arc<dyn CommitStrategy> {
    match strategy_type {
        CommitStrategyType::Ack => Arc::new(AcknowledgeOnFailure),
        CommitStrategyType::DeadLetter => Arc::new(DeadLetter::new(Arc::clone(dead_letters))),
    }
}
