//! Consumer pool feeding stream records into the ledger pipeline
//!
//! This module provides the `ConsumerPool`, a fixed-size group of tokio
//! workers sharing one consumer-group identity on a [`PartitionedTopic`].
//!
//! # Design
//!
//! Partitions are assigned to workers round-robin (`partition % workers`), so
//! every partition has exactly one owner inside the pool. A worker reads the
//! record at its committed offset, runs it through the pipeline, commits, and
//! compacts the partition. Records of one card share a partition and
//! therefore one worker, which processes them one at a time in offset order.
//!
//! # Architecture
//!
//! ```text
//! ConsumerPool
//!     ├── Arc<PartitionedTopic>    (records + per-group committed offsets)
//!     ├── Arc<LedgerPipeline>      (shared with the HTTP handlers)
//!     ├── Arc<dyn CommitStrategy>  (decides offsets of failed records)
//!     └── ConsumerConfig           (group id, pool size, back-off)
//! ```
//!
//! # Cancellation
//!
//! Shutdown is cooperative through a `CancellationToken`. A worker checks it
//! between records, so a pipeline invocation that has started always finishes
//! and commits before the worker stops.

use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::commit::{CommitStrategy, Disposition};
use super::topic::{PartitionedTopic, Record};
use crate::core::LedgerPipeline;
use crate::types::{CardPayload, LedgerError, TransactionStatus};

pub const DEFAULT_CONSUMER_GROUP: &str = "ledger-consumer";
pub const DEFAULT_REDELIVER_BACKOFF: Duration = Duration::from_millis(500);

/// Configuration of a consumer pool
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerConfig {
    /// Consumer-group identity the offsets are committed under
    pub group: String,

    /// Number of workers (capped at the partition count)
    pub workers: usize,

    /// Wait before a redelivered record is retried
    pub redeliver_backoff: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            group: DEFAULT_CONSUMER_GROUP.to_string(),
            workers: num_cpus::get(),
            redeliver_backoff: DEFAULT_REDELIVER_BACKOFF,
        }
    }
}

/// Record counters of one worker (or of a whole pool)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Records that produced a transaction
    pub processed: u64,

    /// Of those, transactions that settled as completed
    pub completed: u64,

    /// Of those, transactions that settled as failed
    pub failed: u64,

    /// Records the pipeline rejected
    pub errors: u64,

    /// Times a record was left uncommitted for a retry
    pub redelivered: u64,
}

impl AddAssign for ConsumerStats {
    fn add_assign(&mut self, other: Self) {
        self.processed += other.processed;
        self.completed += other.completed;
        self.failed += other.failed;
        self.errors += other.errors;
        self.redelivered += other.redelivered;
    }
}

/// What a worker did before it stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: usize,
    pub partitions: Vec<usize>,
    pub stats: ConsumerStats,
}

/// Sum the counters of several workers
pub fn total_stats(reports: &[WorkerReport]) -> ConsumerStats {
    let mut total = ConsumerStats::default();
    for report in reports {
        total += report.stats;
    }
    total
}

/// Fixed-size pool of competing consumers
#[derive(Clone)]
pub struct ConsumerPool {
    topic: Arc<PartitionedTopic>,
    pipeline: Arc<LedgerPipeline>,
    strategy: Arc<dyn CommitStrategy>,
    config: ConsumerConfig,
}

impl ConsumerPool {
    /// Create a new ConsumerPool
    ///
    /// # Arguments
    ///
    /// * `topic` - Topic to consume
    /// * `pipeline` - Pipeline every record is fed into
    /// * `strategy` - Commit decision for failed records
    /// * `config` - Group id, pool size and back-off
    pub fn new(
        topic: Arc<PartitionedTopic>,
        pipeline: Arc<LedgerPipeline>,
        strategy: Arc<dyn CommitStrategy>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            topic,
            pipeline,
            strategy,
            config,
        }
    }

    pub fn group(&self) -> &str {
        &self.config.group
    }

    /// Number of workers the pool actually runs
    ///
    /// Workers beyond the partition count would never receive a partition.
    pub fn worker_count(&self) -> usize {
        self.config
            .workers
            .clamp(1, self.topic.partition_count())
    }

    /// Partitions owned by `worker`
    pub fn assignment(&self, worker: usize) -> Vec<usize> {
        let workers = self.worker_count();
        (0..self.topic.partition_count())
            .filter(|partition| partition % workers == worker)
            .collect()
    }

    /// Records not yet committed by the pool's group
    pub fn lag(&self) -> u64 {
        self.topic.lag(&self.config.group)
    }

    /// Start every worker on the current tokio runtime
    pub fn spawn(&self, shutdown: CancellationToken) -> Vec<JoinHandle<WorkerReport>> {
        self.topic.register_group(&self.config.group);
        info!(
            topic = %self.topic.name(),
            group = %self.config.group,
            workers = self.worker_count(),
            strategy = self.strategy.name(),
            "starting consumer pool"
        );

        (0..self.worker_count())
            .map(|id| {
                let worker = Worker {
                    id,
                    partitions: self.assignment(id),
                    pool: self.clone(),
                };
                tokio::spawn(worker.run(shutdown.clone()))
            })
            .collect()
    }

    /// Run the pool until `shutdown` is cancelled and collect the reports
    pub async fn run(&self, shutdown: CancellationToken) -> Vec<WorkerReport> {
        join_workers(self.spawn(shutdown)).await
    }

    /// Wait until the group has committed every appended record
    pub async fn wait_until_drained(&self, poll: Duration) {
        while self.lag() > 0 {
            tokio::time::sleep(poll).await;
        }
    }
}

impl std::fmt::Debug for ConsumerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerPool")
            .field("topic", &self.topic.name())
            .field("strategy", &self.strategy.name())
            .field("config", &self.config)
            .finish()
    }
}

/// Wait for spawned workers and collect their reports
pub async fn join_workers(handles: Vec<JoinHandle<WorkerReport>>) -> Vec<WorkerReport> {
    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(report) => reports.push(report),
            Err(e) => error!(error = %e, "consumer worker panicked"),
        }
    }
    reports
}

/// One worker of the pool, owning a fixed set of partitions
struct Worker {
    id: usize,
    partitions: Vec<usize>,
    pool: ConsumerPool,
}

impl Worker {
    async fn run(self, shutdown: CancellationToken) -> WorkerReport {
        let topic = Arc::clone(&self.pool.topic);
        let group = self.pool.config.group.clone();
        let mut appended = topic.subscribe();
        let mut stats = ConsumerStats::default();

        debug!(worker = self.id, partitions = ?self.partitions, "consumer worker started");

        'consume: loop {
            if shutdown.is_cancelled() {
                break;
            }
            // Mark the current appends as seen before scanning so that an
            // append racing with the scan still wakes us up below
            appended.borrow_and_update();

            let mut progressed = false;
            for &partition in &self.partitions {
                if shutdown.is_cancelled() {
                    break 'consume;
                }
                let offset = topic.committed(&group, partition);
                let Some(record) = topic.read(partition, offset) else {
                    continue;
                };
                progressed = true;

                match self.handle(&record, &mut stats).await {
                    Disposition::Acknowledge => {
                        topic.commit(&group, partition, record.offset + 1);
                        topic.compact(partition);
                    }
                    Disposition::Redeliver => {
                        stats.redelivered += 1;
                        tokio::select! {
                            _ = shutdown.cancelled() => break 'consume,
                            _ = tokio::time::sleep(self.pool.config.redeliver_backoff) => {}
                        }
                    }
                }
            }

            if !progressed {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    changed = appended.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        debug!(worker = self.id, ?stats, "consumer worker stopped");
        WorkerReport {
            worker: self.id,
            partitions: self.partitions,
            stats,
        }
    }

    async fn handle(&self, record: &Record, stats: &mut ConsumerStats) -> Disposition {
        let result = match serde_json::from_str::<CardPayload>(&record.value) {
            Ok(payload) => self.pool.pipeline.process(payload).await,
            Err(e) => Err(LedgerError::from(e)),
        };

        match result {
            Ok(transaction) => {
                stats.processed += 1;
                match transaction.status {
                    TransactionStatus::Completed => stats.completed += 1,
                    _ => stats.failed += 1,
                }
                Disposition::Acknowledge
            }
            Err(e) => {
                stats.errors += 1;
                error!(
                    topic = %self.pool.topic.name(),
                    partition = record.partition,
                    offset = record.offset,
                    key = %record.key,
                    code = e.code(),
                    error = %e,
                    "failed to process record"
                );
                self.pool.strategy.on_failure(record, &e)
            }
        }
    }
}
