//! In-process partitioned log
//!
//! A `PartitionedTopic` is an append-only log split into a fixed number of
//! partitions. Every consumer group tracks its own committed offset per
//! partition, so independent groups each see every record once.
//!
//! # Retention
//!
//! A group that calls [`PartitionedTopic::register_group`] holds back
//! retention: [`PartitionedTopic::compact`] drops the records every
//! registered group has committed, and nothing else. A topic without
//! registered groups (such as a dead-letter topic) keeps every record.
//! Offsets stay stable across compaction.
//!
//! # Partitioning
//!
//! The record key selects the partition through a stable FNV-1a hash, so all
//! records with the same key (the card number) land in the same partition in
//! publish order.
//!
//! # Thread Safety
//!
//! Each partition is guarded by its own mutex, held only for one append or
//! one read. Committed offsets live in a `DashMap`. Appends are announced on
//! a `watch` channel so idle consumers can wait without polling.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use dashmap::{DashMap, DashSet};
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

/// A record stored in a partition
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub partition: usize,
    pub offset: u64,

    /// Routing key (card number)
    pub key: String,

    /// Serialized payload
    pub value: String,
}

/// Where a record was appended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordPosition {
    pub topic: String,
    pub partition: usize,
    pub offset: u64,
}

#[derive(Debug, Default)]
struct Partition {
    /// Offset of the first retained record
    base: u64,
    records: VecDeque<Record>,
}

impl Partition {
    fn end(&self) -> u64 {
        self.base + self.records.len() as u64
    }
}

/// Append-only partitioned log with per-group committed offsets
#[derive(Debug)]
pub struct PartitionedTopic {
    name: String,
    partitions: Vec<Mutex<Partition>>,

    /// Next offset to consume, by (group, partition)
    committed: DashMap<(String, usize), u64>,

    /// Groups whose offsets bound retention
    groups: DashSet<String>,

    /// Number of records appended so far
    appended: watch::Sender<u64>,
}

impl PartitionedTopic {
    /// Create an empty topic
    ///
    /// A partition count of zero is raised to one.
    pub fn new(name: impl Into<String>, partitions: usize) -> Self {
        let (appended, _) = watch::channel(0);
        Self {
            name: name.into(),
            partitions: (0..partitions.max(1))
                .map(|_| Mutex::new(Partition::default()))
                .collect(),
            committed: DashMap::new(),
            groups: DashSet::new(),
            appended,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Partition a key is routed to
    pub fn partition_for(&self, key: &str) -> usize {
        (fnv1a(key.as_bytes()) % self.partitions.len() as u64) as usize
    }

    /// Append a record to the partition selected by `key`
    pub fn append(&self, key: &str, value: String) -> RecordPosition {
        let partition = self.partition_for(key);
        let offset = {
            let mut log = self.partition(partition);
            let offset = log.end();
            log.records.push_back(Record {
                partition,
                offset,
                key: key.to_string(),
                value,
            });
            offset
        };
        self.appended.send_modify(|count| *count += 1);

        RecordPosition {
            topic: self.name.clone(),
            partition,
            offset,
        }
    }

    /// Record at `offset`, if it has been appended and is still retained
    pub fn read(&self, partition: usize, offset: u64) -> Option<Record> {
        if partition >= self.partitions.len() {
            return None;
        }
        let log = self.partition(partition);
        let index = offset.checked_sub(log.base)?;
        log.records.get(index as usize).cloned()
    }

    /// Offset the next appended record of `partition` will get
    pub fn end_offset(&self, partition: usize) -> u64 {
        if partition >= self.partitions.len() {
            return 0;
        }
        self.partition(partition).end()
    }

    /// Offset of the oldest retained record of `partition`
    pub fn start_offset(&self, partition: usize) -> u64 {
        if partition >= self.partitions.len() {
            return 0;
        }
        self.partition(partition).base
    }

    /// Every retained record of every partition, partition by partition
    pub fn records(&self) -> Vec<Record> {
        (0..self.partitions.len())
            .flat_map(|partition| self.partition(partition).records.clone())
            .collect()
    }

    /// Make `group` hold back retention
    ///
    /// A group new to a partition starts at its oldest retained record.
    pub fn register_group(&self, group: &str) {
        self.groups.insert(group.to_string());
        for partition in 0..self.partitions.len() {
            let start = self.start_offset(partition);
            self.committed
                .entry((group.to_string(), partition))
                .or_insert(start);
        }
    }

    /// Drop the records of `partition` that every registered group committed
    ///
    /// # Returns
    ///
    /// The number of records dropped.
    pub fn compact(&self, partition: usize) -> usize {
        if partition >= self.partitions.len() {
            return 0;
        }
        let groups: Vec<String> = self.groups.iter().map(|group| group.key().clone()).collect();
        let Some(floor) = groups
            .iter()
            .map(|group| self.committed(group, partition))
            .min()
        else {
            return 0;
        };

        let mut log = self.partition(partition);
        let mut dropped = 0;
        while log.base < floor && log.records.pop_front().is_some() {
            log.base += 1;
            dropped += 1;
        }
        if dropped > 0 {
            debug!(topic = %self.name, partition, dropped, start = log.base, "compacted partition");
        }
        dropped
    }

    /// Next offset `group` will consume from `partition`
    pub fn committed(&self, group: &str, partition: usize) -> u64 {
        self.committed
            .get(&(group.to_string(), partition))
            .map(|entry| *entry.value())
            .unwrap_or(0)
    }

    /// Move the committed offset of `group` forward to `next_offset`
    ///
    /// Offsets never move backwards.
    pub fn commit(&self, group: &str, partition: usize, next_offset: u64) {
        let mut entry = self
            .committed
            .entry((group.to_string(), partition))
            .or_insert(0);
        if next_offset > *entry {
            *entry = next_offset;
        }
    }

    /// Records appended but not yet committed by `group`, over all partitions
    pub fn lag(&self, group: &str) -> u64 {
        (0..self.partitions.len())
            .map(|partition| {
                self.end_offset(partition)
                    .saturating_sub(self.committed(group, partition))
            })
            .sum()
    }

    /// Receiver notified after every append
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.appended.subscribe()
    }

    fn partition(&self, partition: usize) -> MutexGuard<'_, Partition> {
        // A poisoned partition still holds a consistent log: pushes are atomic
        match self.partitions[partition].lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// 64-bit FNV-1a
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes.iter().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_same_key_same_partition_in_order() {
        let topic = PartitionedTopic::new("card-transactions", 8);
        let positions: Vec<RecordPosition> = (0..5)
            .map(|i| topic.append("4111", format!("payment-{}", i)))
            .collect();

        let partition = topic.partition_for("4111");
        for (i, position) in positions.iter().enumerate() {
            assert_eq!(position.partition, partition);
            assert_eq!(position.offset, i as u64);
            assert_eq!(
                topic.read(partition, i as u64).unwrap().value,
                format!("payment-{}", i)
            );
        }
    }

    #[rstest]
    #[case::empty(b"", 0xcbf2_9ce4_8422_2325)]
    #[case::single(b"a", 0xaf63_dc4c_8601_ec8c)]
    fn test_fnv1a_reference_values(#[case] input: &[u8], #[case] expected: u64) {
        assert_eq!(fnv1a(input), expected);
    }

    #[test]
    fn test_zero_partitions_is_raised_to_one() {
        let topic = PartitionedTopic::new("t", 0);
        assert_eq!(topic.partition_count(), 1);
        assert_eq!(topic.append("k", "v".into()).partition, 0);
    }

    #[test]
    fn test_groups_keep_independent_offsets() {
        let topic = PartitionedTopic::new("t", 1);
        topic.append("k", "a".into());
        topic.append("k", "b".into());

        topic.commit("ledger", 0, 2);
        assert_eq!(topic.lag("ledger"), 0);
        assert_eq!(topic.lag("audit"), 2);
        assert_eq!(topic.committed("audit", 0), 0);
    }

    #[test]
    fn test_commit_never_moves_backwards() {
        let topic = PartitionedTopic::new("t", 1);
        topic.commit("g", 0, 3);
        topic.commit("g", 0, 1);
        assert_eq!(topic.committed("g", 0), 3);
    }

    #[test]
    fn test_read_past_end() {
        let topic = PartitionedTopic::new("t", 2);
        assert!(topic.read(0, 0).is_none());
        assert!(topic.read(7, 0).is_none());
        assert_eq!(topic.end_offset(7), 0);
    }

    #[tokio::test]
    async fn test_append_notifies_subscribers() {
        let topic = PartitionedTopic::new("t", 1);
        let mut receiver = topic.subscribe();

        topic.append("k", "v".into());
        receiver.changed().await.unwrap();
        assert_eq!(*receiver.borrow(), 1);
    }

    #[test]
    fn test_compact_drops_only_what_every_group_committed() {
        let topic = PartitionedTopic::new("t", 1);
        for value in ["a", "b", "c", "d"] {
            topic.append("k", value.into());
        }
        topic.register_group("ledger");
        topic.register_group("audit");

        topic.commit("ledger", 0, 3);
        topic.commit("audit", 0, 1);
        assert_eq!(topic.compact(0), 1);
        assert_eq!(topic.start_offset(0), 1);
        assert!(topic.read(0, 0).is_none());
        assert_eq!(topic.read(0, 1).unwrap().value, "b");

        topic.commit("audit", 0, 4);
        assert_eq!(topic.compact(0), 2);
        assert_eq!(topic.records().len(), 1);
        assert_eq!(topic.read(0, 3).unwrap().value, "d");
        assert_eq!(topic.end_offset(0), 4);
        assert_eq!(topic.lag("ledger"), 1);
        assert_eq!(topic.lag("audit"), 0);
    }

    #[test]
    fn test_offsets_continue_after_compaction() {
        let topic = PartitionedTopic::new("t", 1);
        topic.register_group("g");
        topic.append("k", "a".into());
        topic.append("k", "b".into());
        topic.commit("g", 0, 2);
        assert_eq!(topic.compact(0), 2);

        assert_eq!(topic.append("k", "c".into()).offset, 2);
        assert_eq!(topic.read(0, 2).unwrap().value, "c");
        assert_eq!(topic.lag("g"), 1);
    }

    #[test]
    fn test_compact_without_groups_keeps_everything() {
        let topic = PartitionedTopic::new("t.dlq", 1);
        topic.append("k", "a".into());
        topic.commit("unregistered", 0, 1);

        assert_eq!(topic.compact(0), 0);
        assert_eq!(topic.records().len(), 1);
    }

    #[test]
    fn test_late_group_starts_at_oldest_retained() {
        let topic = PartitionedTopic::new("t", 1);
        topic.register_group("early");
        for value in ["a", "b", "c"] {
            topic.append("k", value.into());
        }
        topic.commit("early", 0, 2);
        topic.compact(0);

        topic.register_group("late");
        assert_eq!(topic.committed("late", 0), 2);
        assert_eq!(topic.read(0, topic.committed("late", 0)).unwrap().value, "c");
    }
}
