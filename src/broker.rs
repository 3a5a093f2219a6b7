//! Broker endpoint abstraction and the in-memory implementation
//!
//! The client core never speaks a wire protocol directly; it reaches the
//! broker through the [`BrokerBackend`] trait. [`InMemoryBroker`] implements
//! the same contract over process-local partition logs, which is what the
//! demos and the test suite run against.

use crate::error::SkylogClientError;
use crate::record::{
    current_timestamp_ms, ConsumeRecord, Offset, PartitionId, ProduceRecord, TopicName,
    TopicPartition,
};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Operations the client core requires from a broker.
///
/// Implementations must supply durable, offset-ordered per-partition logs:
/// offsets are assigned contiguously from zero at append time, and a fetch
/// at offset `n` returns records in ascending offset order starting at `n`.
#[async_trait]
pub trait BrokerBackend: Send + Sync {
    /// Append a batch to one partition, returning the base offset assigned
    /// to the first record.
    async fn produce(
        &self,
        topic: &str,
        partition: PartitionId,
        records: Vec<ProduceRecord>,
    ) -> Result<Offset, SkylogClientError>;

    /// Read up to `max_records` records from `offset` onward.
    async fn fetch(
        &self,
        tp: &TopicPartition,
        offset: Offset,
        max_records: usize,
    ) -> Result<Vec<ConsumeRecord>, SkylogClientError>;

    /// Number of partitions for a topic.
    async fn partition_count(&self, topic: &str) -> Result<u32, SkylogClientError>;

    /// First offset still present in the partition log.
    async fn earliest_offset(&self, tp: &TopicPartition) -> Result<Offset, SkylogClientError>;

    /// Offset that will be assigned to the next appended record.
    async fn latest_offset(&self, tp: &TopicPartition) -> Result<Offset, SkylogClientError>;

    /// Create a topic with an explicit partition count. No-op if it exists.
    async fn create_topic(&self, topic: &str, partitions: u32) -> Result<(), SkylogClientError>;

    /// Names of all known topics.
    async fn topic_names(&self) -> Result<Vec<TopicName>, SkylogClientError>;
}

#[derive(Debug, Clone)]
struct StoredRecord {
    key: Option<Bytes>,
    value: Bytes,
    headers: HashMap<String, Bytes>,
    timestamp: u64,
}

/// Partition log with an atomic offset counter for lock-free offset reads
#[derive(Debug)]
struct PartitionLog {
    records: RwLock<Vec<(Offset, StoredRecord)>>,
    next_offset: AtomicU64,
}

impl PartitionLog {
    fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            next_offset: AtomicU64::new(0),
        }
    }
}

/// In-memory broker holding partitioned, offset-ordered logs.
///
/// Partition data is keyed by `(topic, partition)` in a `DashMap` so
/// different partitions never contend on one lock. Topics auto-create on
/// first use with `default_partitions` partitions.
pub struct InMemoryBroker {
    partitions: DashMap<(TopicName, PartitionId), Arc<PartitionLog>>,
    topic_partitions: DashMap<TopicName, u32>,
    default_partitions: u32,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::with_default_partitions(1)
    }

    pub fn with_default_partitions(default_partitions: u32) -> Self {
        Self {
            partitions: DashMap::new(),
            topic_partitions: DashMap::new(),
            default_partitions: default_partitions.max(1),
        }
    }

    fn ensure_topic(&self, topic: &str) -> u32 {
        *self
            .topic_partitions
            .entry(topic.to_string())
            .or_insert(self.default_partitions)
    }

    fn log(
        &self,
        topic: &str,
        partition: PartitionId,
    ) -> Result<Arc<PartitionLog>, SkylogClientError> {
        let count = self.ensure_topic(topic);
        if partition >= count {
            return Err(SkylogClientError::PartitionNotFound {
                topic: topic.to_string(),
                partition,
            });
        }
        Ok(self
            .partitions
            .entry((topic.to_string(), partition))
            .or_insert_with(|| Arc::new(PartitionLog::new()))
            .clone())
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerBackend for InMemoryBroker {
    async fn produce(
        &self,
        topic: &str,
        partition: PartitionId,
        records: Vec<ProduceRecord>,
    ) -> Result<Offset, SkylogClientError> {
        let log = self.log(topic, partition)?;
        let mut stored = log.records.write();

        let base_offset = log.next_offset.fetch_add(records.len() as u64, Ordering::SeqCst);
        for (i, record) in records.into_iter().enumerate() {
            stored.push((
                base_offset + i as u64,
                StoredRecord {
                    key: record.key,
                    value: record.value,
                    headers: record.headers,
                    timestamp: record.timestamp.unwrap_or_else(current_timestamp_ms),
                },
            ));
        }

        debug!(
            "Appended batch at {}:{} base_offset={}",
            topic, partition, base_offset
        );
        Ok(base_offset)
    }

    async fn fetch(
        &self,
        tp: &TopicPartition,
        offset: Offset,
        max_records: usize,
    ) -> Result<Vec<ConsumeRecord>, SkylogClientError> {
        let log = self.log(&tp.topic, tp.partition)?;
        let records = log.records.read();

        let start = match records.binary_search_by_key(&offset, |(o, _)| *o) {
            Ok(i) => i,
            Err(i) => i,
        };

        Ok(records[start..]
            .iter()
            .take(max_records)
            .map(|(offset, stored)| ConsumeRecord {
                topic: tp.topic.clone(),
                partition: tp.partition,
                offset: *offset,
                key: stored.key.clone(),
                value: stored.value.clone(),
                headers: stored.headers.clone(),
                timestamp: stored.timestamp,
            })
            .collect())
    }

    async fn partition_count(&self, topic: &str) -> Result<u32, SkylogClientError> {
        Ok(self.ensure_topic(topic))
    }

    async fn earliest_offset(&self, tp: &TopicPartition) -> Result<Offset, SkylogClientError> {
        let log = self.log(&tp.topic, tp.partition)?;
        let records = log.records.read();
        Ok(records.first().map(|(o, _)| *o).unwrap_or(0))
    }

    async fn latest_offset(&self, tp: &TopicPartition) -> Result<Offset, SkylogClientError> {
        let log = self.log(&tp.topic, tp.partition)?;
        Ok(log.next_offset.load(Ordering::SeqCst))
    }

    async fn create_topic(&self, topic: &str, partitions: u32) -> Result<(), SkylogClientError> {
        if partitions == 0 {
            return Err(SkylogClientError::invalid_config(
                "partition count must be greater than zero",
            ));
        }
        self.topic_partitions
            .entry(topic.to_string())
            .or_insert(partitions);
        Ok(())
    }

    async fn topic_names(&self) -> Result<Vec<TopicName>, SkylogClientError> {
        Ok(self
            .topic_partitions
            .iter()
            .map(|entry| entry.key().clone())
            .collect())
    }
}
