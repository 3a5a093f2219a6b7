//! Record types exchanged between clients and the broker

use bytes::Bytes;
use std::collections::HashMap;
use std::time::SystemTime;

pub type TopicName = String;
pub type PartitionId = u32;
pub type Offset = u64;

/// High-level record for producing messages
#[derive(Debug, Clone)]
pub struct ProduceRecord {
    pub topic: TopicName,
    pub partition: Option<PartitionId>, // None for auto-assignment
    pub key: Option<Bytes>,
    pub value: Bytes,
    pub headers: HashMap<String, Bytes>,
    pub timestamp: Option<u64>,
}

impl ProduceRecord {
    /// Create a new record builder
    pub fn builder() -> ProduceRecordBuilder {
        ProduceRecordBuilder::new()
    }

    /// Create a simple record with topic and value
    pub fn new<T: Into<TopicName>, V: Into<Bytes>>(topic: T, value: V) -> Self {
        Self {
            topic: topic.into(),
            partition: None,
            key: None,
            value: value.into(),
            headers: HashMap::new(),
            timestamp: None,
        }
    }

    /// Create a record with topic, key, and value
    pub fn with_key<T: Into<TopicName>, K: Into<Bytes>, V: Into<Bytes>>(
        topic: T,
        key: K,
        value: V,
    ) -> Self {
        Self {
            topic: topic.into(),
            partition: None,
            key: Some(key.into()),
            value: value.into(),
            headers: HashMap::new(),
            timestamp: None,
        }
    }
}

/// Builder for ProduceRecord
#[derive(Debug, Default)]
pub struct ProduceRecordBuilder {
    topic: Option<TopicName>,
    partition: Option<PartitionId>,
    key: Option<Bytes>,
    value: Option<Bytes>,
    headers: HashMap<String, Bytes>,
    timestamp: Option<u64>,
}

impl ProduceRecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn topic<T: Into<TopicName>>(mut self, topic: T) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn partition(mut self, partition: PartitionId) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn key<K: Into<Bytes>>(mut self, key: K) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn value<V: Into<Bytes>>(mut self, value: V) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn header<K: Into<String>, V: Into<Bytes>>(mut self, key: K, value: V) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn build(self) -> ProduceRecord {
        let topic = self.topic.expect("Topic is required");
        let value = self.value.expect("Value is required");

        ProduceRecord {
            topic,
            partition: self.partition,
            key: self.key,
            value,
            headers: self.headers,
            timestamp: self.timestamp,
        }
    }
}

/// High-level record for consuming messages
#[derive(Debug, Clone)]
pub struct ConsumeRecord {
    pub topic: TopicName,
    pub partition: PartitionId,
    pub offset: Offset,
    pub key: Option<Bytes>,
    pub value: Bytes,
    pub headers: HashMap<String, Bytes>,
    pub timestamp: u64,
}

/// Metadata reported back for a successfully delivered record.
///
/// Only the delivery path constructs this; callers never do.
#[derive(Debug, Clone)]
pub struct RecordMetadata {
    pub topic: TopicName,
    pub partition: PartitionId,
    pub offset: Offset,
    pub timestamp: u64,
}

/// Topic partition identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPartition {
    pub topic: TopicName,
    pub partition: PartitionId,
}

impl TopicPartition {
    pub fn new<T: Into<TopicName>>(topic: T, partition: PartitionId) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl std::fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.topic, self.partition)
    }
}

pub(crate) fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}
