//! Consumer client for receiving records from Skylog

use crate::broker::BrokerBackend;
use crate::config::{ConsumerConfig, ConsumerConfigBuilder, OffsetReset};
use crate::error::SkylogClientError;
use crate::metrics::{global_metrics, Timer};
use crate::record::{ConsumeRecord, Offset, TopicName, TopicPartition};
use crate::wakeup::WakeupToken;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

enum Subscription {
    None,
    Topics(Vec<TopicName>),
    Assigned(Vec<TopicPartition>),
}

/// High-level consumer client for receiving records.
///
/// A consumer is driven by one thread of control. The only member designed
/// for concurrent access is the wakeup token ([`Consumer::wakeup`],
/// [`Consumer::wakeup_handle`]); everything else assumes a single polling
/// thread. Stopping a poll loop from another thread goes through wakeup
/// first and never through a cross-thread `close`.
pub struct Consumer {
    config: ConsumerConfig,
    backend: Arc<dyn BrokerBackend>,
    subscription: RwLock<Subscription>,
    positions: RwLock<HashMap<TopicPartition, Offset>>,
    partition_cache: RwLock<HashMap<TopicName, u32>>,
    wakeup: WakeupToken,
    round_cursor: AtomicUsize,
    closed: AtomicBool,
}

impl Consumer {
    /// Create a new consumer with the given configuration and broker.
    pub fn new(
        config: ConsumerConfig,
        backend: Arc<dyn BrokerBackend>,
    ) -> Result<Self, SkylogClientError> {
        config.validate()?;

        info!(
            "Consumer started for brokers {:?} (group: {:?})",
            config.client_config.brokers, config.group_id
        );
        Ok(Self {
            config,
            backend,
            subscription: RwLock::new(Subscription::None),
            positions: RwLock::new(HashMap::new()),
            partition_cache: RwLock::new(HashMap::new()),
            wakeup: WakeupToken::new(),
            round_cursor: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    /// Declare topic-level interest. Partition assignment is resolved from
    /// broker metadata. Mutually exclusive with [`Self::assign`].
    pub fn subscribe<I, S>(&self, topics: I) -> Result<(), SkylogClientError>
    where
        I: IntoIterator<Item = S>,
        S: Into<TopicName>,
    {
        self.ensure_open()?;
        let topics: Vec<TopicName> = topics.into_iter().map(|t| t.into()).collect();
        if topics.is_empty() {
            return Err(SkylogClientError::invalid_config(
                "at least one topic must be specified",
            ));
        }

        let mut subscription = self.subscription.write();
        if matches!(*subscription, Subscription::Assigned(_)) {
            return Err(SkylogClientError::illegal_state(
                "subscribe is not allowed after assign on the same consumer",
            ));
        }
        info!("Subscribed to topics: {:?}", topics);
        *subscription = Subscription::Topics(topics);
        Ok(())
    }

    /// Declare explicit partition-level interest, bypassing group
    /// coordination. Mutually exclusive with [`Self::subscribe`].
    pub fn assign(&self, partitions: Vec<TopicPartition>) -> Result<(), SkylogClientError> {
        self.ensure_open()?;
        if partitions.is_empty() {
            return Err(SkylogClientError::invalid_config(
                "at least one partition must be specified",
            ));
        }

        let mut subscription = self.subscription.write();
        if matches!(*subscription, Subscription::Topics(_)) {
            return Err(SkylogClientError::illegal_state(
                "assign is not allowed after subscribe on the same consumer",
            ));
        }
        info!("Assigned partitions: {:?}", partitions);
        *subscription = Subscription::Assigned(partitions);
        Ok(())
    }

    /// Reposition the next read point for an assigned partition.
    ///
    /// Valid only after [`Self::assign`], and only for one of the assigned
    /// partitions. Seeking past the log end is allowed: polls return
    /// nothing until records arrive at or after that offset.
    pub fn seek(&self, tp: &TopicPartition, offset: Offset) -> Result<(), SkylogClientError> {
        self.ensure_open()?;

        let subscription = self.subscription.read();
        match &*subscription {
            Subscription::Assigned(partitions) if partitions.contains(tp) => {
                debug!("Seeking {} to offset {}", tp, offset);
                self.positions.write().insert(tp.clone(), offset);
                Ok(())
            }
            Subscription::Assigned(_) => Err(SkylogClientError::illegal_state(format!(
                "cannot seek {}: partition is not assigned to this consumer",
                tp
            ))),
            _ => Err(SkylogClientError::illegal_state(
                "seek requires a prior assign",
            )),
        }
    }

    /// Fetch newly available records, blocking up to `timeout`.
    ///
    /// Every live partition is fetched once per round before anything is
    /// returned, so a busy partition cannot starve the others; the round's
    /// starting partition rotates between rounds. The first non-empty round
    /// ends the poll early. Once the deadline passes no new fetch is
    /// initiated, but a fetch already in flight is allowed to finish.
    ///
    /// Transient broker failures are retried within the timeout and
    /// surface as an empty result, never as an error. A pending wakeup,
    /// even one issued before the first poll, makes this return
    /// [`SkylogClientError::Wakeup`] promptly.
    pub async fn poll(
        &self,
        timeout: Duration,
    ) -> Result<Vec<ConsumeRecord>, SkylogClientError> {
        self.ensure_open()?;
        if self.wakeup.take() {
            debug!("Poll interrupted by pending wakeup");
            global_metrics().record_wakeup();
            return Err(SkylogClientError::Wakeup);
        }

        let assignment = self.resolve_assignment().await?;
        self.ensure_positions(&assignment).await?;

        let timer = Timer::start();
        let deadline = Instant::now() + timeout;

        loop {
            let batch = self.fetch_round(&assignment, deadline).await?;

            if !batch.is_empty() {
                self.advance_positions(&batch);
                let bytes: u64 = batch.iter().map(|r| r.value.len() as u64).sum();
                global_metrics().record_consume(batch.len() as u64, bytes, timer.elapsed());
                debug!("Poll returning {} records", batch.len());
                return Ok(batch);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }

            let backoff = self
                .config
                .fetch_config
                .empty_round_backoff
                .min(deadline - now);
            tokio::select! {
                _ = self.wakeup.woken() => {
                    self.wakeup.take();
                    debug!("Poll interrupted by wakeup");
                    global_metrics().record_wakeup();
                    return Err(SkylogClientError::Wakeup);
                }
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    /// One fair fetch round: each partition contributes at most once, in
    /// rotated order. Returns the records collected this round.
    async fn fetch_round(
        &self,
        assignment: &[TopicPartition],
        deadline: Instant,
    ) -> Result<Vec<ConsumeRecord>, SkylogClientError> {
        if assignment.is_empty() {
            return Ok(Vec::new());
        }

        let mut batch: Vec<ConsumeRecord> = Vec::new();
        let rotation = self.round_cursor.fetch_add(1, Ordering::Relaxed) % assignment.len();

        for i in 0..assignment.len() {
            if self.wakeup.is_pending() {
                self.wakeup.take();
                global_metrics().record_wakeup();
                return Err(SkylogClientError::Wakeup);
            }
            if Instant::now() >= deadline {
                break;
            }
            let remaining = self.config.max_poll_records - batch.len();
            if remaining == 0 {
                break;
            }

            let tp = &assignment[(rotation + i) % assignment.len()];
            let position = {
                let positions = self.positions.read();
                positions.get(tp).copied().unwrap_or(0)
            };
            let limit = remaining.min(self.config.fetch_config.max_partition_records);

            match self.backend.fetch(tp, position, limit).await {
                Ok(records) => batch.extend(records),
                Err(e) if e.is_retryable() => {
                    // The partition simply contributes nothing this round;
                    // later rounds within the timeout retry it.
                    warn!("Transient fetch failure on {}: {}", tp, e);
                }
                Err(e) => {
                    global_metrics().record_consume_error();
                    return Err(e);
                }
            }
        }

        Ok(batch)
    }

    async fn resolve_assignment(&self) -> Result<Vec<TopicPartition>, SkylogClientError> {
        let topics = {
            let subscription = self.subscription.read();
            match &*subscription {
                Subscription::None => {
                    return Err(SkylogClientError::illegal_state(
                        "consumer is not subscribed to any topics or assigned any partitions",
                    ))
                }
                Subscription::Assigned(partitions) => return Ok(partitions.clone()),
                Subscription::Topics(topics) => topics.clone(),
            }
        };

        // Single-member-group case: a subscribed consumer reads every
        // partition of each topic. Group coordination proper lives behind
        // the broker seam.
        let mut assignment = Vec::new();
        for topic in &topics {
            let count = match self.cached_partition_count(topic).await {
                Ok(count) => count,
                Err(e) if e.is_retryable() => {
                    warn!("Transient metadata failure for '{}': {}", topic, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            for partition in 0..count {
                assignment.push(TopicPartition::new(topic.clone(), partition));
            }
        }
        Ok(assignment)
    }

    async fn cached_partition_count(&self, topic: &str) -> Result<u32, SkylogClientError> {
        if let Some(count) = self.partition_cache.read().get(topic) {
            return Ok(*count);
        }
        let count = self.backend.partition_count(topic).await?;
        self.partition_cache
            .write()
            .insert(topic.to_string(), count);
        Ok(count)
    }

    /// Initialize missing positions per the offset reset policy.
    async fn ensure_positions(
        &self,
        assignment: &[TopicPartition],
    ) -> Result<(), SkylogClientError> {
        let missing: Vec<TopicPartition> = {
            let positions = self.positions.read();
            assignment
                .iter()
                .filter(|tp| !positions.contains_key(*tp))
                .cloned()
                .collect()
        };

        for tp in missing {
            let position = match self.config.auto_offset_reset {
                OffsetReset::Earliest => self.backend.earliest_offset(&tp).await?,
                OffsetReset::Latest => self.backend.latest_offset(&tp).await?,
                OffsetReset::None => {
                    return Err(SkylogClientError::NoOffsetForPartition {
                        topic: tp.topic.clone(),
                        partition: tp.partition,
                    })
                }
            };
            debug!("Initialized position of {} to {}", tp, position);
            self.positions.write().insert(tp, position);
        }
        Ok(())
    }

    /// Advance positions over returned records only. Positions never move
    /// backward here, so offsets observed across polls are monotonically
    /// non-decreasing per partition.
    fn advance_positions(&self, batch: &[ConsumeRecord]) {
        let mut positions = self.positions.write();
        for record in batch {
            let tp = TopicPartition::new(record.topic.clone(), record.partition);
            let next = record.offset + 1;
            positions
                .entry(tp)
                .and_modify(|p| *p = (*p).max(next))
                .or_insert(next);
        }
    }

    /// Interrupt a blocked or future `poll` from any thread.
    pub fn wakeup(&self) {
        self.wakeup.wake();
    }

    /// A cloneable wakeup token for threads that do not own the consumer.
    pub fn wakeup_handle(&self) -> WakeupToken {
        self.wakeup.clone()
    }

    /// Release the consumer. Idempotent; later operations fail with a
    /// closed-client error. Does not interrupt a concurrent `poll`: issue
    /// a wakeup first and close from the polling thread.
    pub fn close(&self) -> Result<(), SkylogClientError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.positions.write().clear();
        info!("Consumer closed");
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), SkylogClientError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SkylogClientError::ClientClosed);
        }
        Ok(())
    }
}

/// Builder for Consumer
pub struct ConsumerBuilder {
    config: ConsumerConfigBuilder,
    topics: Vec<TopicName>,
    backend: Option<Arc<dyn BrokerBackend>>,
}

impl ConsumerBuilder {
    /// Create a new consumer builder
    pub fn new() -> Self {
        Self {
            config: ConsumerConfigBuilder::new(),
            topics: Vec::new(),
            backend: None,
        }
    }

    /// Set the broker addresses
    pub fn brokers<I, S>(mut self, brokers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config = self.config.brokers(brokers);
        self
    }

    /// Set the consumer group ID
    pub fn group_id<S: Into<String>>(mut self, group_id: S) -> Self {
        self.config = self.config.group_id(group_id);
        self
    }

    /// Subscribe to these topics at build time
    pub fn topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TopicName>,
    {
        self.topics = topics.into_iter().map(|t| t.into()).collect();
        self
    }

    /// Set the offset reset policy
    pub fn auto_offset_reset(mut self, reset: OffsetReset) -> Self {
        self.config = self.config.auto_offset_reset(reset);
        self
    }

    /// Set the maximum records returned per poll
    pub fn max_poll_records(mut self, max_records: usize) -> Self {
        self.config = self.config.max_poll_records(max_records);
        self
    }

    /// Set the broker backend to fetch through
    pub fn backend(mut self, backend: Arc<dyn BrokerBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Build the consumer
    pub fn build(self) -> Result<Consumer, SkylogClientError> {
        let backend = self.backend.ok_or_else(|| {
            SkylogClientError::invalid_config("a broker backend is required to build a consumer")
        })?;
        let consumer = Consumer::new(self.config.build(), backend)?;
        if !self.topics.is_empty() {
            consumer.subscribe(self.topics)?;
        }
        Ok(consumer)
    }
}

impl Default for ConsumerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::InMemoryBroker;
    use crate::record::ProduceRecord;

    fn in_memory(partitions: u32) -> Arc<InMemoryBroker> {
        Arc::new(InMemoryBroker::with_default_partitions(partitions))
    }

    fn test_consumer(backend: Arc<InMemoryBroker>, reset: OffsetReset) -> Consumer {
        ConsumerBuilder::new()
            .brokers(vec!["localhost:9092"])
            .group_id("test-group")
            .auto_offset_reset(reset)
            .backend(backend)
            .build()
            .unwrap()
    }

    async fn seed(backend: &InMemoryBroker, topic: &str, partition: u32, count: usize) {
        let records = (0..count)
            .map(|i| ProduceRecord::new(topic, format!("msg-{}", i)))
            .collect();
        backend.produce(topic, partition, records).await.unwrap();
    }

    #[tokio::test]
    async fn test_poll_requires_subscription() {
        let consumer = test_consumer(in_memory(1), OffsetReset::Earliest);
        let err = consumer.poll(Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, SkylogClientError::IllegalState { .. }));
    }

    #[tokio::test]
    async fn test_subscribe_then_assign_is_illegal() {
        let consumer = test_consumer(in_memory(1), OffsetReset::Earliest);
        consumer.subscribe(vec!["first_topic"]).unwrap();
        let err = consumer
            .assign(vec![TopicPartition::new("first_topic", 0)])
            .unwrap_err();
        assert!(matches!(err, SkylogClientError::IllegalState { .. }));
    }

    #[tokio::test]
    async fn test_assign_then_subscribe_is_illegal() {
        let consumer = test_consumer(in_memory(1), OffsetReset::Earliest);
        consumer
            .assign(vec![TopicPartition::new("first_topic", 0)])
            .unwrap();
        let err = consumer.subscribe(vec!["first_topic"]).unwrap_err();
        assert!(matches!(err, SkylogClientError::IllegalState { .. }));
    }

    #[tokio::test]
    async fn test_seek_requires_assign() {
        let consumer = test_consumer(in_memory(1), OffsetReset::Earliest);
        let err = consumer
            .seek(&TopicPartition::new("first_topic", 0), 15)
            .unwrap_err();
        assert!(matches!(err, SkylogClientError::IllegalState { .. }));

        consumer.subscribe(vec!["first_topic"]).unwrap();
        let err = consumer
            .seek(&TopicPartition::new("first_topic", 0), 15)
            .unwrap_err();
        assert!(matches!(err, SkylogClientError::IllegalState { .. }));
    }

    #[tokio::test]
    async fn test_seek_rejects_unassigned_partition() {
        let consumer = test_consumer(in_memory(2), OffsetReset::Earliest);
        consumer
            .assign(vec![TopicPartition::new("first_topic", 0)])
            .unwrap();
        let err = consumer
            .seek(&TopicPartition::new("first_topic", 1), 0)
            .unwrap_err();
        assert!(matches!(err, SkylogClientError::IllegalState { .. }));
    }

    #[tokio::test]
    async fn test_subscribe_poll_returns_records_in_offset_order() {
        let backend = in_memory(1);
        seed(&backend, "first_topic", 0, 5).await;

        let consumer = test_consumer(backend, OffsetReset::Earliest);
        consumer.subscribe(vec!["first_topic"]).unwrap();

        let records = consumer.poll(Duration::from_millis(200)).await.unwrap();
        let offsets: Vec<Offset> = records.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_latest_reset_skips_existing_records() {
        let backend = in_memory(1);
        seed(&backend, "first_topic", 0, 5).await;

        let consumer = test_consumer(backend.clone(), OffsetReset::Latest);
        consumer.subscribe(vec!["first_topic"]).unwrap();

        // Nothing yet: the position starts at the log end
        let records = consumer.poll(Duration::from_millis(50)).await.unwrap();
        assert!(records.is_empty());

        seed(&backend, "first_topic", 0, 2).await;
        let records = consumer.poll(Duration::from_millis(200)).await.unwrap();
        let offsets: Vec<Offset> = records.iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![5, 6]);
    }

    #[tokio::test]
    async fn test_none_reset_without_position_fails() {
        let backend = in_memory(1);
        seed(&backend, "first_topic", 0, 5).await;

        let consumer = test_consumer(backend, OffsetReset::None);
        consumer.subscribe(vec!["first_topic"]).unwrap();

        let err = consumer.poll(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(
            err,
            SkylogClientError::NoOffsetForPartition { .. }
        ));
    }

    #[tokio::test]
    async fn test_max_poll_records_caps_batch() {
        let backend = in_memory(1);
        seed(&backend, "first_topic", 0, 20).await;

        let consumer = ConsumerBuilder::new()
            .brokers(vec!["localhost:9092"])
            .auto_offset_reset(OffsetReset::Earliest)
            .max_poll_records(7)
            .backend(backend)
            .build()
            .unwrap();
        consumer.subscribe(vec!["first_topic"]).unwrap();

        let first = consumer.poll(Duration::from_millis(200)).await.unwrap();
        assert_eq!(first.len(), 7);
        let second = consumer.poll(Duration::from_millis(200)).await.unwrap();
        assert_eq!(second[0].offset, 7);
    }

    #[tokio::test]
    async fn test_fair_round_covers_all_partitions() {
        let backend = in_memory(3);
        for partition in 0..3 {
            seed(&backend, "first_topic", partition, 4).await;
        }

        let consumer = test_consumer(backend, OffsetReset::Earliest);
        consumer.subscribe(vec!["first_topic"]).unwrap();

        let records = consumer.poll(Duration::from_millis(200)).await.unwrap();
        // One round picks up every partition before returning
        for partition in 0..3 {
            assert_eq!(
                records.iter().filter(|r| r.partition == partition).count(),
                4,
                "partition {} missing from the round",
                partition
            );
        }
    }

    #[tokio::test]
    async fn test_wakeup_before_poll_interrupts_immediately() {
        let consumer = test_consumer(in_memory(1), OffsetReset::Earliest);
        consumer.subscribe(vec!["first_topic"]).unwrap();
        consumer.wakeup();

        let err = consumer.poll(Duration::from_secs(30)).await.unwrap_err();
        assert!(err.is_wakeup());

        // The pending flag was consumed; the next poll proceeds normally
        let records = consumer.poll(Duration::from_millis(20)).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_poll_after_close_fails() {
        let consumer = test_consumer(in_memory(1), OffsetReset::Earliest);
        consumer.subscribe(vec!["first_topic"]).unwrap();
        consumer.close().unwrap();
        consumer.close().unwrap(); // idempotent

        let err = consumer.poll(Duration::from_millis(10)).await.unwrap_err();
        assert!(matches!(err, SkylogClientError::ClientClosed));
    }
}
