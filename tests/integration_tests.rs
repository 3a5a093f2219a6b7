use async_trait::async_trait;
use skylog_client::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Backend wrapper that fails the first `failures` fetches with a
/// retryable error, then delegates to the inner broker.
struct FlakyBackend {
    inner: InMemoryBroker,
    remaining_fetch_failures: AtomicUsize,
}

impl FlakyBackend {
    fn new(failures: usize) -> Self {
        Self {
            inner: InMemoryBroker::new(),
            remaining_fetch_failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl BrokerBackend for FlakyBackend {
    async fn produce(
        &self,
        topic: &str,
        partition: PartitionId,
        records: Vec<ProduceRecord>,
    ) -> std::result::Result<Offset, SkylogClientError> {
        self.inner.produce(topic, partition, records).await
    }

    async fn fetch(
        &self,
        tp: &TopicPartition,
        offset: Offset,
        max_records: usize,
    ) -> std::result::Result<Vec<ConsumeRecord>, SkylogClientError> {
        if self
            .remaining_fetch_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SkylogClientError::connection("broker unavailable"));
        }
        self.inner.fetch(tp, offset, max_records).await
    }

    async fn partition_count(
        &self,
        topic: &str,
    ) -> std::result::Result<u32, SkylogClientError> {
        self.inner.partition_count(topic).await
    }

    async fn earliest_offset(
        &self,
        tp: &TopicPartition,
    ) -> std::result::Result<Offset, SkylogClientError> {
        self.inner.earliest_offset(tp).await
    }

    async fn latest_offset(
        &self,
        tp: &TopicPartition,
    ) -> std::result::Result<Offset, SkylogClientError> {
        self.inner.latest_offset(tp).await
    }

    async fn create_topic(
        &self,
        topic: &str,
        partitions: u32,
    ) -> std::result::Result<(), SkylogClientError> {
        self.inner.create_topic(topic, partitions).await
    }

    async fn topic_names(&self) -> std::result::Result<Vec<TopicName>, SkylogClientError> {
        self.inner.topic_names().await
    }
}

#[tokio::test]
async fn test_keyed_sends_complete_with_increasing_offsets() {
    let client = SkylogClient::in_memory_with_partitions(3);
    let producer = client.producer().build().unwrap();

    let completions: Arc<Mutex<Vec<RecordMetadata>>> = Arc::new(Mutex::new(Vec::new()));
    for i in 0..10 {
        let record = ProduceRecord::with_key(
            "first_topic",
            format!("Id_{}", i),
            format!("Hello World! ({})", i),
        );
        let completions = completions.clone();
        producer
            .send_with_callback(record, move |result| {
                completions.lock().unwrap().push(result.unwrap());
            })
            .unwrap();
    }

    producer.flush().await.unwrap();

    // Every callback fired exactly once before flush returned
    let completions = completions.lock().unwrap();
    assert_eq!(completions.len(), 10);

    // Offsets are strictly increasing per partition, in submission order
    let mut last_offset_per_partition: HashMap<PartitionId, Offset> = HashMap::new();
    for metadata in completions.iter() {
        assert_eq!(metadata.topic, "first_topic");
        assert!(metadata.partition < 3);
        if let Some(last) = last_offset_per_partition.get(&metadata.partition) {
            assert!(
                metadata.offset > *last,
                "offset {} not greater than {} on partition {}",
                metadata.offset,
                last,
                metadata.partition
            );
        }
        last_offset_per_partition.insert(metadata.partition, metadata.offset);
    }

    producer.close().await.unwrap();
}

#[tokio::test]
async fn test_same_key_always_maps_to_same_partition() {
    let client = SkylogClient::in_memory_with_partitions(5);
    let producer = client.producer().build().unwrap();

    let mut partitions = Vec::new();
    for _ in 0..4 {
        let metadata = producer
            .send(ProduceRecord::with_key("first_topic", "Id_3", "payload"))
            .unwrap()
            .wait()
            .await
            .unwrap();
        partitions.push(metadata.partition);
    }
    assert!(partitions.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_flush_is_a_completion_barrier() {
    let client = SkylogClient::in_memory();
    let producer = client.producer().build().unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    for i in 0..50 {
        let fired = fired.clone();
        producer
            .send_with_callback(
                ProduceRecord::new("first_topic", format!("msg-{}", i)),
                move |result| {
                    assert!(result.is_ok());
                    fired.fetch_add(1, Ordering::SeqCst);
                },
            )
            .unwrap();
    }

    producer.flush().await.unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 50);

    // Nothing fires late
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 50);
}

#[tokio::test]
async fn test_assign_seek_reads_window_from_offset_15() {
    let client = SkylogClient::in_memory();
    let producer = client.producer().build().unwrap();
    for i in 0..30 {
        producer
            .send(ProduceRecord::new("first_topic", format!("Hello World! ({})", i)))
            .unwrap()
            .wait()
            .await
            .unwrap();
    }
    producer.close().await.unwrap();

    let consumer = client
        .consumer()
        .auto_offset_reset(OffsetReset::Earliest)
        .build()
        .unwrap();

    let tp = TopicPartition::new("first_topic", 0);
    consumer.assign(vec![tp.clone()]).unwrap();
    consumer.seek(&tp, 15).unwrap();

    let mut read = Vec::new();
    while read.len() < 5 {
        let records = consumer.poll(Duration::from_millis(100)).await.unwrap();
        for record in records {
            assert_eq!(record.partition, 0);
            read.push(record.offset);
            if read.len() == 5 {
                break;
            }
        }
    }
    assert_eq!(read, vec![15, 16, 17, 18, 19]);
}

#[tokio::test]
async fn test_assigned_consumer_sees_only_its_partition() {
    let backend = Arc::new(InMemoryBroker::with_default_partitions(3));
    for partition in 0..3 {
        backend
            .produce(
                "first_topic",
                partition,
                (0..6)
                    .map(|i| ProduceRecord::new("first_topic", format!("p{}-{}", partition, i)))
                    .collect(),
            )
            .await
            .unwrap();
    }

    let consumer = ConsumerBuilder::new()
        .brokers(vec!["localhost:9092"])
        .auto_offset_reset(OffsetReset::Earliest)
        .backend(backend)
        .build()
        .unwrap();

    let tp = TopicPartition::new("first_topic", 1);
    consumer.assign(vec![tp.clone()]).unwrap();
    consumer.seek(&tp, 2).unwrap();

    let records = consumer.poll(Duration::from_millis(200)).await.unwrap();
    assert!(!records.is_empty());
    for record in &records {
        assert_eq!(record.partition, 1);
        assert!(record.offset >= 2);
    }
}

#[tokio::test]
async fn test_seek_past_log_end_yields_nothing_until_data_arrives() {
    let client = SkylogClient::in_memory();
    let producer = client.producer().build().unwrap();
    for i in 0..3 {
        producer
            .send(ProduceRecord::new("first_topic", format!("msg-{}", i)))
            .unwrap()
            .wait()
            .await
            .unwrap();
    }

    let consumer = client
        .consumer()
        .auto_offset_reset(OffsetReset::Earliest)
        .build()
        .unwrap();
    let tp = TopicPartition::new("first_topic", 0);
    consumer.assign(vec![tp.clone()]).unwrap();
    consumer.seek(&tp, 10).unwrap();

    let records = consumer.poll(Duration::from_millis(50)).await.unwrap();
    assert!(records.is_empty());

    // Fill the gap past the seek point; the next poll picks up from 10
    for i in 3..12 {
        producer
            .send(ProduceRecord::new("first_topic", format!("msg-{}", i)))
            .unwrap()
            .wait()
            .await
            .unwrap();
    }
    let records = consumer.poll(Duration::from_millis(200)).await.unwrap();
    let offsets: Vec<Offset> = records.iter().map(|r| r.offset).collect();
    assert_eq!(offsets, vec![10, 11]);
}

#[tokio::test]
async fn test_wakeup_interrupts_blocked_poll_promptly() {
    let client = SkylogClient::in_memory();
    let consumer = client
        .consumer()
        .topics(vec!["first_topic"])
        .auto_offset_reset(OffsetReset::Earliest)
        .build()
        .unwrap();

    let wakeup = consumer.wakeup_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        wakeup.wake();
    });

    let start = Instant::now();
    let err = consumer.poll(Duration::from_secs(30)).await.unwrap_err();
    assert!(err.is_wakeup());
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "wakeup took {:?}, expected a bounded short delay",
        start.elapsed()
    );
}

#[tokio::test]
async fn test_shutdown_latch_releases_waiters_after_worker_cleanup() {
    let client = SkylogClient::in_memory();
    let producer = client.producer().build().unwrap();
    for i in 0..5 {
        producer
            .send(ProduceRecord::new("first_topic", format!("msg-{}", i)))
            .unwrap();
    }
    producer.close().await.unwrap();

    let consumer = client
        .consumer()
        .group_id("my-sixth-application")
        .topics(vec!["first_topic"])
        .auto_offset_reset(OffsetReset::Earliest)
        .build()
        .unwrap();

    let seen = Arc::new(AtomicUsize::new(0));
    let handle = ConsumerWorker::spawn(consumer, Duration::from_millis(50), {
        let seen = seen.clone();
        move |_record| {
            seen.fetch_add(1, Ordering::SeqCst);
        }
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(seen.load(Ordering::SeqCst), 5);

    // Two independent waiters, as a shutdown hook and a main thread would be
    let waiter_a = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.await_terminated().await })
    };
    let waiter_b = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.await_terminated().await })
    };

    handle.shutdown();
    tokio::time::timeout(Duration::from_secs(2), async {
        waiter_a.await.unwrap();
        waiter_b.await.unwrap();
    })
    .await
    .expect("all latch waiters should be released");
    assert!(handle.is_terminated());
}

#[tokio::test]
async fn test_double_close_is_a_noop() {
    let client = SkylogClient::in_memory();

    let producer = client.producer().build().unwrap();
    producer
        .send(ProduceRecord::new("first_topic", "payload"))
        .unwrap();
    producer.close().await.unwrap();
    producer.close().await.unwrap();

    let consumer = client
        .consumer()
        .topics(vec!["first_topic"])
        .build()
        .unwrap();
    consumer.close().unwrap();
    consumer.close().unwrap();
}

#[tokio::test]
async fn test_transient_fetch_exhaustion_returns_empty_not_error() {
    let backend = Arc::new(FlakyBackend::new(usize::MAX));
    backend
        .inner
        .produce("first_topic", 0, vec![ProduceRecord::new("first_topic", "x")])
        .await
        .unwrap();

    let consumer = ConsumerBuilder::new()
        .brokers(vec!["localhost:9092"])
        .topics(vec!["first_topic"])
        .auto_offset_reset(OffsetReset::Earliest)
        .backend(backend)
        .build()
        .unwrap();

    // Every fetch fails, so the budget runs out and the poll is empty
    let records = consumer.poll(Duration::from_millis(100)).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_transient_fetch_recovery_within_budget_yields_records() {
    let backend = Arc::new(FlakyBackend::new(2));
    backend
        .inner
        .produce(
            "first_topic",
            0,
            (0..3)
                .map(|i| ProduceRecord::new("first_topic", format!("msg-{}", i)))
                .collect(),
        )
        .await
        .unwrap();

    let consumer = ConsumerBuilder::new()
        .brokers(vec!["localhost:9092"])
        .topics(vec!["first_topic"])
        .auto_offset_reset(OffsetReset::Earliest)
        .backend(backend)
        .build()
        .unwrap();

    // The first two rounds fail; a later round within the timeout succeeds
    let records = consumer.poll(Duration::from_secs(2)).await.unwrap();
    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn test_send_handle_wait_resolves_for_each_record() {
    let client = SkylogClient::in_memory_with_partitions(3);
    let producer = client.producer().build().unwrap();

    // The blocking mode still resolves every send, just serially
    for i in 0..10 {
        let metadata = producer
            .send(ProduceRecord::with_key(
                "first_topic",
                format!("Id_{}", i),
                format!("Hello World! ({})", i),
            ))
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert!(metadata.partition < 3);
    }
}
