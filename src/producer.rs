//! Producer client for sending records to Skylog

use crate::broker::BrokerBackend;
use crate::config::{ProducerConfig, ProducerConfigBuilder};
use crate::error::SkylogClientError;
use crate::metrics::{global_metrics, Timer};
use crate::record::{current_timestamp_ms, PartitionId, ProduceRecord, RecordMetadata, TopicName};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Terminal outcome of one record's delivery
pub type DeliveryResult = Result<RecordMetadata, SkylogClientError>;

enum Completion {
    Handle(oneshot::Sender<DeliveryResult>),
    Callback(Box<dyn FnOnce(DeliveryResult) + Send>),
}

enum WorkItem {
    Deliver {
        record: ProduceRecord,
        completion: Completion,
    },
    Flush {
        done: oneshot::Sender<()>,
    },
    Shutdown {
        done: oneshot::Sender<()>,
    },
}

/// Pending delivery returned by [`Producer::send`].
///
/// Resolves once the record reaches a terminal state: metadata on success,
/// a delivery error otherwise.
#[derive(Debug)]
pub struct DeliveryHandle {
    rx: oneshot::Receiver<DeliveryResult>,
}

impl DeliveryHandle {
    /// Block the caller until the delivery completes.
    ///
    /// This exists for tests and debugging: awaiting every send serializes
    /// the producer's throughput. Production paths should register a
    /// continuation instead ([`Self::on_delivery`] or
    /// [`Producer::send_with_callback`]).
    pub async fn wait(self) -> DeliveryResult {
        self.rx
            .await
            .unwrap_or_else(|_| Err(SkylogClientError::producer("delivery task terminated")))
    }

    /// Register a continuation to run when the delivery completes.
    ///
    /// The continuation runs on a spawned task. When ordering relative to
    /// `flush` matters, use [`Producer::send_with_callback`], which runs the
    /// callback on the delivery task itself.
    pub fn on_delivery<F>(self, f: F)
    where
        F: FnOnce(DeliveryResult) + Send + 'static,
    {
        tokio::spawn(async move {
            f(self.wait().await);
        });
    }
}

/// High-level producer client for sending records
#[derive(Clone, Debug)]
pub struct Producer {
    config: ProducerConfig,
    work_tx: mpsc::UnboundedSender<WorkItem>,
    closed: Arc<AtomicBool>,
}

impl Producer {
    /// Create a new producer with the given configuration and broker.
    ///
    /// Fails fast on configuration errors; nothing is retried here.
    pub fn new(
        config: ProducerConfig,
        backend: Arc<dyn BrokerBackend>,
    ) -> Result<Self, SkylogClientError> {
        config.validate()?;

        let (work_tx, work_rx) = mpsc::unbounded_channel();
        let worker = DeliveryWorker {
            backend,
            config: config.clone(),
            partition_cache: HashMap::new(),
            round_robin: 0,
        };
        tokio::spawn(worker.run(work_rx));

        info!(
            "Producer started for brokers {:?}",
            config.client_config.brokers
        );
        Ok(Self {
            config,
            work_tx,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Enqueue a record for asynchronous delivery.
    ///
    /// Non-blocking: the record is handed to the delivery task and the
    /// returned handle resolves when it reaches a terminal state. Records
    /// sharing a key are delivered to their partition in submission order.
    pub fn send(&self, record: ProduceRecord) -> Result<DeliveryHandle, SkylogClientError> {
        let (tx, rx) = oneshot::channel();
        self.submit(record, Completion::Handle(tx))?;
        Ok(DeliveryHandle { rx })
    }

    /// Enqueue a record and invoke `callback` with its terminal outcome.
    ///
    /// The callback runs exactly once, on the delivery task, before any
    /// later submission completes and before a subsequent `flush` returns.
    /// It must not block: a stalled callback stalls every delivery behind
    /// it.
    pub fn send_with_callback<F>(
        &self,
        record: ProduceRecord,
        callback: F,
    ) -> Result<(), SkylogClientError>
    where
        F: FnOnce(DeliveryResult) + Send + 'static,
    {
        self.submit(record, Completion::Callback(Box::new(callback)))
    }

    fn submit(
        &self,
        record: ProduceRecord,
        completion: Completion,
    ) -> Result<(), SkylogClientError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SkylogClientError::ClientClosed);
        }
        if record.topic.is_empty() {
            return Err(SkylogClientError::invalid_record(
                "record topic must not be empty",
            ));
        }
        if record.value.len() > self.config.max_message_size {
            return Err(SkylogClientError::MessageTooLarge {
                size: record.value.len(),
                max_size: self.config.max_message_size,
            });
        }

        self.work_tx
            .send(WorkItem::Deliver { record, completion })
            .map_err(|_| SkylogClientError::producer("delivery task terminated"))
    }

    /// Block until every previously submitted record has completed,
    /// successfully or not. No completion for those records fires after
    /// this returns.
    pub async fn flush(&self) -> Result<(), SkylogClientError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SkylogClientError::ClientClosed);
        }
        let (tx, rx) = oneshot::channel();
        self.work_tx
            .send(WorkItem::Flush { done: tx })
            .map_err(|_| SkylogClientError::producer("delivery task terminated"))?;
        rx.await
            .map_err(|_| SkylogClientError::producer("delivery task terminated"))
    }

    /// Flush outstanding deliveries and stop the delivery task.
    ///
    /// Idempotent: the second and later calls return without effect.
    pub async fn close(&self) -> Result<(), SkylogClientError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let (tx, rx) = oneshot::channel();
        // The shutdown marker sits behind all pending deliveries, so this
        // drains the queue exactly like a flush before the task exits.
        if self.work_tx.send(WorkItem::Shutdown { done: tx }).is_ok() {
            let _ = rx.await;
        }
        info!("Producer closed");
        Ok(())
    }
}

struct DeliveryWorker {
    backend: Arc<dyn BrokerBackend>,
    config: ProducerConfig,
    partition_cache: HashMap<TopicName, u32>,
    round_robin: usize,
}

impl DeliveryWorker {
    async fn run(mut self, mut work_rx: mpsc::UnboundedReceiver<WorkItem>) {
        while let Some(item) = work_rx.recv().await {
            match item {
                WorkItem::Deliver { record, completion } => {
                    let result = self.deliver(record).await;
                    match completion {
                        Completion::Handle(tx) => {
                            let _ = tx.send(result);
                        }
                        Completion::Callback(callback) => callback(result),
                    }
                }
                WorkItem::Flush { done } => {
                    // All prior deliveries have completed; this is the
                    // flush barrier.
                    let _ = done.send(());
                }
                WorkItem::Shutdown { done } => {
                    let _ = done.send(());
                    break;
                }
            }
        }
        info!("Producer delivery task stopped");
    }

    async fn deliver(&mut self, mut record: ProduceRecord) -> DeliveryResult {
        let partition = self.assign_partition(&record).await?;
        let topic = record.topic.clone();
        let value_len = record.value.len();

        // Pin the timestamp here so the reported metadata matches what the
        // broker stores.
        let timestamp = record.timestamp.unwrap_or_else(current_timestamp_ms);
        record.timestamp = Some(timestamp);

        let timer = Timer::start();
        let retry = &self.config.client_config.retry_config;
        let retry_deadline = tokio::time::Instant::now() + self.config.delivery_timeout;
        let mut attempt = 0;
        let mut delay = retry.initial_delay;

        loop {
            match self
                .backend
                .produce(&topic, partition, vec![record.clone()])
                .await
            {
                Ok(base_offset) => {
                    global_metrics().record_send(1, value_len as u64, timer.elapsed());
                    return Ok(RecordMetadata {
                        topic,
                        partition,
                        offset: base_offset,
                        timestamp,
                    });
                }
                Err(e)
                    if e.is_retryable()
                        && attempt < retry.max_retries
                        && tokio::time::Instant::now() + delay < retry_deadline =>
                {
                    warn!(
                        "Delivery to {}:{} failed (attempt {}): {}, retrying",
                        topic,
                        partition,
                        attempt + 1,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay = Duration::from_secs_f64(
                        (delay.as_secs_f64() * retry.multiplier)
                            .min(retry.max_delay.as_secs_f64()),
                    );
                    attempt += 1;
                }
                Err(e) => {
                    global_metrics().record_send_error();
                    return Err(e);
                }
            }
        }
    }

    async fn assign_partition(
        &mut self,
        record: &ProduceRecord,
    ) -> Result<PartitionId, SkylogClientError> {
        let count = match self.partition_cache.get(&record.topic) {
            Some(count) => *count,
            None => {
                let count = self.backend.partition_count(&record.topic).await?;
                self.partition_cache.insert(record.topic.clone(), count);
                count
            }
        };
        if count == 0 {
            return Err(SkylogClientError::TopicNotFound {
                topic: record.topic.clone(),
            });
        }

        match record.partition {
            Some(partition) if partition < count => Ok(partition),
            Some(partition) => Err(SkylogClientError::PartitionNotFound {
                topic: record.topic.clone(),
                partition,
            }),
            // Keyed records hash to a stable partition; keyless records are
            // load-balanced round-robin.
            None => match &record.key {
                Some(key) => Ok(hash_partition(key, count)),
                None => {
                    let partition = (self.round_robin % count as usize) as PartitionId;
                    self.round_robin = self.round_robin.wrapping_add(1);
                    Ok(partition)
                }
            },
        }
    }
}

fn hash_partition(key: &Bytes, partition_count: u32) -> PartitionId {
    // FNV-1a
    let mut hash = 2166136261u32;
    for byte in key.iter() {
        hash ^= *byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash % partition_count
}

/// Builder for Producer
pub struct ProducerBuilder {
    config: ProducerConfigBuilder,
    backend: Option<Arc<dyn BrokerBackend>>,
}

impl ProducerBuilder {
    /// Create a new producer builder
    pub fn new() -> Self {
        Self {
            config: ProducerConfigBuilder::new(),
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

    /// Set the acknowledgment level
    pub fn acks(mut self, acks: i16) -> Self {
        self.config = self.config.acks(acks);
        self
    }

    /// Set the maximum message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config = self.config.max_message_size(size);
        self
    }

    /// Set the delivery timeout
    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.delivery_timeout(timeout);
        self
    }

    /// Set the broker backend to deliver through
    pub fn backend(mut self, backend: Arc<dyn BrokerBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Build the producer
    pub fn build(self) -> Result<Producer, SkylogClientError> {
        let backend = self.backend.ok_or_else(|| {
            SkylogClientError::invalid_config("a broker backend is required to build a producer")
        })?;
        Producer::new(self.config.build(), backend)
    }
}

impl Default for ProducerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
