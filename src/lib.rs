//! # Skylog Client Library
//!
//! An async Rust client for the Skylog partitioned log broker.
//!
//! ## Features
//!
//! - **Async Producer**: Non-blocking sends with per-record completion via
//!   callbacks or awaitable delivery handles
//! - **Polling Consumer**: Topic subscription or explicit partition
//!   assignment with `seek`, partition-fair poll rounds, and offset reset
//!   policies
//! - **Cooperative Shutdown**: A cross-thread wakeup token that interrupts
//!   a blocked poll, plus a one-shot latch for clean worker termination
//! - **Pluggable Broker**: Clients talk to the broker through the
//!   [`BrokerBackend`] trait; an in-memory implementation ships for
//!   in-process pipelines and tests
//! - **Type Safety**: Strong typing with comprehensive error handling
//! - **Observability**: Built-in metrics and tracing support
//!
//! ## Quick Start
//!
//! ### Producer Example
//!
//! ```rust,no_run
//! use skylog_client::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = SkylogClient::in_memory();
//!     let producer = client.producer().build()?;
//!
//!     let record = ProduceRecord::with_key("first_topic", "Id_0", "Hello World!");
//!     producer.send_with_callback(record, |result| match result {
//!         Ok(metadata) => println!(
//!             "Delivered to partition {} at offset {}",
//!             metadata.partition, metadata.offset
//!         ),
//!         Err(e) => eprintln!("Delivery failed: {}", e),
//!     })?;
//!
//!     producer.flush().await?;
//!     producer.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ### Consumer Example
//!
//! ```rust,no_run
//! use skylog_client::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = SkylogClient::in_memory();
//!     let consumer = client
//!         .consumer()
//!         .group_id("my-application")
//!         .topics(vec!["first_topic"])
//!         .auto_offset_reset(OffsetReset::Earliest)
//!         .build()?;
//!
//!     loop {
//!         for record in consumer.poll(Duration::from_millis(100)).await? {
//!             println!(
//!                 "Key: {:?}, Value: {:?}, Partition: {}, Offset: {}",
//!                 record.key, record.value, record.partition, record.offset
//!             );
//!         }
//!     }
//! }
//! ```

pub mod admin;
pub mod broker;
pub mod client;
pub mod config;
pub mod consumer;
pub mod error;
pub mod metrics;
pub mod producer;
pub mod record;
pub mod wakeup;
pub mod worker;

pub use admin::*;
pub use broker::{BrokerBackend, InMemoryBroker};
pub use client::*;
pub use config::*;
pub use consumer::*;
pub use error::*;
pub use producer::*;
pub use record::{
    ConsumeRecord, Offset, PartitionId, ProduceRecord, ProduceRecordBuilder, RecordMetadata,
    TopicName, TopicPartition,
};
pub use wakeup::{ShutdownLatch, WakeupToken};
pub use worker::{ConsumerWorker, WorkerHandle};

/// Client library result type
pub type Result<T> = std::result::Result<T, SkylogClientError>;

/// Client library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
