//! Consumer worker example with a cross-thread shutdown protocol
//!
//! The poll loop runs on its own task. A shutdown requester wakes it,
//! then blocks on the termination latch until the worker has closed its
//! consumer, so the process never exits mid-cleanup.

use skylog_client::*;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let client = SkylogClient::in_memory();

    let consumer = client
        .consumer()
        .group_id("my-sixth-application")
        .topics(vec!["first_topic"])
        .auto_offset_reset(OffsetReset::Earliest)
        .build()?;

    info!("Creating the consumer worker");
    let handle = ConsumerWorker::spawn(consumer, Duration::from_millis(100), |record| {
        info!(
            "Key: {:?}, Value: {}, Partition: {}, Offset: {}",
            record.key,
            String::from_utf8_lossy(&record.value),
            record.partition,
            record.offset
        );
    });

    let producer = client.producer().build()?;
    for i in 0..10 {
        producer.send(ProduceRecord::with_key(
            "first_topic",
            format!("Id_{}", i),
            format!("Hello World! ({})", i),
        ))?;
    }
    producer.close().await?;

    // Let the worker drain the records, then run the shutdown protocol
    // from a separate task, as a process shutdown handler would.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let shutdown_handle = handle.clone();
    tokio::spawn(async move {
        info!("Caught by the shutdown handler");
        shutdown_handle.shutdown();
        shutdown_handle.await_terminated().await;
        info!("Consumer worker has terminated");
    });

    handle.await_terminated().await;
    info!("Application is closing");
    Ok(())
}
