//! Assign/seek example: read a fixed window from one partition
//!
//! Assigns partition 0 directly (no group coordination), seeks to offset
//! 15, and stops after reading 5 records.

use skylog_client::*;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let client = SkylogClient::in_memory();

    let producer = client.producer().build()?;
    for i in 0..30 {
        producer
            .send(ProduceRecord::new("first_topic", format!("Hello World! ({})", i)))?
            .wait()
            .await?;
    }
    producer.close().await?;

    let consumer = client
        .consumer()
        .group_id("my-seven-application")
        .auto_offset_reset(OffsetReset::Earliest)
        .build()?;

    let partition_to_read = TopicPartition::new("first_topic", 0);
    let start_offset = 15;
    consumer.assign(vec![partition_to_read.clone()])?;
    consumer.seek(&partition_to_read, start_offset)?;

    let messages_to_read = 5;
    let mut messages_read = 0;

    'outer: loop {
        let records = consumer.poll(Duration::from_millis(100)).await?;
        for record in &records {
            messages_read += 1;
            info!(
                "Key: {:?}, Value: {}, Partition: {}, Offset: {}",
                record.key,
                String::from_utf8_lossy(&record.value),
                record.partition,
                record.offset
            );
            if messages_read >= messages_to_read {
                break 'outer;
            }
        }
    }

    consumer.close()?;
    Ok(())
}
