//! Subscribing consumer example driven by a poll loop

use skylog_client::*;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let client = SkylogClient::in_memory();

    // Seed the shared broker so the poll loop has something to read.
    let producer = client.producer().build()?;
    for i in 0..5 {
        producer
            .send(ProduceRecord::new("first_topic", format!("Hello World! ({})", i)))?
            .wait()
            .await?;
    }
    producer.close().await?;

    let consumer = client
        .consumer()
        .group_id("my-fourth-application")
        .topics(vec!["first_topic"])
        .auto_offset_reset(OffsetReset::Earliest)
        .build()?;

    for _ in 0..10 {
        let records = consumer.poll(Duration::from_millis(100)).await?;
        for record in &records {
            info!(
                "Key: {:?}, Value: {}, Partition: {}, Offset: {}",
                record.key,
                String::from_utf8_lossy(&record.value),
                record.partition,
                record.offset
            );
        }
    }

    consumer.close()?;
    Ok(())
}
