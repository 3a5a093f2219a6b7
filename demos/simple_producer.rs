//! Keyed producer example with per-record delivery callbacks

use skylog_client::*;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let client = SkylogClient::in_memory_with_partitions(3);
    let producer = client.producer().acks(1).build()?;

    // Records sharing a key always land on the same partition, so each
    // Id_* series keeps its submission order.
    for i in 0..10 {
        let key = format!("Id_{}", i);
        let value = format!("Hello World! ({})", i);
        info!("Sending record with key: {}", key);

        let record = ProduceRecord::with_key("first_topic", key, value);
        producer.send_with_callback(record, |result| match result {
            Ok(metadata) => info!(
                "Received new metadata. Topic: {}, Partition: {}, Offset: {}, Timestamp: {}",
                metadata.topic, metadata.partition, metadata.offset, metadata.timestamp
            ),
            Err(e) => error!("Error while producing: {}", e),
        })?;
    }

    // Sends are asynchronous; flush waits until every callback has fired.
    producer.flush().await?;
    producer.close().await?;

    Ok(())
}
