//! Admin client for Skylog management operations

use crate::broker::BrokerBackend;
use crate::config::ClientConfig;
use crate::error::SkylogClientError;
use crate::record::TopicName;
use std::sync::Arc;

/// Admin client for topic management
pub struct AdminClient {
    backend: Arc<dyn BrokerBackend>,
}

impl AdminClient {
    /// Create a new admin client
    pub fn new(
        config: ClientConfig,
        backend: Arc<dyn BrokerBackend>,
    ) -> Result<Self, SkylogClientError> {
        config.validate()?;
        Ok(Self { backend })
    }

    /// Create a topic with an explicit partition count.
    ///
    /// No-op if the topic already exists; an existing partition count is
    /// never changed.
    pub async fn create_topic(
        &self,
        topic: &str,
        partitions: u32,
    ) -> Result<(), SkylogClientError> {
        self.backend.create_topic(topic, partitions).await
    }

    /// List all known topics
    pub async fn list_topics(&self) -> Result<Vec<TopicName>, SkylogClientError> {
        self.backend.topic_names().await
    }

    /// Number of partitions for a topic
    pub async fn partition_count(&self, topic: &str) -> Result<u32, SkylogClientError> {
        self.backend.partition_count(topic).await
    }
}
