//! High-level client interface

use crate::admin::AdminClient;
use crate::broker::{BrokerBackend, InMemoryBroker};
use crate::config::ClientConfig;
use crate::consumer::ConsumerBuilder;
use crate::error::SkylogClientError;
use crate::producer::ProducerBuilder;
use std::fmt;
use std::sync::Arc;

/// Main client for Skylog operations.
///
/// Binds a configuration to one broker backend and hands out pre-wired
/// producer/consumer builders. Producers and consumers created from the
/// same client share the backend, so what one produces the other can poll.
pub struct SkylogClient {
    config: ClientConfig,
    backend: Arc<dyn BrokerBackend>,
}

impl fmt::Debug for SkylogClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkylogClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SkylogClient {
    /// Create a new Skylog client over the given backend
    pub fn new(
        config: ClientConfig,
        backend: Arc<dyn BrokerBackend>,
    ) -> Result<Self, SkylogClientError> {
        config.validate()?;
        Ok(Self { config, backend })
    }

    /// Create a producer builder bound to this client's backend
    pub fn producer(&self) -> ProducerBuilder {
        ProducerBuilder::new()
            .brokers(self.config.brokers.clone())
            .backend(self.backend.clone())
    }

    /// Create a consumer builder bound to this client's backend
    pub fn consumer(&self) -> ConsumerBuilder {
        ConsumerBuilder::new()
            .brokers(self.config.brokers.clone())
            .backend(self.backend.clone())
    }

    /// Create an admin client bound to this client's backend
    pub fn admin(&self) -> Result<AdminClient, SkylogClientError> {
        AdminClient::new(self.config.clone(), self.backend.clone())
    }

    /// The backend this client hands to its producers and consumers
    pub fn backend(&self) -> Arc<dyn BrokerBackend> {
        self.backend.clone()
    }
}

/// Convenience constructors for in-process use
impl SkylogClient {
    /// Client over a fresh in-memory broker with single-partition topics
    pub fn in_memory() -> Self {
        Self {
            config: ClientConfig::default(),
            backend: Arc::new(InMemoryBroker::new()),
        }
    }

    /// Client over a fresh in-memory broker whose topics auto-create with
    /// `partitions` partitions
    pub fn in_memory_with_partitions(partitions: u32) -> Self {
        Self {
            config: ClientConfig::default(),
            backend: Arc::new(InMemoryBroker::with_default_partitions(partitions)),
        }
    }
}
