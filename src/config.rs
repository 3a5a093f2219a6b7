//! Configuration types for the Skylog client

use crate::error::SkylogClientError;
use std::str::FromStr;
use std::time::Duration;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// List of bootstrap broker addresses (`host:port`)
    pub brokers: Vec<String>,
    /// Connection timeout
    pub connection_timeout: Duration,
    /// Request timeout
    pub request_timeout: Duration,
    /// Retry configuration for transient failures
    pub retry_config: RetryConfig,
    /// Client identifier
    pub client_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            connection_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            retry_config: RetryConfig::default(),
            client_id: None,
        }
    }
}

impl ClientConfig {
    /// Validate the configuration, failing fast on construction-time errors.
    pub fn validate(&self) -> Result<(), SkylogClientError> {
        if self.brokers.is_empty() {
            return Err(SkylogClientError::invalid_config(
                "at least one bootstrap broker address is required",
            ));
        }
        for broker in &self.brokers {
            let (host, port) = broker.rsplit_once(':').ok_or_else(|| {
                SkylogClientError::invalid_config(format!(
                    "broker address '{}' is not host:port",
                    broker
                ))
            })?;
            if host.is_empty() || port.parse::<u16>().is_err() {
                return Err(SkylogClientError::invalid_config(format!(
                    "broker address '{}' is not host:port",
                    broker
                )));
            }
        }
        Ok(())
    }
}

/// Where a consumer starts reading when it has no position for a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetReset {
    /// Start from the beginning of the partition log
    Earliest,
    /// Start from the end of the partition log (only new records)
    Latest,
    /// No fallback: polling a positionless partition is an error
    None,
}

impl Default for OffsetReset {
    fn default() -> Self {
        OffsetReset::Latest
    }
}

impl FromStr for OffsetReset {
    type Err = SkylogClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earliest" => Ok(OffsetReset::Earliest),
            "latest" => Ok(OffsetReset::Latest),
            "none" => Ok(OffsetReset::None),
            other => Err(SkylogClientError::invalid_config(format!(
                "unknown offset reset policy '{}'",
                other
            ))),
        }
    }
}

/// Producer-specific configuration
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Base client configuration
    pub client_config: ClientConfig,
    /// Acknowledgment level (0, 1, -1/all)
    pub acks: i16,
    /// Maximum message size
    pub max_message_size: usize,
    /// Delivery timeout
    pub delivery_timeout: Duration,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            client_config: ClientConfig::default(),
            acks: 1, // Wait for leader acknowledgment
            max_message_size: 1024 * 1024, // 1MB
            delivery_timeout: Duration::from_secs(120),
        }
    }
}

impl ProducerConfig {
    pub fn validate(&self) -> Result<(), SkylogClientError> {
        self.client_config.validate()?;
        if self.max_message_size == 0 {
            return Err(SkylogClientError::invalid_config(
                "max_message_size must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Consumer-specific configuration
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Base client configuration
    pub client_config: ClientConfig,
    /// Consumer group ID
    pub group_id: Option<String>,
    /// Where to start reading when no position exists for a partition
    pub auto_offset_reset: OffsetReset,
    /// Maximum records returned by a single poll
    pub max_poll_records: usize,
    /// Fetch configuration
    pub fetch_config: FetchConfig,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            client_config: ClientConfig::default(),
            group_id: None,
            auto_offset_reset: OffsetReset::default(),
            max_poll_records: 500,
            fetch_config: FetchConfig::default(),
        }
    }
}

impl ConsumerConfig {
    pub fn validate(&self) -> Result<(), SkylogClientError> {
        self.client_config.validate()?;
        if self.max_poll_records == 0 {
            return Err(SkylogClientError::invalid_config(
                "max_poll_records must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Retry configuration for transient failures
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries
    pub max_retries: usize,
    /// Initial retry delay
    pub initial_delay: Duration,
    /// Maximum retry delay
    pub max_delay: Duration,
    /// Retry delay multiplier
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Fetch configuration
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum records requested from a single partition per fetch
    pub max_partition_records: usize,
    /// Delay between empty fetch rounds within a poll
    pub empty_round_backoff: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_partition_records: 500,
            empty_round_backoff: Duration::from_millis(10),
        }
    }
}

/// Builder for ClientConfig
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn brokers<I, S>(mut self, brokers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.brokers = brokers.into_iter().map(|s| s.into()).collect();
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn client_id<S: Into<String>>(mut self, client_id: S) -> Self {
        self.config.client_id = Some(client_id.into());
        self
    }

    pub fn retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.config.retry_config = retry_config;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Builder for ProducerConfig
#[derive(Debug, Default)]
pub struct ProducerConfigBuilder {
    config: ProducerConfig,
}

impl ProducerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_config(mut self, client_config: ClientConfig) -> Self {
        self.config.client_config = client_config;
        self
    }

    pub fn brokers<I, S>(mut self, brokers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.client_config.brokers = brokers.into_iter().map(|s| s.into()).collect();
        self
    }

    pub fn acks(mut self, acks: i16) -> Self {
        self.config.acks = acks;
        self
    }

    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    pub fn delivery_timeout(mut self, timeout: Duration) -> Self {
        self.config.delivery_timeout = timeout;
        self
    }

    pub fn build(self) -> ProducerConfig {
        self.config
    }
}

/// Builder for ConsumerConfig
#[derive(Debug, Default)]
pub struct ConsumerConfigBuilder {
    config: ConsumerConfig,
}

impl ConsumerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client_config(mut self, client_config: ClientConfig) -> Self {
        self.config.client_config = client_config;
        self
    }

    pub fn brokers<I, S>(mut self, brokers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.client_config.brokers = brokers.into_iter().map(|s| s.into()).collect();
        self
    }

    pub fn group_id<S: Into<String>>(mut self, group_id: S) -> Self {
        self.config.group_id = Some(group_id.into());
        self
    }

    pub fn auto_offset_reset(mut self, reset: OffsetReset) -> Self {
        self.config.auto_offset_reset = reset;
        self
    }

    pub fn max_poll_records(mut self, max_records: usize) -> Self {
        self.config.max_poll_records = max_records;
        self
    }

    pub fn fetch_config(mut self, fetch_config: FetchConfig) -> Self {
        self.config.fetch_config = fetch_config;
        self
    }

    pub fn build(self) -> ConsumerConfig {
        self.config
    }
}
