//! Error types for the Skylog client library

/// Main error type for Skylog client operations
#[derive(Debug, thiserror::Error)]
pub enum SkylogClientError {
    /// Connection-related errors
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Invalid configuration, rejected at client construction
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Invalid record submitted to a producer
    #[error("Invalid record: {message}")]
    InvalidRecord { message: String },

    /// Producer-specific errors
    #[error("Producer error: {message}")]
    Producer { message: String },

    /// Consumer-specific errors
    #[error("Consumer error: {message}")]
    Consumer { message: String },

    /// Operation is not valid in the client's current state
    #[error("Illegal state: {message}")]
    IllegalState { message: String },

    /// Operation attempted on a closed client
    #[error("Client is closed")]
    ClientClosed,

    /// Topic does not exist
    #[error("Topic '{topic}' does not exist")]
    TopicNotFound { topic: String },

    /// Partition does not exist
    #[error("Partition {partition} does not exist for topic '{topic}'")]
    PartitionNotFound { topic: String, partition: u32 },

    /// No position for a partition and the offset reset policy is `None`
    #[error("No offset for {topic}:{partition} and offset reset policy is 'none'")]
    NoOffsetForPartition { topic: String, partition: u32 },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Timeout errors
    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Broker not available
    #[error("No available brokers")]
    NoBrokersAvailable,

    /// Message too large
    #[error("Message size {size} exceeds maximum {max_size}")]
    MessageTooLarge { size: usize, max_size: usize },

    /// A blocked `poll` was interrupted by a wakeup request.
    ///
    /// This is the distinguished cancellation outcome, not a failure: the
    /// poll loop observes it and proceeds to shut down cleanly.
    #[error("Poll interrupted by wakeup")]
    Wakeup,

    /// Generic client error
    #[error("{message}")]
    Generic { message: String },
}

impl SkylogClientError {
    /// Create a new connection error
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a new invalid config error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a new invalid record error
    pub fn invalid_record<S: Into<String>>(message: S) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Create a new producer error
    pub fn producer<S: Into<String>>(message: S) -> Self {
        Self::Producer {
            message: message.into(),
        }
    }

    /// Create a new consumer error
    pub fn consumer<S: Into<String>>(message: S) -> Self {
        Self::Consumer {
            message: message.into(),
        }
    }

    /// Create a new illegal state error
    pub fn illegal_state<S: Into<String>>(message: S) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { .. } => true,
            Self::Timeout { .. } => true,
            Self::NoBrokersAvailable => true,
            Self::Io(_) => true,
            _ => false,
        }
    }

    /// Check if this error is the distinguished wakeup outcome
    pub fn is_wakeup(&self) -> bool {
        matches!(self, Self::Wakeup)
    }

    /// Check if this error is a caller state error (bug in calling code)
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            Self::IllegalState { .. } | Self::ClientClosed | Self::NoOffsetForPartition { .. }
        )
    }

    /// Check if this error is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Io(_))
    }

    /// Check if this error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
