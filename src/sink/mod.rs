//! Time-series sinks: one line-protocol record per write.

mod influx;

pub use influx::{InfluxConnector, InfluxSettings};

use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SinkError {
    #[error("client error: HTTP {status}: {body}")]
    Client { status: u16, body: String },
    #[error("server error: HTTP {status}: {body}")]
    Server { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("invalid sink configuration: {0}")]
    Config(String),
    #[error("sink closed")]
    Closed,
}

/// An open connection to the time-series store.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn write(&self, line: &str) -> Result<(), SinkError>;

    /// Later writes fail with [`SinkError::Closed`]. Idempotent.
    async fn close(&self);
}

#[async_trait]
pub trait SinkConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn RecordSink>, SinkError>;
}
