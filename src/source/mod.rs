//! Packet sources.
//!
//! A source is a long-lived connection that yields decoded packets from
//! [`PacketSource::recv`] while accepting outbound lines through
//! [`PacketSource::send_line`] from another task. Closing the source makes a
//! pending `recv` return [`SourceError::Closed`].

mod aprs_is;
pub mod decode;
#[cfg(test)]
pub(crate) mod mock;

pub use aprs_is::{passcode, AprsIsConnector, AprsIsSettings};
pub use decode::{decode, DecodeError};

use crate::packet::Packet;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("login rejected: {0}")]
    Login(String),
    #[error("source connection closed")]
    Closed,
    #[error("source disconnected")]
    Disconnected,
}

/// An open connection to the reporting network.
#[async_trait]
pub trait PacketSource: Send + Sync {
    /// Wait for the next decodable packet.
    async fn recv(&self) -> Result<Packet, SourceError>;

    /// Send one line. Safe to call while another task is inside `recv`.
    async fn send_line(&self, line: &str) -> Result<(), SourceError>;

    /// Close the connection, interrupting any pending `recv`. Idempotent.
    async fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Opens (and logs into) a [`PacketSource`].
#[async_trait]
pub trait SourceConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn PacketSource>, SourceError>;
}
