//! In-memory source for unit tests.

use super::{PacketSource, SourceConnector, SourceError};
use crate::packet::Packet;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

pub(crate) struct MockSource {
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Packet>>,
    sent: Mutex<Vec<String>>,
    closed: watch::Sender<bool>,
}

impl MockSource {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<Packet>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        let source = Arc::new(Self {
            inbound: tokio::sync::Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
            closed,
        });
        (source, tx)
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PacketSource for MockSource {
    async fn recv(&self) -> Result<Packet, SourceError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow() {
            return Err(SourceError::Closed);
        }
        let mut inbound = self.inbound.lock().await;
        tokio::select! {
            packet = inbound.recv() => packet.ok_or(SourceError::Disconnected),
            _ = closed.wait_for(|closed| *closed) => Err(SourceError::Closed),
        }
    }

    async fn send_line(&self, line: &str) -> Result<(), SourceError> {
        if self.is_closed() {
            return Err(SourceError::Closed);
        }
        self.sent.lock().unwrap().push(line.to_string());
        Ok(())
    }

    async fn close(&self) {
        self.closed.send_replace(true);
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// Hands out one shared [`MockSource`], or fails every connect.
pub(crate) struct MockConnector {
    pub source: Arc<MockSource>,
    pub fail: bool,
    pub connects: AtomicUsize,
}

impl MockConnector {
    pub fn new(source: Arc<MockSource>) -> Self {
        Self {
            source,
            fail: false,
            connects: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SourceConnector for MockConnector {
    async fn connect(&self) -> Result<Arc<dyn PacketSource>, SourceError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SourceError::Login("unverified".into()));
        }
        let source: Arc<dyn PacketSource> = self.source.clone();
        Ok(source)
    }
}
