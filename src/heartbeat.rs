//! Keep-alive status packets on the source connection.

use crate::log::Logger;
use crate::source::PacketSource;
use crate::worker::{CancellableWorker, Job, Joined, WorkerError};
use crate::log_debug;
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Fixed poll period, independent of the heartbeat interval.
pub const POLL_PERIOD: Duration = Duration::from_secs(1);

/// `<callsign>>APRS,TCPIP*:>aprs2influxdb heartbeat <epoch-millis>`
pub fn heartbeat_message(callsign: &str, epoch_millis: i64) -> String {
    format!("{}>APRS,TCPIP*:>aprs2influxdb heartbeat {}", callsign, epoch_millis)
}

pub struct HeartbeatJob {
    callsign: String,
    interval: Duration,
    poll: Duration,
    last_sent: Instant,
    source: Arc<dyn PacketSource>,
    logger: Arc<dyn Logger>,
}

impl HeartbeatJob {
    /// The first heartbeat goes out one full interval after construction.
    pub fn new(
        callsign: impl Into<String>,
        interval: Duration,
        source: Arc<dyn PacketSource>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            callsign: callsign.into(),
            interval,
            poll: POLL_PERIOD,
            last_sent: Instant::now(),
            source,
            logger,
        }
    }

    /// Send a heartbeat if a full interval has elapsed since the last one.
    /// Returns whether a heartbeat was sent.
    pub async fn tick(&mut self) -> anyhow::Result<bool> {
        if self.source.is_closed() {
            anyhow::bail!("source connection lost");
        }

        let now = Instant::now();
        if now.duration_since(self.last_sent) < self.interval {
            return Ok(false);
        }

        let message = heartbeat_message(&self.callsign, chrono::Utc::now().timestamp_millis());
        log_debug!(self.logger, "Sending heartbeat: {}", message);
        self.source
            .send_line(&message)
            .await
            .context("failed to send heartbeat")?;
        self.last_sent = now;
        Ok(true)
    }
}

#[async_trait]
impl Job for HeartbeatJob {
    async fn run(&mut self) -> anyhow::Result<()> {
        self.tick().await?;
        tokio::time::sleep(self.poll).await;
        Ok(())
    }
}

/// Background loop around a [`HeartbeatJob`].
pub struct HeartbeatScheduler {
    worker: CancellableWorker<HeartbeatJob>,
}

impl HeartbeatScheduler {
    pub fn new(
        callsign: impl Into<String>,
        interval: Duration,
        source: Arc<dyn PacketSource>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let job = HeartbeatJob::new(callsign, interval, source, Arc::clone(&logger));
        Self {
            worker: CancellableWorker::new("heartbeat", job, logger),
        }
    }

    pub fn start(&self) -> bool {
        self.worker.start()
    }

    pub fn stop(&self) {
        self.worker.stop()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    pub async fn join(&self) -> Result<Joined, WorkerError> {
        self.worker.join().await
    }
}
