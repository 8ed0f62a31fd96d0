//! Ingest lifecycle: source → translator → sink, plus the heartbeat.

use crate::heartbeat::HeartbeatScheduler;
use crate::log::Logger;
use crate::sink::{RecordSink, SinkConnector, SinkError};
use crate::source::{PacketSource, SourceConnector, SourceError};
use crate::translate::PacketTranslator;
use crate::worker::{CancellableWorker, Job, Joined, WorkerError};
use crate::{log_error, log_info, log_warn};
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("failed to open packet source: {0}")]
    Source(#[from] SourceError),
    #[error("failed to open sink: {0}")]
    Sink(#[from] SinkError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    /// Station callsign used in heartbeat packets.
    pub callsign: String,
    pub heartbeat_interval: Duration,
}

/// One receive → translate → write step.
struct ConsumeJob {
    source: Arc<dyn PacketSource>,
    sink: Arc<dyn RecordSink>,
    translator: PacketTranslator,
    logger: Arc<dyn Logger>,
}

#[async_trait]
impl Job for ConsumeJob {
    async fn run(&mut self) -> anyhow::Result<()> {
        let packet = match self.source.recv().await {
            Ok(packet) => packet,
            Err(e) => {
                // a closed source also ends the heartbeat
                self.source.close().await;
                return Err(e).context("packet source failed");
            }
        };

        let Some(record) = self.translator.translate(&packet) else {
            return Ok(());
        };
        let line = record.to_string();

        match self.sink.write(&line).await {
            Ok(()) => Ok(()),
            Err(SinkError::Closed) => Err(SinkError::Closed).context("sink closed"),
            Err(e) => {
                match &e {
                    SinkError::Client { .. } => {
                        log_error!(self.logger, "An error occurred in the request: {}", e)
                    }
                    SinkError::Server { .. } => {
                        log_error!(self.logger, "An error occurred in the server: {}", e)
                    }
                    _ => log_error!(self.logger, "Failed to write record: {}", e),
                }
                log_error!(self.logger, "Line Protocol: {}", line);
                Ok(())
            }
        }
    }
}

struct Running {
    source: Arc<dyn PacketSource>,
    sink: Arc<dyn RecordSink>,
    heartbeat: Arc<HeartbeatScheduler>,
    consumer: Arc<CancellableWorker<ConsumeJob>>,
}

enum Lifecycle {
    Idle,
    Running(Running),
    Stopped(Running),
}

/// Owns the source and sink connections and both background loops.
pub struct IngestCoordinator {
    settings: CoordinatorSettings,
    source_connector: Arc<dyn SourceConnector>,
    sink_connector: Arc<dyn SinkConnector>,
    logger: Arc<dyn Logger>,
    lifecycle: Mutex<Lifecycle>,
}

impl IngestCoordinator {
    pub fn new(
        settings: CoordinatorSettings,
        source_connector: Arc<dyn SourceConnector>,
        sink_connector: Arc<dyn SinkConnector>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            settings,
            source_connector,
            sink_connector,
            logger,
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    /// Connect the source, then the sink, then start the heartbeat and the
    /// consume loop. A no-op once started.
    pub async fn start(&self) -> Result<(), StartError> {
        let mut lifecycle = self.lifecycle.lock().await;
        match &*lifecycle {
            Lifecycle::Idle => {}
            Lifecycle::Running(_) => return Ok(()),
            Lifecycle::Stopped(_) => {
                log_warn!(self.logger, "coordinator already stopped, not restarting");
                return Ok(());
            }
        }
        log_info!(self.logger, "START");

        let source = self.source_connector.connect().await?;
        let sink = match self.sink_connector.connect().await {
            Ok(sink) => sink,
            Err(e) => {
                source.close().await;
                return Err(e.into());
            }
        };

        let heartbeat = Arc::new(HeartbeatScheduler::new(
            self.settings.callsign.clone(),
            self.settings.heartbeat_interval,
            Arc::clone(&source),
            Arc::clone(&self.logger),
        ));
        heartbeat.start();

        let job = ConsumeJob {
            source: Arc::clone(&source),
            sink: Arc::clone(&sink),
            translator: PacketTranslator::new(Arc::clone(&self.logger)),
            logger: Arc::clone(&self.logger),
        };
        let consumer = Arc::new(CancellableWorker::new(
            "consumer",
            job,
            Arc::clone(&self.logger),
        ));
        consumer.start();

        *lifecycle = Lifecycle::Running(Running {
            source,
            sink,
            heartbeat,
            consumer,
        });
        Ok(())
    }

    /// Stop the consume loop and heartbeat, then close the sink and finally
    /// the source, which interrupts a receive in progress. A no-op unless running.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        let running = match std::mem::replace(&mut *lifecycle, Lifecycle::Idle) {
            Lifecycle::Running(running) => running,
            other => {
                *lifecycle = other;
                return;
            }
        };
        log_info!(self.logger, "STOP");

        running.consumer.stop();
        running.heartbeat.stop();
        running.sink.close().await;
        running.source.close().await;
        *lifecycle = Lifecycle::Stopped(running);
    }

    pub async fn is_running(&self) -> bool {
        matches!(&*self.lifecycle.lock().await, Lifecycle::Running(_))
    }

    /// Wait for the heartbeat loop and then the consume loop. Returns
    /// [`Joined::Interrupted`] on a shutdown signal without waiting further.
    pub async fn join(&self) -> Result<Joined, WorkerError> {
        let (heartbeat, consumer) = match &*self.lifecycle.lock().await {
            Lifecycle::Idle => return Ok(Joined::Finished),
            Lifecycle::Running(r) | Lifecycle::Stopped(r) => {
                (Arc::clone(&r.heartbeat), Arc::clone(&r.consumer))
            }
        };

        let heartbeat = match heartbeat.join().await {
            Ok(Joined::Interrupted) => return Ok(Joined::Interrupted),
            other => other,
        };
        let consumer = consumer.join().await?;
        heartbeat.map(|_| consumer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::capture::CaptureLogger;
    use crate::log::{LogLevel, NoOpLogger};
    use crate::packet::{Header, Packet, StatusReport};
    use crate::sink::mock::{MockSink, MockSinkConnector};
    use crate::source::mock::{MockConnector, MockSource};
    use std::sync::atomic::Ordering;
    use tokio::sync::mpsc::UnboundedSender;

    struct Harness {
        coordinator: IngestCoordinator,
        source: Arc<MockSource>,
        connector: Arc<MockConnector>,
        sink: Arc<MockSink>,
        tx: UnboundedSender<Packet>,
    }

    fn harness(logger: Arc<dyn Logger>, fail_connect: bool) -> Harness {
        let (source, tx) = MockSource::new();
        let mut connector = MockConnector::new(Arc::clone(&source));
        connector.fail = fail_connect;
        let connector = Arc::new(connector);
        let sink = Arc::new(MockSink::default());

        let coordinator = IngestCoordinator::new(
            CoordinatorSettings {
                callsign: "N0CALL".into(),
                heartbeat_interval: Duration::from_secs(60),
            },
            connector.clone(),
            Arc::new(MockSinkConnector { sink: sink.clone() }),
            logger,
        );
        Harness {
            coordinator,
            source,
            connector,
            sink,
            tx,
        }
    }

    fn status(from: &str, text: &str) -> Packet {
        Packet::Status(StatusReport {
            header: Header {
                from: Some(from.into()),
                ..Default::default()
            },
            status: Some(text.into()),
            ..Default::default()
        })
    }

    /// With paused time this returns once every other task is blocked.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn packets_flow_to_sink() {
        let h = harness(Arc::new(NoOpLogger), false);
        h.coordinator.start().await.unwrap();

        h.tx.send(status("N0CALL", "hello")).unwrap();
        h.tx.send(Packet::Unsupported).unwrap();
        h.tx.send(status("N1CALL", "world")).unwrap();
        settle().await;

        assert_eq!(
            h.sink.lines(),
            vec![
                "packet,format=status from=\"N0CALL\",status=\"hello\"".to_string(),
                "packet,format=status from=\"N1CALL\",status=\"world\"".to_string(),
            ]
        );

        h.coordinator.stop().await;
        assert_eq!(h.coordinator.join().await.unwrap(), Joined::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent_and_stop_before_start_is_noop() {
        let h = harness(Arc::new(NoOpLogger), false);
        h.coordinator.stop().await;
        assert_eq!(h.coordinator.join().await.unwrap(), Joined::Finished);
        assert!(!h.coordinator.is_running().await);

        h.coordinator.start().await.unwrap();
        h.coordinator.start().await.unwrap();
        assert_eq!(h.connector.connects.load(Ordering::SeqCst), 1);
        assert!(h.coordinator.is_running().await);

        h.coordinator.stop().await;
        h.coordinator.stop().await;
        h.coordinator.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_closes_sink_and_interrupts_blocked_receive() {
        let h = harness(Arc::new(NoOpLogger), false);
        h.coordinator.start().await.unwrap();
        settle().await;

        h.coordinator.stop().await;
        assert!(h.sink.is_closed());
        assert!(h.source.is_closed());
        assert_eq!(h.coordinator.join().await.unwrap(), Joined::Finished);
        assert!(!h.coordinator.is_running().await);

        // stopped is terminal
        h.coordinator.start().await.unwrap();
        assert_eq!(h.connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sink_errors_are_logged_and_loop_continues() {
        let logger = Arc::new(CaptureLogger::default());
        let h = harness(logger.clone(), false);
        *h.sink.fail_with.lock().unwrap() = Some(SinkError::Client {
            status: 400,
            body: "partial write".into(),
        });
        h.coordinator.start().await.unwrap();

        h.tx.send(status("N0CALL", "first")).unwrap();
        settle().await;
        assert!(logger.contains(LogLevel::Error, "An error occurred in the request"));
        assert!(logger.contains(
            LogLevel::Error,
            "Line Protocol: packet,format=status from=\"N0CALL\",status=\"first\""
        ));

        *h.sink.fail_with.lock().unwrap() = Some(SinkError::Server {
            status: 503,
            body: String::new(),
        });
        h.tx.send(status("N0CALL", "second")).unwrap();
        settle().await;
        assert!(logger.contains(LogLevel::Error, "An error occurred in the server"));

        *h.sink.fail_with.lock().unwrap() = None;
        h.tx.send(status("N0CALL", "third")).unwrap();
        settle().await;
        assert_eq!(h.sink.lines().len(), 1);

        h.coordinator.stop().await;
        h.coordinator.join().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn source_failure_ends_both_loops() {
        let h = harness(Arc::new(NoOpLogger), false);
        h.coordinator.start().await.unwrap();

        drop(h.tx);
        let err = h.coordinator.join().await.unwrap_err();
        assert!(matches!(err, WorkerError::Job { worker: "consumer", .. }));
        assert!(h.source.is_closed());
    }

    #[tokio::test]
    async fn connect_failure_is_returned_and_leaves_idle() {
        let h = harness(Arc::new(NoOpLogger), true);
        let err = h.coordinator.start().await.unwrap_err();
        assert!(matches!(err, StartError::Source(SourceError::Login(_))));
        assert!(!h.coordinator.is_running().await);
        assert_eq!(h.coordinator.join().await.unwrap(), Joined::Finished);
    }
}
