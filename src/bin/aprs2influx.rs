use anyhow::Context;
use aprs2influx::cli::config::Config;
use aprs2influx::cli::{init_tracing, Cli};
use aprs2influx::coordinator::IngestCoordinator;
use aprs2influx::log::{Logger, TracingLogger};
use aprs2influx::sink::InfluxConnector;
use aprs2influx::source::AprsIsConnector;
use aprs2influx::worker::Joined;
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::resolve(&cli)?;
    init_tracing(config.debug);
    tracing::debug!(?config, "resolved configuration");

    let logger: Arc<dyn Logger> = Arc::new(TracingLogger::new("aprs2influx"));
    let coordinator = IngestCoordinator::new(
        config.coordinator(),
        Arc::new(AprsIsConnector::new(config.aprs.clone(), Arc::clone(&logger))),
        Arc::new(InfluxConnector::new(
            config.influxdb.clone(),
            Arc::clone(&logger),
        )),
        logger,
    );

    coordinator
        .start()
        .await
        .context("Failed to start ingestion")?;

    let outcome = coordinator.join().await;
    coordinator.stop().await;

    match outcome {
        Ok(Joined::Finished) => Ok(()),
        Ok(Joined::Interrupted) => {
            tracing::info!("shutdown signal received, waiting for workers to exit");
            coordinator.join().await?;
            Ok(())
        }
        Err(e) => Err(e).context("Ingestion stopped"),
    }
}
