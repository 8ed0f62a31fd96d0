// tests/e2e_ingest.rs
mod helpers;

use aprs2influx::log::{Logger, NoOpLogger};
use aprs2influx::sink::{InfluxConnector, InfluxSettings};
use aprs2influx::source::{AprsIsConnector, AprsIsSettings, SourceError};
use aprs2influx::worker::Joined;
use aprs2influx::{CoordinatorSettings, IngestCoordinator, StartError};
use helpers::{can_bind_loopback, free_port, spawn_mock_aprs_is, spawn_mock_influx};
use std::sync::Arc;
use std::time::Duration;

const IR0UBN: &str = "IR0UBN>APDW16,WIDE1-1,qAR,IS0ANU-12:!3924.97N/00929.74E#PHG3110/A=002526E.R.A. Cagliari Digipeater - Genn'Argiolas - Loc: JM49rj";

fn coordinator(aprs_port: u16, influx_port: u16, heartbeat: Duration) -> IngestCoordinator {
    let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
    let source = AprsIsConnector::new(
        AprsIsSettings {
            server: "127.0.0.1".into(),
            port: aprs_port,
            callsign: "n0call".into(),
            filter: "r/39/9/100".into(),
        },
        Arc::clone(&logger),
    );
    let sink = InfluxConnector::new(
        InfluxSettings {
            host: "127.0.0.1".into(),
            port: influx_port,
            ssl: false,
            username: "aprs".into(),
            password: "pw".into(),
            database: "aprs2influxdb".into(),
            token: None,
            timeout: Duration::from_secs(5),
        },
        Arc::clone(&logger),
    );
    IngestCoordinator::new(
        CoordinatorSettings {
            callsign: "N0CALL".into(),
            heartbeat_interval: heartbeat,
        },
        Arc::new(source),
        Arc::new(sink),
        logger,
    )
}

#[tokio::test]
async fn test_packets_reach_influx() {
    if !can_bind_loopback().await {
        eprintln!("skipping e2e ingest test: cannot bind to loopback in this environment");
        return;
    }

    let influx = spawn_mock_influx(free_port().await).await;
    let aprs = spawn_mock_aprs_is(free_port().await, true).await;
    let coordinator = coordinator(aprs.port, influx.port, Duration::from_secs(3600));
    coordinator.start().await.expect("start failed");

    let login = aprs.wait_for_received("user ").await;
    assert!(login.starts_with("user N0CALL pass 13023 vers aprs2influx "));
    assert!(login.ends_with(" filter r/39/9/100"));

    aprs.feed("# aprsc 2.1.14 17 Mar 2024 12:00:00 GMT T2MOCK");
    aprs.feed("not an aprs line");
    aprs.feed(IR0UBN);
    aprs.feed("N0CALL>APRS,TCPIP*,qAC,T2MOCK:>on air");

    let writes = influx.wait_for_writes(2).await;
    assert_eq!(writes[0].db.as_deref(), Some("aprs2influxdb"));
    assert_eq!(writes[0].authorization.as_deref(), Some("Basic YXByczpwdw=="));
    assert!(writes[0]
        .body
        .starts_with("packet,format=uncompressed latitude=39.41616666666667,"));
    assert_eq!(
        writes[1].body,
        r#"packet,format=status from="N0CALL",via="T2MOCK",to="APRS",path="TCPIP*,qAC,T2MOCK",status="on air",raw="N0CALL>APRS,TCPIP*,qAC,T2MOCK:>on air""#
    );

    coordinator.stop().await;
    let joined = tokio::time::timeout(Duration::from_secs(5), coordinator.join())
        .await
        .expect("join timed out");
    assert_eq!(joined.unwrap(), Joined::Finished);

    aprs.stop().await;
    influx.stop().await;
}

#[tokio::test]
async fn test_heartbeat_is_sent_on_source_connection() {
    if !can_bind_loopback().await {
        eprintln!("skipping heartbeat test: cannot bind to loopback in this environment");
        return;
    }

    let influx = spawn_mock_influx(free_port().await).await;
    let aprs = spawn_mock_aprs_is(free_port().await, true).await;
    let coordinator = coordinator(aprs.port, influx.port, Duration::from_millis(100));
    coordinator.start().await.expect("start failed");

    let heartbeat = aprs.wait_for_received("heartbeat").await;
    assert!(heartbeat.starts_with("N0CALL>APRS,TCPIP*:>aprs2influxdb heartbeat "));
    let millis = heartbeat.rsplit(' ').next().unwrap();
    assert!(millis.parse::<i64>().unwrap() > 0);

    coordinator.stop().await;
    coordinator.join().await.unwrap();
    aprs.stop().await;
    influx.stop().await;
}

#[tokio::test]
async fn test_rejected_writes_do_not_stop_ingestion() {
    if !can_bind_loopback().await {
        eprintln!("skipping rejected write test: cannot bind to loopback in this environment");
        return;
    }

    let influx = spawn_mock_influx(free_port().await).await;
    let aprs = spawn_mock_aprs_is(free_port().await, true).await;
    let coordinator = coordinator(aprs.port, influx.port, Duration::from_secs(3600));
    coordinator.start().await.expect("start failed");

    influx.fail_with(Some(400)).await;
    aprs.feed("N0CALL>APRS:>dropped");
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(influx.writes().await.is_empty());

    influx.fail_with(None).await;
    aprs.feed("N0CALL>APRS:>kept");
    let writes = influx.wait_for_writes(1).await;
    assert!(writes[0].body.contains(r#"status="kept""#));
    assert!(coordinator.is_running().await);

    coordinator.stop().await;
    coordinator.join().await.unwrap();
    aprs.stop().await;
    influx.stop().await;
}

#[tokio::test]
async fn test_server_hang_up_ends_join_with_error() {
    if !can_bind_loopback().await {
        eprintln!("skipping hang-up test: cannot bind to loopback in this environment");
        return;
    }

    let influx = spawn_mock_influx(free_port().await).await;
    let aprs = spawn_mock_aprs_is(free_port().await, true).await;
    let coordinator = coordinator(aprs.port, influx.port, Duration::from_secs(3600));
    coordinator.start().await.expect("start failed");

    aprs.hang_up();
    let joined = tokio::time::timeout(Duration::from_secs(5), coordinator.join())
        .await
        .expect("join timed out");
    assert!(joined.is_err());

    coordinator.stop().await;
    aprs.stop().await;
    influx.stop().await;
}

#[tokio::test]
async fn test_unverified_login_fails_start() {
    if !can_bind_loopback().await {
        eprintln!("skipping login test: cannot bind to loopback in this environment");
        return;
    }

    let influx = spawn_mock_influx(free_port().await).await;
    let aprs = spawn_mock_aprs_is(free_port().await, false).await;
    let coordinator = coordinator(aprs.port, influx.port, Duration::from_secs(3600));

    let err = coordinator.start().await.unwrap_err();
    assert!(matches!(err, StartError::Source(SourceError::Login(_))));
    assert!(!coordinator.is_running().await);

    aprs.stop().await;
    influx.stop().await;
}
