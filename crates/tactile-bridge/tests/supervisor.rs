//! Supervisor lifecycle against fake and real transports.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use common::SlowFactory;
use tactile_bridge::{DefaultTransportFactory, Supervisor, SupervisorError};
use tactile_core::TransportState;
use tactile_server::{ChannelSink, EventSink, TransportError};
use tactile_settings::{EndpointSettings, TransportSettings};
use tokio::net::UdpSocket;

fn settings(grace_ms: u64, shutdown_timeout_ms: u64) -> TransportSettings {
    TransportSettings {
        osc: EndpointSettings::new("127.0.0.1", 0),
        restart_grace_ms: grace_ms,
        shutdown_timeout_ms,
        ..TransportSettings::default()
    }
}

fn sink() -> Arc<dyn EventSink> {
    let (sink, _rx) = ChannelSink::new();
    Arc::new(sink)
}

#[tokio::test]
async fn restart_releases_before_next_start() {
    let factory = Arc::new(SlowFactory::new(Duration::from_millis(80)));
    let journal = factory.journal.clone();
    let supervisor = Supervisor::new(settings(10, 1_000), factory, sink());

    let _ = supervisor.start_bridge().await.unwrap();
    let _ = supervisor.restart_bridge().await.unwrap();

    assert_eq!(journal.entries(), ["start 1", "released 1", "start 2"]);
    assert_eq!(supervisor.state(), TransportState::Running);
    supervisor.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn concurrent_restarts_serialize() {
    let factory = Arc::new(SlowFactory::new(Duration::from_millis(30)));
    let journal = factory.journal.clone();
    let supervisor = Supervisor::new(settings(0, 1_000), factory, sink());
    let _ = supervisor.start_bridge().await.unwrap();

    let (a, b) = tokio::join!(supervisor.restart_bridge(), supervisor.restart_bridge());
    assert!(a.is_ok());
    assert!(b.is_ok());

    assert_eq!(
        journal.entries(),
        ["start 1", "released 1", "start 2", "released 2", "start 3"]
    );
    supervisor.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn shutdown_timeout_aborts_restart() {
    let factory = Arc::new(SlowFactory::new(Duration::from_millis(500)));
    let journal = factory.journal.clone();
    let supervisor = Supervisor::new(settings(0, 50), factory, sink());
    let _ = supervisor.start_bridge().await.unwrap();

    assert_matches!(
        supervisor.restart_bridge().await,
        Err(SupervisorError::ShutdownTimedOut(t)) if t == Duration::from_millis(50)
    );
    assert_eq!(journal.entries(), ["start 1"]);
    assert_eq!(supervisor.state(), TransportState::Stopping);

    // the stop keeps going in the background
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(journal.entries(), ["start 1", "released 1"]);
    assert_eq!(supervisor.state(), TransportState::Stopped);
    assert!(supervisor.start_bridge().await.is_ok());
    supervisor.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn status_broadcast_spans_restarts() {
    use TransportState::{Running, Starting, Stopped, Stopping};

    let factory = Arc::new(SlowFactory::new(Duration::ZERO));
    let supervisor = Supervisor::new(settings(0, 1_000), factory, sink());
    let mut rx = supervisor.subscribe();

    let _ = supervisor.start_bridge().await.unwrap();
    let _ = supervisor.restart_bridge().await.unwrap();
    supervisor.shutdown_all().await.unwrap();

    let mut states = Vec::new();
    while let Ok(change) = rx.try_recv() {
        states.push(change.state);
    }
    assert_eq!(
        states,
        [
            Starting, Running, Stopping, Stopped, Starting, Running, Stopping, Stopped
        ]
    );
}

#[tokio::test]
async fn bind_failure_leaves_nothing_running() {
    let holder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = holder.local_addr().unwrap().port();
    let mut settings = settings(0, 1_000);
    settings.osc = EndpointSettings::new("127.0.0.1", port);
    let supervisor = Supervisor::new(settings, Arc::new(DefaultTransportFactory), sink());

    let err = supervisor.start_bridge().await.unwrap_err();
    assert!(err.is_bind());
    assert_matches!(err, SupervisorError::Transport(TransportError::Bind { .. }));
    assert_eq!(supervisor.state(), TransportState::Stopped);
    assert!(supervisor.kind().is_none());

    drop(holder);
    let addr = supervisor.start_bridge().await.unwrap();
    assert_eq!(addr.port(), port);
    supervisor.shutdown_all().await.unwrap();
}

#[tokio::test]
async fn restart_rebinds_same_port() {
    let probe = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = probe.local_addr().unwrap().port();
    drop(probe);

    let mut settings = settings(0, 1_000);
    settings.osc = EndpointSettings::new("127.0.0.1", port);
    let supervisor = Supervisor::new(settings, Arc::new(DefaultTransportFactory), sink());

    let first = supervisor.start_bridge().await.unwrap();
    let second = supervisor.restart_bridge().await.unwrap();
    assert_eq!(first, second);

    // the endpoint is exclusively held by the running instance
    assert!(UdpSocket::bind(("127.0.0.1", port)).await.is_err());
    supervisor.shutdown_all().await.unwrap();
    assert!(UdpSocket::bind(("127.0.0.1", port)).await.is_ok());
}
