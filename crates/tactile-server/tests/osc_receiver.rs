//! OSC receiver against real UDP sockets.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use parking_lot::Mutex;
use tactile_core::{InboundEvent, StatusChange, TransportState};
use tactile_server::osc::{encode_bundle, encode_float_message};
use tactile_server::{ChannelSink, OscReceiver, ReceiverConfig, TransportError, TransportServer};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::Level;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn started() -> (OscReceiver, mpsc::UnboundedReceiver<InboundEvent>, UdpSocket) {
    let receiver = OscReceiver::new(ReceiverConfig::new("127.0.0.1:0"));
    let (sink, rx) = ChannelSink::new();
    receiver.on_event(Arc::new(sink));
    let addr = receiver.start().await.unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.connect(addr).await.unwrap();
    (receiver, rx, client)
}

async fn next(rx: &mut mpsc::UnboundedReceiver<InboundEvent>) -> InboundEvent {
    timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap()
}

#[tokio::test]
async fn receives_messages_and_bundles() {
    let (receiver, mut rx, client) = started().await;
    assert_eq!(receiver.state(), TransportState::Running);

    let _ = client
        .send(&encode_float_message("/avatar/parameters/chest", 0.5))
        .await
        .unwrap();
    assert_eq!(next(&mut rx).await, InboundEvent::new("/avatar/parameters/chest", 0.5));

    let bundle = encode_bundle(&[encode_float_message("/a", 0.1), encode_float_message("/b", 0.2)]);
    let _ = client.send(&bundle).await.unwrap();
    assert_eq!(next(&mut rx).await.address, "/a");
    assert_eq!(next(&mut rx).await.address, "/b");

    receiver.shutdown().await;
}

#[tokio::test]
async fn malformed_datagrams_are_counted_and_skipped() {
    let (receiver, mut rx, client) = started().await;

    let _ = client.send(b"definitely not osc").await.unwrap();
    let _ = client.send(b"/x\0\0,s\0\0hi\0\0").await.unwrap();
    let _ = client.send(&encode_float_message("/ok", 1.0)).await.unwrap();

    // datagrams on one socket pair arrive in order on loopback
    assert_eq!(next(&mut rx).await.address, "/ok");
    assert_eq!(receiver.decode_errors(), 2);
    assert_eq!(receiver.state(), TransportState::Running);

    receiver.shutdown().await;
}

#[tokio::test]
async fn malformed_datagram_is_logged_at_debug() {
    let (logs, _guard) = tactile_logging::capture_logs();
    let (receiver, _rx, client) = started().await;

    let _ = client.send(b"definitely not osc").await.unwrap();
    timeout(TIMEOUT, async {
        while receiver.decode_errors() < 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let dropped = logs.matching(Level::DEBUG, "dropped malformed message");
    assert_eq!(dropped.len(), 1);
    assert_eq!(dropped[0].field("kind"), Some("osc"));

    receiver.shutdown().await;
}

#[tokio::test]
async fn second_bind_fails_until_first_is_shut_down() {
    let first = OscReceiver::new(ReceiverConfig::new("127.0.0.1:0"));
    let addr = first.start().await.unwrap();

    let second = OscReceiver::new(ReceiverConfig::new(addr.to_string()));
    let err = second.start().await.unwrap_err();
    assert_matches!(err, TransportError::Bind { .. });
    assert_eq!(second.state(), TransportState::Stopped);

    first.shutdown().await;
    assert_eq!(second.start().await.unwrap(), addr);
    second.shutdown().await;
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let (receiver, _rx, _client) = started().await;
    receiver.shutdown().await;
    receiver.shutdown().await;
    assert_eq!(receiver.state(), TransportState::Stopped);
    assert!(receiver.local_addr().is_none());

    // stopped instances can be restarted
    let _ = receiver.start().await.unwrap();
    receiver.shutdown().await;
}

#[tokio::test]
async fn shutdown_during_start_converges_to_stopped() {
    let receiver = OscReceiver::new(ReceiverConfig::new("127.0.0.1:0"));
    let (started, ()) = tokio::join!(receiver.start(), receiver.shutdown());
    assert!(matches!(started, Ok(_) | Err(TransportError::Cancelled)));

    receiver.shutdown().await;
    assert_eq!(receiver.state(), TransportState::Stopped);
}

#[tokio::test]
async fn observers_see_every_transition() {
    let receiver = OscReceiver::new(ReceiverConfig::new("127.0.0.1:0"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    receiver.on_status_change(Arc::new(move |change: &StatusChange| {
        log.lock().push((change.state, change.local_addr.is_some()));
    }));

    let _ = receiver.start().await.unwrap();
    receiver.shutdown().await;

    assert_eq!(
        *seen.lock(),
        [
            (TransportState::Starting, false),
            (TransportState::Running, true),
            (TransportState::Stopping, true),
            (TransportState::Stopped, false),
        ]
    );
}

#[tokio::test]
async fn start_while_running_is_rejected() {
    let (receiver, _rx, _client) = started().await;
    assert_matches!(
        receiver.start().await,
        Err(TransportError::InvalidState(TransportState::Running))
    );
    receiver.shutdown().await;
}
