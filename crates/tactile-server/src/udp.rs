//! OSC over UDP.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tactile_core::{TransportKind, TransportState};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ReceiverConfig;
use crate::errors::TransportError;
use crate::lifecycle::Lifecycle;
use crate::osc;
use crate::sink::EventSink;
use crate::transport::{StatusObserver, TransportServer};

/// Largest datagram read; OSC packets over UDP are far smaller.
const MAX_DATAGRAM: usize = 64 * 1024;

/// Connectionless receiver: one OSC packet per datagram.
pub struct OscReceiver {
    config: ReceiverConfig,
    lifecycle: Arc<Lifecycle>,
}

impl OscReceiver {
    /// Create a stopped receiver.
    pub fn new(config: ReceiverConfig) -> Self {
        Self {
            config,
            lifecycle: Arc::new(Lifecycle::new(TransportKind::Osc)),
        }
    }

    /// Configured bind address.
    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }
}

#[async_trait]
impl TransportServer for OscReceiver {
    fn kind(&self) -> TransportKind {
        TransportKind::Osc
    }

    fn state(&self) -> TransportState {
        self.lifecycle.state()
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.lifecycle.local_addr()
    }

    fn decode_errors(&self) -> u64 {
        self.lifecycle.decode_errors()
    }

    fn on_event(&self, sink: Arc<dyn EventSink>) {
        self.lifecycle.set_sink(sink);
    }

    fn on_status_change(&self, observer: StatusObserver) {
        self.lifecycle.add_observer(observer);
    }

    async fn start(&self) -> Result<SocketAddr, TransportError> {
        let token = self.lifecycle.begin_start()?;
        let bind_addr = self.config.bind_addr.as_str();

        let bound = tokio::select! {
            () = token.cancelled() => None,
            res = UdpSocket::bind(bind_addr) => Some(res),
        };
        let socket = match bound {
            Some(Ok(socket)) => socket,
            Some(Err(source)) => {
                self.lifecycle.fail_start();
                return Err(TransportError::Bind {
                    addr: bind_addr.to_string(),
                    source,
                });
            }
            None => {
                self.lifecycle.fail_start();
                return Err(TransportError::Cancelled);
            }
        };
        let addr = match socket.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                self.lifecycle.fail_start();
                return Err(e.into());
            }
        };

        let lifecycle = Arc::clone(&self.lifecycle);
        self.lifecycle.activate(addr, move |token| {
            tokio::spawn(receive_loop(socket, lifecycle, token))
        })
    }

    async fn shutdown(&self) {
        self.lifecycle.shutdown().await;
    }
}

async fn receive_loop(socket: UdpSocket, lifecycle: Arc<Lifecycle>, token: CancellationToken) {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let (len, peer) = tokio::select! {
            () = token.cancelled() => break,
            res = socket.recv_from(&mut buf) => match res {
                Ok(received) => received,
                Err(e) => {
                    // e.g. ICMP port unreachable surfaced on some platforms
                    warn!(error = %e, "udp receive failed");
                    continue;
                }
            },
        };

        match osc::decode_packet(&buf[..len]) {
            Ok(events) => {
                for event in events {
                    lifecycle.deliver(event).await;
                }
            }
            Err(e) => lifecycle.record_decode_error(&e, Some(peer)),
        }
    }
    debug!("osc receiver loop exited");
}
