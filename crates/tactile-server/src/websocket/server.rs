//! WebSocket server: many clients, one event stream.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tactile_core::{InboundEvent, TransportKind, TransportState};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use super::connection::{ClientConnection, ConnectionRegistry};
use crate::config::WebSocketConfig;
use crate::errors::{DecodeError, TransportError};
use crate::lifecycle::Lifecycle;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_REJECTED_TOTAL, WS_CONNECTIONS_TOTAL};
use crate::sink::EventSink;
use crate::transport::{StatusObserver, TransportServer};
use crate::{frames, osc};

/// Bound on the opening handshake of a new client.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
/// Bound on sending a close frame during shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Connection-oriented server accepting multiple WebSocket clients.
pub struct WebSocketServer {
    config: WebSocketConfig,
    lifecycle: Arc<Lifecycle>,
    connections: Arc<ConnectionRegistry>,
}

impl WebSocketServer {
    /// Create a stopped server.
    pub fn new(config: WebSocketConfig) -> Self {
        Self {
            config,
            lifecycle: Arc::new(Lifecycle::new(TransportKind::WebSocket)),
            connections: Arc::new(ConnectionRegistry::new()),
        }
    }

    /// Server configuration.
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }

    /// Number of connected clients.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Connected clients.
    pub fn connections(&self) -> Vec<Arc<ClientConnection>> {
        self.connections.all()
    }
}

#[async_trait]
impl TransportServer for WebSocketServer {
    fn kind(&self) -> TransportKind {
        TransportKind::WebSocket
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
            res = TcpListener::bind(bind_addr) => Some(res),
        };
        let listener = match bound {
            Some(Ok(listener)) => listener,
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
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                self.lifecycle.fail_start();
                return Err(e.into());
            }
        };

        let ctx = ServerContext {
            lifecycle: Arc::clone(&self.lifecycle),
            connections: Arc::clone(&self.connections),
            config: self.config.clone(),
        };
        self.lifecycle
            .activate(addr, move |token| tokio::spawn(accept_loop(listener, ctx, token)))
    }

    async fn shutdown(&self) {
        self.lifecycle.shutdown().await;
    }
}

/// Everything a connection task needs, cloned per client.
#[derive(Clone)]
struct ServerContext {
    lifecycle: Arc<Lifecycle>,
    connections: Arc<ConnectionRegistry>,
    config: WebSocketConfig,
}

async fn accept_loop(listener: TcpListener, ctx: ServerContext, token: CancellationToken) {
    let tracker = TaskTracker::new();

    loop {
        tokio::select! {
            () = token.cancelled() => break,
            res = listener.accept() => match res {
                Ok((stream, peer)) => {
                    let connection = Arc::new(ClientConnection::new(peer));
                    if !ctx.connections.try_add(Arc::clone(&connection), ctx.config.max_connections) {
                        metrics::counter!(WS_CONNECTIONS_REJECTED_TOTAL).increment(1);
                        warn!(%peer, max = ctx.config.max_connections, "connection limit reached, refusing client");
                        drop(stream);
                        continue;
                    }
                    metrics::counter!(WS_CONNECTIONS_TOTAL).increment(1);
                    record_active(&ctx.connections);
                    let _ = tracker.spawn(serve_connection(
                        stream,
                        connection,
                        ctx.clone(),
                        token.child_token(),
                    ));
                }
                Err(e) => warn!(error = %e, "accept failed"),
            },
        }
    }

    // Stop accepting before draining clients.
    drop(listener);
    tracker.close();
    tracker.wait().await;
    debug!("websocket accept loop exited");
}

async fn serve_connection(
    stream: TcpStream,
    connection: Arc<ClientConnection>,
    ctx: ServerContext,
    token: CancellationToken,
) {
    let peer = connection.peer;
    info!(conn_id = %connection.id, %peer, "client connected");

    let handshake = tokio::select! {
        () = token.cancelled() => None,
        res = tokio::time::timeout(HANDSHAKE_TIMEOUT, tokio_tungstenite::accept_async(stream)) => Some(res),
    };
    match handshake {
        Some(Ok(Ok(ws))) => read_loop(ws, &connection, &ctx, &token).await,
        Some(Ok(Err(e))) => debug!(%peer, error = %e, "websocket handshake failed"),
        Some(Err(_)) => debug!(%peer, "websocket handshake timed out"),
        None => {}
    }

    let _ = ctx.connections.remove(&connection.id);
    record_active(&ctx.connections);
    info!(
        conn_id = %connection.id,
        %peer,
        messages = connection.message_count(),
        age_ms = u64::try_from(connection.age().as_millis()).unwrap_or(u64::MAX),
        "client disconnected"
    );
}

async fn read_loop(
    mut ws: tokio_tungstenite::WebSocketStream<TcpStream>,
    connection: &ClientConnection,
    ctx: &ServerContext,
    token: &CancellationToken,
) {
    loop {
        let message = tokio::select! {
            () = token.cancelled() => {
                let _ = tokio::time::timeout(CLOSE_TIMEOUT, ws.close(None)).await;
                break;
            }
            msg = ws.next() => msg,
        };

        let decoded = match message {
            Some(Ok(Message::Text(text))) => {
                Some(decode_limited(text.len(), ctx.config.max_message_size, || {
                    frames::decode_text_frame(text.as_str())
                }))
            }
            Some(Ok(Message::Binary(data))) => {
                Some(decode_limited(data.len(), ctx.config.max_message_size, || {
                    osc::decode_packet(&data)
                }))
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => None,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(e)) => {
                debug!(conn_id = %connection.id, error = %e, "websocket read failed");
                break;
            }
        };

        match decoded {
            Some(Ok(events)) => {
                connection.record_message();
                for event in events {
                    ctx.lifecycle.deliver(event).await;
                }
            }
            Some(Err(e)) => {
                connection.record_decode_error();
                ctx.lifecycle.record_decode_error(&e, Some(connection.peer));
            }
            None => {}
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn record_active(connections: &ConnectionRegistry) {
    metrics::gauge!(WS_CONNECTIONS_ACTIVE).set(connections.len() as f64);
}

fn decode_limited<F>(size: usize, limit: usize, decode: F) -> Result<Vec<InboundEvent>, DecodeError>
where
    F: FnOnce() -> Result<Vec<InboundEvent>, DecodeError>,
{
    if size > limit {
        return Err(DecodeError::TooLarge { size, limit });
    }
    decode()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn oversize_message_is_not_decoded() {
        let mut called = false;
        let result = decode_limited(10, 4, || {
            called = true;
            Ok(Vec::new())
        });
        assert_matches!(result, Err(DecodeError::TooLarge { size: 10, limit: 4 }));
        assert!(!called);
    }

    #[test]
    fn message_at_limit_is_decoded() {
        let result = decode_limited(4, 4, || Ok(vec![InboundEvent::new("/a", 1.0)]));
        assert_eq!(result.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn new_server_is_stopped() {
        let server = WebSocketServer::new(WebSocketConfig::new("127.0.0.1:0"));
        assert_eq!(server.state(), TransportState::Stopped);
        assert_eq!(server.connection_count(), 0);
        assert!(server.local_addr().is_none());
        server.shutdown().await;
    }
}
