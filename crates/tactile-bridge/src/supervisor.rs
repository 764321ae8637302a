//! Ownership of the single active transport.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use tactile_core::{StatusChange, TransportKind, TransportState};
use tactile_server::{EventSink, TransportServer};
use tactile_settings::TransportSettings;
use tokio::sync::{Mutex, broadcast};
use tracing::{error, info, warn};

use crate::errors::SupervisorError;
use crate::factory::TransportFactory;

/// Buffered status notifications per subscriber.
const STATUS_CHANNEL_CAPACITY: usize = 64;

/// Starts, restarts and stops the active transport.
///
/// At most one instance exists at a time. Every transition runs under one
/// async mutex, so a restart's stop, wait and start never interleave with
/// another restart or shutdown.
pub struct Supervisor {
    desired: Mutex<TransportSettings>,
    current: RwLock<Option<Arc<dyn TransportServer>>>,
    factory: Arc<dyn TransportFactory>,
    sink: Arc<dyn EventSink>,
    status_tx: broadcast::Sender<StatusChange>,
}

impl Supervisor {
    /// Create a supervisor with nothing running.
    pub fn new(
        settings: TransportSettings,
        factory: Arc<dyn TransportFactory>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            desired: Mutex::new(settings),
            current: RwLock::new(None),
            factory,
            sink,
            status_tx,
        }
    }

    /// Status notifications from every instance this supervisor runs.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.status_tx.subscribe()
    }

    /// State of the active instance; `Stopped` when there is none.
    pub fn state(&self) -> TransportState {
        self.current
            .read()
            .as_ref()
            .map_or(TransportState::Stopped, |t| t.state())
    }

    /// Variant of the active instance.
    pub fn kind(&self) -> Option<TransportKind> {
        self.current.read().as_ref().map(|t| t.kind())
    }

    /// Bound address of the active instance.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.current.read().as_ref().and_then(|t| t.local_addr())
    }

    /// Malformed messages dropped by the active instance.
    pub fn decode_errors(&self) -> u64 {
        self.current.read().as_ref().map_or(0, |t| t.decode_errors())
    }

    /// Settings the next start will use.
    pub async fn transport_settings(&self) -> TransportSettings {
        self.desired.lock().await.clone()
    }

    /// Change the variant or endpoint used by the next start or restart.
    pub async fn set_transport(&self, settings: TransportSettings) {
        let mut desired = self.desired.lock().await;
        if *desired != settings {
            info!(kind = %settings.kind, addr = %settings.bind_addr(), "desired transport updated");
            *desired = settings;
        }
    }

    /// Start the desired transport.
    pub async fn start_bridge(&self) -> Result<SocketAddr, SupervisorError> {
        let desired = self.desired.lock().await;
        self.start_locked(&desired).await
    }

    /// Stop the active transport, wait out the grace interval, then start
    /// the desired variant.
    ///
    /// The previous instance has released its endpoint before the new one
    /// begins starting. If it does not stop within the shutdown timeout the
    /// restart is abandoned.
    pub async fn restart_bridge(&self) -> Result<SocketAddr, SupervisorError> {
        let desired = self.desired.lock().await;
        info!(kind = %desired.kind, "restarting transport");
        self.stop_locked(&desired).await?;

        let grace = desired.restart_grace();
        if !grace.is_zero() {
            tokio::time::sleep(grace).await;
        }
        self.start_locked(&desired).await
    }

    /// Stop the active transport, if any.
    pub async fn shutdown_all(&self) -> Result<(), SupervisorError> {
        let desired = self.desired.lock().await;
        self.stop_locked(&desired).await
    }

    async fn start_locked(&self, desired: &TransportSettings) -> Result<SocketAddr, SupervisorError> {
        let existing = self.current.read().clone();
        if let Some(existing) = existing {
            match existing.state() {
                TransportState::Running => return Err(SupervisorError::AlreadyRunning),
                TransportState::Stopped => {}
                // left behind by an earlier timed-out stop
                TransportState::Starting | TransportState::Stopping => {
                    self.stop_locked(desired).await?;
                }
            }
        }

        let server = self.factory.create(desired);
        server.on_event(Arc::clone(&self.sink));
        let status_tx = self.status_tx.clone();
        server.on_status_change(Arc::new(move |change: &StatusChange| {
            // no subscribers is fine
            let _ = status_tx.send(change.clone());
        }));

        match server.start().await {
            Ok(addr) => {
                info!(kind = %server.kind(), %addr, "transport started");
                *self.current.write() = Some(server);
                Ok(addr)
            }
            Err(e) => {
                error!(kind = %desired.kind, addr = %desired.bind_addr(), error = %e, "transport failed to start");
                *self.current.write() = None;
                Err(e.into())
            }
        }
    }

    async fn stop_locked(&self, desired: &TransportSettings) -> Result<(), SupervisorError> {
        let Some(server) = self.current.read().clone() else {
            return Ok(());
        };

        let timeout = desired.shutdown_timeout();
        // Runs on its own task so a timed-out stop still completes later.
        let stopping = tokio::spawn(async move { server.shutdown().await });
        match tokio::time::timeout(timeout, stopping).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "transport shutdown task failed"),
            Err(_) => {
                warn!(?timeout, "transport did not stop in time");
                return Err(SupervisorError::ShutdownTimedOut(timeout));
            }
        }
        *self.current.write() = None;
        Ok(())
    }
}
