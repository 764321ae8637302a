//! Lifecycle state machine shared by every transport variant.
//!
//! ```text
//! begin_start ──> Starting ──activate──> Running ──shutdown──> Stopping ──> Stopped
//!                    │                                                       ^
//!                    └──── fail_start / cancelled by shutdown ───────────────┘
//! ```
//!
//! A variant's `start()` calls [`Lifecycle::begin_start`], binds its socket,
//! then hands the socket to [`Lifecycle::activate`] inside a closure that
//! spawns the listener task. `activate` refuses (and drops the socket) if a
//! `shutdown()` arrived while binding. [`Lifecycle::shutdown`] cancels the
//! run token and awaits the listener task, so it returns only once the task
//! has dropped every socket it owned.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tactile_core::{InboundEvent, StatusChange, TransportKind, TransportState};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::errors::{DecodeError, TransportError};
use crate::metrics::{EVENTS_RECEIVED_TOTAL, TRANSPORT_DECODE_ERRORS_TOTAL};
use crate::sink::EventSink;
use crate::transport::StatusObserver;

#[derive(Default)]
struct Inner {
    state: TransportState,
    token: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

enum ShutdownStep {
    Done,
    Wait,
    Release(Option<JoinHandle<()>>, Option<SocketAddr>),
}

/// State, run token, listener task, sink and observers of one transport
/// instance.
pub struct Lifecycle {
    kind: TransportKind,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<TransportState>,
    sink: RwLock<Option<Arc<dyn EventSink>>>,
    observers: RwLock<Vec<StatusObserver>>,
    decode_errors: AtomicU64,
}

impl Lifecycle {
    /// A stopped lifecycle for a transport of `kind`.
    pub fn new(kind: TransportKind) -> Self {
        let (state_tx, _) = watch::channel(TransportState::Stopped);
        Self {
            kind,
            inner: Mutex::new(Inner::default()),
            state_tx,
            sink: RwLock::new(None),
            observers: RwLock::new(Vec::new()),
            decode_errors: AtomicU64::new(0),
        }
    }

    /// Transport variant.
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Current state.
    pub fn state(&self) -> TransportState {
        self.inner.lock().state
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.lock().local_addr
    }

    /// Decode errors recorded so far.
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    /// Replace the event sink.
    pub fn set_sink(&self, sink: Arc<dyn EventSink>) {
        *self.sink.write() = Some(sink);
    }

    /// Add a status observer.
    pub fn add_observer(&self, observer: StatusObserver) {
        self.observers.write().push(observer);
    }

    /// Enter `Starting`. Returns the token that `shutdown()` cancels.
    pub fn begin_start(&self) -> Result<CancellationToken, TransportError> {
        let token = {
            let mut inner = self.inner.lock();
            if inner.state != TransportState::Stopped {
                return Err(TransportError::InvalidState(inner.state));
            }
            let token = CancellationToken::new();
            inner.token = Some(token.clone());
            self.set_state(&mut inner, TransportState::Starting);
            token
        };
        self.notify(TransportState::Starting, None);
        Ok(token)
    }

    /// Return to `Stopped` after a failed bind.
    pub fn fail_start(&self) {
        let changed = {
            let mut inner = self.inner.lock();
            inner.token = None;
            if inner.state == TransportState::Starting {
                self.set_state(&mut inner, TransportState::Stopped);
                true
            } else {
                false
            }
        };
        if changed {
            self.notify(TransportState::Stopped, None);
        }
    }

    /// Enter `Running`, spawning the listener with the run token.
    ///
    /// If the start was cancelled in the meantime, `spawn` is dropped
    /// unexecuted (releasing whatever socket it captured), the instance ends
    /// `Stopped` and [`TransportError::Cancelled`] is returned.
    pub fn activate<F>(&self, addr: SocketAddr, spawn: F) -> Result<SocketAddr, TransportError>
    where
        F: FnOnce(CancellationToken) -> JoinHandle<()>,
    {
        let mut inner = self.inner.lock();
        let live = inner
            .token
            .clone()
            .filter(|t| inner.state == TransportState::Starting && !t.is_cancelled());

        let Some(token) = live else {
            inner.token = None;
            let changed = inner.state == TransportState::Starting;
            if changed {
                self.set_state(&mut inner, TransportState::Stopped);
            }
            drop(inner);
            drop(spawn);
            if changed {
                self.notify(TransportState::Stopped, None);
            }
            return Err(TransportError::Cancelled);
        };

        inner.handle = Some(spawn(token));
        inner.local_addr = Some(addr);
        self.set_state(&mut inner, TransportState::Running);
        drop(inner);

        self.notify(TransportState::Running, Some(addr));
        Ok(addr)
    }

    /// Converge to `Stopped`.
    ///
    /// No-op when stopped. When running, cancels the listener and awaits it.
    /// When another caller is already starting or stopping, waits for that to
    /// finish.
    pub async fn shutdown(&self) {
        let step = {
            let mut inner = self.inner.lock();
            match inner.state {
                TransportState::Stopped => ShutdownStep::Done,
                TransportState::Starting | TransportState::Stopping => {
                    if let Some(token) = &inner.token {
                        token.cancel();
                    }
                    ShutdownStep::Wait
                }
                TransportState::Running => {
                    if let Some(token) = inner.token.take() {
                        token.cancel();
                    }
                    self.set_state(&mut inner, TransportState::Stopping);
                    ShutdownStep::Release(inner.handle.take(), inner.local_addr)
                }
            }
        };

        match step {
            ShutdownStep::Done => {}
            ShutdownStep::Wait => self.wait_stopped().await,
            ShutdownStep::Release(handle, addr) => {
                self.notify(TransportState::Stopping, addr);
                if let Some(handle) = handle {
                    if let Err(e) = handle.await {
                        error!(kind = %self.kind, error = %e, "listener task failed");
                    }
                }
                {
                    let mut inner = self.inner.lock();
                    inner.local_addr = None;
                    self.set_state(&mut inner, TransportState::Stopped);
                }
                self.notify(TransportState::Stopped, None);
            }
        }
    }

    /// Hand a decoded event to the sink.
    pub async fn deliver(&self, event: InboundEvent) {
        metrics::counter!(EVENTS_RECEIVED_TOTAL, "transport" => self.kind.as_str()).increment(1);
        let sink = self.sink.read().clone();
        match sink {
            Some(sink) => sink.handle(event).await,
            None => trace!(address = %event.address, "no sink registered, event dropped"),
        }
    }

    /// Count and log a dropped message.
    pub fn record_decode_error(&self, error: &DecodeError, peer: Option<SocketAddr>) {
        let _ = self.decode_errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            TRANSPORT_DECODE_ERRORS_TOTAL,
            "transport" => self.kind.as_str(),
            "reason" => error.category()
        )
        .increment(1);
        debug!(kind = %self.kind, ?peer, %error, "dropped malformed message");
    }

    async fn wait_stopped(&self) {
        let mut rx = self.state_tx.subscribe();
        let _ = rx.wait_for(|state| *state == TransportState::Stopped).await;
    }

    fn set_state(&self, inner: &mut Inner, next: TransportState) {
        debug_assert!(
            inner.state.can_transition_to(next),
            "illegal transition {} -> {next}",
            inner.state
        );
        inner.state = next;
        let _ = self.state_tx.send_replace(next);
    }

    fn notify(&self, state: TransportState, local_addr: Option<SocketAddr>) {
        info!(kind = %self.kind, %state, addr = ?local_addr, "transport state changed");
        let change = StatusChange::now(self.kind, state, local_addr);
        let observers = self.observers.read().clone();
        for observer in &observers {
            observer(&change);
        }
    }
}
