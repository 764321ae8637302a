//! Test transports shared by the integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tactile_bridge::TransportFactory;
use tactile_core::{TransportKind, TransportState};
use tactile_server::{EventSink, Lifecycle, StatusObserver, TransportError, TransportServer};
use tactile_settings::TransportSettings;

/// Ordered record of what fake transports did.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: String) {
        self.0.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// Transport whose listener takes `release` to let go after cancellation.
pub struct SlowTransport {
    id: usize,
    release: Duration,
    journal: Journal,
    lifecycle: Lifecycle,
}

#[async_trait]
impl TransportServer for SlowTransport {
    fn kind(&self) -> TransportKind {
        self.lifecycle.kind()
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
        let _token = self.lifecycle.begin_start()?;
        self.journal.push(format!("start {}", self.id));
        let addr: SocketAddr = ([127, 0, 0, 1], 40_000).into();
        let id = self.id;
        let release = self.release;
        let journal = self.journal.clone();
        self.lifecycle.activate(addr, move |token| {
            tokio::spawn(async move {
                token.cancelled().await;
                tokio::time::sleep(release).await;
                journal.push(format!("released {id}"));
            })
        })
    }

    async fn shutdown(&self) {
        self.lifecycle.shutdown().await;
    }
}

/// Hands out numbered `SlowTransport`s sharing one journal.
pub struct SlowFactory {
    release: Duration,
    pub journal: Journal,
    created: Mutex<usize>,
}

impl SlowFactory {
    pub fn new(release: Duration) -> Self {
        Self {
            release,
            journal: Journal::default(),
            created: Mutex::new(0),
        }
    }
}

impl TransportFactory for SlowFactory {
    fn create(&self, settings: &TransportSettings) -> Arc<dyn TransportServer> {
        let mut created = self.created.lock();
        *created += 1;
        Arc::new(SlowTransport {
            id: *created,
            release: self.release,
            journal: self.journal.clone(),
            lifecycle: Lifecycle::new(settings.kind),
        })
    }
}
