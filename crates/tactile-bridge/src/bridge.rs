//! The owning context for one running bridge.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tactile_core::{StatusChange, TransportState};
use tactile_devices::{Device, DeviceError, DeviceRegistry, HapticBackend};
use tactile_settings::BridgeSettings;
use tokio::sync::{Mutex, broadcast};
use tracing::{error, info, warn};

use crate::address_map::AddressMap;
use crate::dispatcher::Dispatcher;
use crate::errors::SupervisorError;
use crate::factory::{DefaultTransportFactory, TransportFactory};
use crate::supervisor::Supervisor;

/// A device joined with its mapping, as shown to the user.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceView {
    /// Backend index.
    pub index: u32,
    /// Device serial.
    pub serial: String,
    /// Model name.
    pub model: String,
    /// Mapped address, if any.
    pub address: Option<String>,
    /// Intensity multiplier.
    pub multiplier: f32,
    /// Last applied intensity.
    pub intensity: f32,
}

/// Device registry, dispatcher and supervisor wired together.
///
/// The UI side holds an `Arc<Bridge>` and calls into it; the bridge never
/// calls back except through [`subscribe_status`](Self::subscribe_status).
pub struct Bridge {
    registry: Arc<DeviceRegistry>,
    dispatcher: Arc<Dispatcher>,
    supervisor: Supervisor,
    settings: RwLock<BridgeSettings>,
    applying: Mutex<()>,
}

impl Bridge {
    /// Build a bridge using the real transports.
    pub fn new(settings: BridgeSettings, backend: Arc<dyn HapticBackend>) -> Self {
        Self::with_factory(settings, backend, Arc::new(DefaultTransportFactory))
    }

    /// Build a bridge with a custom transport factory.
    pub fn with_factory(
        settings: BridgeSettings,
        backend: Arc<dyn HapticBackend>,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        let registry = Arc::new(DeviceRegistry::new(
            backend,
            settings.dispatch.device_timeout(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&registry),
            AddressMap::from_settings(&settings.mappings),
        ));
        let supervisor = Supervisor::new(
            settings.transport.clone(),
            factory,
            Arc::clone(&dispatcher) as Arc<dyn tactile_server::EventSink>,
        );
        Self {
            registry,
            dispatcher,
            supervisor,
            settings: RwLock::new(settings),
            applying: Mutex::new(()),
        }
    }

    /// The device registry.
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// The dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The transport supervisor.
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Snapshot of the applied settings.
    pub fn settings(&self) -> BridgeSettings {
        self.settings.read().clone()
    }

    /// Start the configured transport.
    pub async fn start(&self) -> Result<SocketAddr, SupervisorError> {
        self.supervisor.start_bridge().await
    }

    /// Restart the transport with the currently desired settings.
    pub async fn restart(&self) -> Result<SocketAddr, SupervisorError> {
        self.supervisor.restart_bridge().await
    }

    /// Stop the transport. Failures are logged.
    pub async fn shutdown(&self) {
        if let Err(e) = self.supervisor.shutdown_all().await {
            error!(error = %e, "bridge shutdown incomplete");
        }
    }

    /// Transport state.
    pub fn state(&self) -> TransportState {
        self.supervisor.state()
    }

    /// Bound transport address.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.supervisor.local_addr()
    }

    /// Transport status notifications.
    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusChange> {
        self.supervisor.subscribe()
    }

    /// Re-enumerate devices and join them with the mapping table.
    pub async fn refresh_devices(&self) -> Result<Vec<DeviceView>, DeviceError> {
        let devices = self.registry.list_devices().await?;
        Ok(self.views(devices))
    }

    /// Known devices joined with the mapping table, without re-enumerating.
    pub fn device_views(&self) -> Vec<DeviceView> {
        self.views(self.registry.devices())
    }

    /// Fire a test pulse of the configured length.
    pub fn pulse_test(&self, serial: &str) -> Result<(), DeviceError> {
        let duration = self.settings.read().devices.pulse_test();
        info!(serial, ?duration, "test pulse");
        self.registry.pulse(serial, duration)
    }

    /// Adopt new settings.
    ///
    /// Calls apply one at a time, in the order they acquire the lock. The
    /// address map is always rebuilt from `settings`, so the live map matches
    /// the last applied settings. A transport change applies on the next
    /// restart.
    pub async fn apply_settings(&self, settings: BridgeSettings) {
        let _applying = self.applying.lock().await;
        let previous = self.settings();
        if previous.dispatch != settings.dispatch {
            warn!("device timeout changes apply after the agent restarts");
        }

        let map = AddressMap::from_settings(&settings.mappings);
        if previous.mappings != settings.mappings {
            info!(devices = map.len(), addresses = map.addresses().len(), "address map updated");
        }
        self.dispatcher.replace_map(map);

        if previous.transport != settings.transport {
            info!(kind = %settings.transport.kind, "transport settings changed, restart to apply");
        }
        self.supervisor.set_transport(settings.transport.clone()).await;
        *self.settings.write() = settings;
    }

    fn views(&self, devices: Vec<Device>) -> Vec<DeviceView> {
        let map = self.dispatcher.map();
        devices
            .into_iter()
            .map(|device| DeviceView {
                address: map.address_of(&device.info.serial).map(str::to_string),
                multiplier: map.multiplier_of(&device.info.serial).unwrap_or(1.0),
                index: device.info.index,
                serial: device.info.serial,
                model: device.info.model,
                intensity: device.intensity,
            })
            .collect()
    }
}
