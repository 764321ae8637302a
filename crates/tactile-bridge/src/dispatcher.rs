//! Fan-out of inbound events to mapped devices.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use tactile_core::InboundEvent;
use tactile_devices::{DeviceError, DeviceRegistry};
use tactile_server::EventSink;
use tracing::{trace, warn};

use crate::address_map::AddressMap;
use crate::metrics::{
    DISPATCH_DEVICE_FAILURES_TOTAL, DISPATCH_EVENTS_TOTAL, DISPATCH_UNMAPPED_TOTAL,
};

/// Outcome of dispatching one event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DispatchReport {
    /// Devices the address resolved to.
    pub resolved: usize,
    /// `(serial, applied intensity)` for every device driven.
    pub delivered: Vec<(String, f32)>,
    /// Mapped serials absent from the registry.
    pub missing: Vec<String>,
    /// Mapped serials whose command failed.
    pub failed: Vec<(String, DeviceError)>,
}

impl DispatchReport {
    /// Whether the address had no mapping.
    pub fn is_unmapped(&self) -> bool {
        self.resolved == 0
    }
}

/// Routes events through the current [`AddressMap`] into the registry.
///
/// The map is swapped atomically; a dispatch in flight keeps the snapshot it
/// started with.
pub struct Dispatcher {
    registry: Arc<DeviceRegistry>,
    map: RwLock<Arc<AddressMap>>,
}

impl Dispatcher {
    /// Create a dispatcher over `registry` using `map`.
    pub fn new(registry: Arc<DeviceRegistry>, map: AddressMap) -> Self {
        Self {
            registry,
            map: RwLock::new(Arc::new(map)),
        }
    }

    /// Current map snapshot.
    pub fn map(&self) -> Arc<AddressMap> {
        Arc::clone(&self.map.read())
    }

    /// Install a new map for subsequent events.
    pub fn replace_map(&self, map: AddressMap) {
        *self.map.write() = Arc::new(map);
    }

    /// Drive every device mapped to the event's address.
    ///
    /// Device commands run concurrently. One device failing never prevents
    /// the others from being driven.
    pub async fn dispatch(&self, event: &InboundEvent) -> DispatchReport {
        let map = self.map();
        let targets = map.resolve(&event.address);
        if targets.is_empty() {
            metrics::counter!(DISPATCH_UNMAPPED_TOTAL).increment(1);
            trace!(address = %event.address, "no mapping for address");
            return DispatchReport::default();
        }
        metrics::counter!(DISPATCH_EVENTS_TOTAL).increment(1);

        let calls = targets.iter().map(|target| async move {
            let result = self
                .registry
                .set_intensity(&target.serial, event.value * target.multiplier)
                .await;
            (target.serial.as_str(), result)
        });

        let mut report = DispatchReport {
            resolved: targets.len(),
            ..DispatchReport::default()
        };
        for (serial, result) in join_all(calls).await {
            match result {
                Ok(applied) => report.delivered.push((serial.to_string(), applied)),
                Err(DeviceError::NotFound(_)) => {
                    warn!(serial, address = %event.address, "mapped device not connected");
                    metrics::counter!(DISPATCH_DEVICE_FAILURES_TOTAL, "kind" => "not_found")
                        .increment(1);
                    report.missing.push(serial.to_string());
                }
                Err(e) => {
                    warn!(serial, address = %event.address, error = %e, "device command failed");
                    metrics::counter!(DISPATCH_DEVICE_FAILURES_TOTAL, "kind" => e.category())
                        .increment(1);
                    report.failed.push((serial.to_string(), e));
                }
            }
        }
        report
    }
}

#[async_trait]
impl EventSink for Dispatcher {
    async fn handle(&self, event: InboundEvent) {
        let _ = self.dispatch(&event).await;
    }
}
