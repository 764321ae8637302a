//! Dispatch against the simulated backend.

use std::sync::Arc;
use std::time::Duration;

use tactile_bridge::{AddressMap, Dispatcher};
use tactile_core::{DeviceInfo, InboundEvent};
use tactile_devices::{BackendCall, DeviceError, DeviceRegistry, SimulatedBackend};
use tactile_logging::capture_logs;
use tracing::Level;

async fn setup(map: AddressMap) -> (Arc<SimulatedBackend>, Dispatcher) {
    let backend = Arc::new(SimulatedBackend::new(vec![
        DeviceInfo::new(0, "LHR-1", "Tracker"),
        DeviceInfo::new(1, "LHR-2", "Tracker"),
        DeviceInfo::new(2, "LHR-3", "Tracker"),
    ]));
    let registry = Arc::new(DeviceRegistry::new(
        backend.clone(),
        Duration::from_millis(100),
    ));
    let _ = registry.list_devices().await.unwrap();
    (backend, Dispatcher::new(registry, map))
}

#[tokio::test]
async fn shared_address_drives_every_device() {
    let map = AddressMap::new()
        .with_mapping("LHR-1", "/chest", 1.0)
        .with_mapping("LHR-2", "/chest", 0.5)
        .with_mapping("LHR-3", "/back", 1.0);
    let (backend, dispatcher) = setup(map).await;

    let report = dispatcher.dispatch(&InboundEvent::new("/chest", 0.8)).await;

    assert_eq!(report.resolved, 2);
    assert_eq!(report.delivered.len(), 2);
    assert!(report.missing.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(backend.intensities_for("LHR-1"), vec![0.8]);
    assert_eq!(backend.intensities_for("LHR-2"), vec![0.4]);
    assert!(backend.intensities_for("LHR-3").is_empty());
}

#[tokio::test]
async fn unmapped_address_touches_nothing() {
    let map = AddressMap::new().with_mapping("LHR-1", "/chest", 1.0);
    let (backend, dispatcher) = setup(map).await;

    let report = dispatcher.dispatch(&InboundEvent::new("/elsewhere", 1.0)).await;

    assert!(report.is_unmapped());
    assert!(report.delivered.is_empty());
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn missing_device_does_not_block_others() {
    let (logs, _guard) = capture_logs();
    let map = AddressMap::new()
        .with_mapping("LHR-1", "/chest", 1.0)
        .with_mapping("GONE", "/chest", 1.0);
    let (backend, dispatcher) = setup(map).await;

    let report = dispatcher.dispatch(&InboundEvent::new("/chest", 0.3)).await;

    assert_eq!(report.resolved, 2);
    assert_eq!(report.missing, vec!["GONE".to_string()]);
    assert_eq!(report.delivered.len(), 1);
    assert_eq!(
        backend.calls(),
        vec![BackendCall::SetIntensity {
            serial: "LHR-1".into(),
            intensity: 0.3
        }]
    );
    let warnings = logs.matching(Level::WARN, "mapped device not connected");
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field("serial"), Some("GONE"));
}

#[tokio::test]
async fn failing_device_is_reported() {
    let map = AddressMap::new()
        .with_mapping("LHR-1", "/chest", 1.0)
        .with_mapping("LHR-2", "/chest", 1.0);
    let (backend, dispatcher) = setup(map).await;
    backend.fail_with("LHR-2", DeviceError::Backend("usb stall".into()));

    let report = dispatcher.dispatch(&InboundEvent::new("/chest", 0.5)).await;

    assert_eq!(report.delivered, vec![("LHR-1".to_string(), 0.5)]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "LHR-2");
}

#[tokio::test]
async fn slow_device_does_not_delay_others_past_timeout() {
    let map = AddressMap::new()
        .with_mapping("LHR-1", "/chest", 1.0)
        .with_mapping("LHR-2", "/chest", 1.0);
    let (backend, dispatcher) = setup(map).await;
    backend.set_latency("LHR-2", Duration::from_secs(5));

    let started = tokio::time::Instant::now();
    let report = dispatcher.dispatch(&InboundEvent::new("/chest", 0.5)).await;

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(report.delivered.len(), 1);
    assert_eq!(report.failed.len(), 1);
}
