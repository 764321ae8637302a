//! Registry behavior against the simulated backend.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use tactile_core::DeviceInfo;
use tactile_devices::{BackendCall, DeviceError, DeviceRegistry, SimulatedBackend};
use tracing::Level;

async fn setup(timeout_ms: u64) -> (Arc<SimulatedBackend>, DeviceRegistry) {
    let backend = Arc::new(SimulatedBackend::new(vec![
        DeviceInfo::new(0, "LHR-1", "Tracker"),
        DeviceInfo::new(1, "LHR-2", "Tracker"),
    ]));
    let registry = DeviceRegistry::new(backend.clone(), Duration::from_millis(timeout_ms));
    let _ = registry.list_devices().await.unwrap();
    (backend, registry)
}

#[tokio::test]
async fn disconnected_device_is_evicted() {
    let (backend, registry) = setup(100).await;
    assert!(backend.remove_device("LHR-2"));

    assert_matches!(
        registry.set_intensity("LHR-2", 0.5).await,
        Err(DeviceError::NotFound(serial)) if serial == "LHR-2"
    );
    assert!(!registry.contains("LHR-2"));
    assert!(registry.contains("LHR-1"));
}

#[tokio::test]
async fn slow_device_times_out() {
    let (backend, registry) = setup(30).await;
    backend.set_latency("LHR-1", Duration::from_millis(500));

    assert_matches!(
        registry.set_intensity("LHR-1", 0.5).await,
        Err(DeviceError::Timeout { serial, ms: 30 }) if serial == "LHR-1"
    );
    // the timed-out command never completed
    assert!(backend.intensities_for("LHR-1").is_empty());
    assert_eq!(registry.intensity("LHR-1"), Some(0.0));
    // the device stays registered
    assert!(registry.contains("LHR-1"));
}

#[tokio::test]
async fn backend_error_is_propagated() {
    let (backend, registry) = setup(100).await;
    backend.fail_with("LHR-1", DeviceError::Backend("usb stall".into()));

    assert_matches!(
        registry.set_intensity("LHR-1", 0.5).await,
        Err(DeviceError::Backend(_))
    );
    assert!(registry.contains("LHR-1"));
}

#[tokio::test]
async fn pulse_does_not_block_caller() {
    let (backend, registry) = setup(100).await;

    let started = tokio::time::Instant::now();
    registry.pulse("LHR-1", Duration::from_secs(5)).unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        backend.calls(),
        vec![BackendCall::Pulse {
            serial: "LHR-1".into(),
            duration: Duration::from_secs(5)
        }]
    );
}

#[tokio::test]
async fn pulse_unknown_serial_fails_synchronously() {
    let (backend, registry) = setup(100).await;
    assert_matches!(
        registry.pulse("nope", Duration::from_millis(10)),
        Err(DeviceError::NotFound(_))
    );
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn pulse_failure_is_logged() {
    let (logs, _guard) = tactile_logging::capture_logs();
    let (backend, registry) = setup(100).await;
    backend.fail_with("LHR-1", DeviceError::Backend("usb stall".into()));

    registry.pulse("LHR-1", Duration::from_millis(10)).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(logs.has_event(Level::WARN, "pulse failed"));
}

#[tokio::test]
async fn reenumeration_picks_up_hotplug() {
    let (backend, registry) = setup(100).await;
    backend.add_device(DeviceInfo::new(2, "LHR-3", "Tracker"));
    let _ = backend.remove_device("LHR-1");

    assert!(!registry.contains("LHR-3"));
    let list = registry.list_devices().await.unwrap();
    let serials: Vec<&str> = list.iter().map(|d| d.info.serial.as_str()).collect();
    assert_eq!(serials, ["LHR-2", "LHR-3"]);
}
