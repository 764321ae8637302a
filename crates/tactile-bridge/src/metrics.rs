//! Metric names recorded by the dispatcher.

/// Events resolved to at least one device (counter).
pub const DISPATCH_EVENTS_TOTAL: &str = "dispatch_events_total";
/// Events whose address has no mapping (counter).
pub const DISPATCH_UNMAPPED_TOTAL: &str = "dispatch_unmapped_total";
/// Device commands that failed during dispatch (counter, labels: kind).
pub const DISPATCH_DEVICE_FAILURES_TOTAL: &str = "dispatch_device_failures_total";
