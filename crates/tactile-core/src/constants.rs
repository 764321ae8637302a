//! Package-level constants.

/// Current version of the bridge (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "tactile";

/// Lowest intensity a device accepts.
pub const MIN_INTENSITY: f32 = 0.0;

/// Highest intensity a device accepts.
pub const MAX_INTENSITY: f32 = 1.0;
