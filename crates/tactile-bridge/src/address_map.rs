//! Protocol address to device resolution.

use std::collections::{BTreeMap, HashMap};

use tactile_settings::DeviceMapping;

/// A device driven by an address.
#[derive(Clone, Debug, PartialEq)]
pub struct MappedDevice {
    /// Device serial.
    pub serial: String,
    /// Factor applied to the event value.
    pub multiplier: f32,
}

/// Immutable mapping built from one settings snapshot.
///
/// Several serials may share an address; an event on that address drives
/// all of them.
#[derive(Clone, Debug, Default)]
pub struct AddressMap {
    by_address: HashMap<String, Vec<MappedDevice>>,
    by_serial: HashMap<String, String>,
}

impl AddressMap {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the settings mapping table.
    ///
    /// Blank addresses are skipped. Invalid multipliers fall back to `1.0`.
    pub fn from_settings(mappings: &BTreeMap<String, DeviceMapping>) -> Self {
        mappings
            .iter()
            .fold(Self::new(), |map, (serial, mapping)| {
                map.with_mapping(serial, &mapping.address, mapping.effective_multiplier())
            })
    }

    /// Add one mapping.
    #[must_use]
    pub fn with_mapping(mut self, serial: &str, address: &str, multiplier: f32) -> Self {
        let address = address.trim();
        if serial.is_empty() || address.is_empty() {
            return self;
        }
        let multiplier = if multiplier.is_finite() && multiplier >= 0.0 {
            multiplier
        } else {
            1.0
        };

        if let Some(previous) = self.by_serial.insert(serial.to_string(), address.to_string()) {
            if let Some(devices) = self.by_address.get_mut(&previous) {
                devices.retain(|d| d.serial != serial);
                if devices.is_empty() {
                    let _ = self.by_address.remove(&previous);
                }
            }
        }
        self.by_address
            .entry(address.to_string())
            .or_default()
            .push(MappedDevice {
                serial: serial.to_string(),
                multiplier,
            });
        self
    }

    /// Every device mapped to `address`; empty when unmapped.
    pub fn resolve(&self, address: &str) -> &[MappedDevice] {
        self.by_address.get(address).map_or(&[], Vec::as_slice)
    }

    /// Address driving `serial`.
    pub fn address_of(&self, serial: &str) -> Option<&str> {
        self.by_serial.get(serial).map(String::as_str)
    }

    /// Multiplier applied to `serial`.
    pub fn multiplier_of(&self, serial: &str) -> Option<f32> {
        let address = self.address_of(serial)?;
        self.resolve(address)
            .iter()
            .find(|d| d.serial == serial)
            .map(|d| d.multiplier)
    }

    /// Mapped addresses, sorted.
    pub fn addresses(&self) -> Vec<&str> {
        let mut addresses: Vec<&str> = self.by_address.keys().map(String::as_str).collect();
        addresses.sort_unstable();
        addresses
    }

    /// Number of mapped devices.
    pub fn len(&self) -> usize {
        self.by_serial.len()
    }

    /// Whether nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.by_serial.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_map() -> BTreeMap<String, DeviceMapping> {
        BTreeMap::from([
            ("LHR-1".to_string(), DeviceMapping::new("/chest").with_multiplier(0.5)),
            ("LHR-2".to_string(), DeviceMapping::new("/chest")),
            ("LHR-3".to_string(), DeviceMapping::new("/back")),
            ("LHR-4".to_string(), DeviceMapping::new("  ")),
        ])
    }

    #[test]
    fn duplicate_address_fans_out() {
        let map = AddressMap::from_settings(&settings_map());
        let chest = map.resolve("/chest");
        assert_eq!(
            chest,
            [
                MappedDevice {
                    serial: "LHR-1".into(),
                    multiplier: 0.5
                },
                MappedDevice {
                    serial: "LHR-2".into(),
                    multiplier: 1.0
                },
            ]
        );
        assert_eq!(map.resolve("/back").len(), 1);
    }

    #[test]
    fn unmapped_address_resolves_empty() {
        let map = AddressMap::from_settings(&settings_map());
        assert!(map.resolve("/nowhere").is_empty());
        assert!(map.resolve("").is_empty());
    }

    #[test]
    fn blank_addresses_skipped() {
        let map = AddressMap::from_settings(&settings_map());
        assert_eq!(map.len(), 3);
        assert_eq!(map.address_of("LHR-4"), None);
        assert_eq!(map.addresses(), ["/back", "/chest"]);
    }

    #[test]
    fn lookups_by_serial() {
        let map = AddressMap::from_settings(&settings_map());
        assert_eq!(map.address_of("LHR-3"), Some("/back"));
        assert_eq!(map.multiplier_of("LHR-1"), Some(0.5));
        assert_eq!(map.multiplier_of("nope"), None);
    }

    #[test]
    fn remapping_a_serial_moves_it() {
        let map = AddressMap::new()
            .with_mapping("A", "/one", 1.0)
            .with_mapping("A", "/two", -3.0);
        assert!(map.resolve("/one").is_empty());
        assert_eq!(map.resolve("/two")[0].multiplier, 1.0);
        assert_eq!(map.addresses(), ["/two"]);
        assert_eq!(map.len(), 1);
    }
}
