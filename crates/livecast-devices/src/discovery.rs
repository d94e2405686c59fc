//! Platform device discovery.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::{debug, instrument};

use livecast_ipc::{DeviceDescriptor, DeviceType};

/// Whether the platform lets the application use a device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    /// Access granted.
    Granted,

    /// The user refused, or policy forbids access.
    Denied,

    /// The user has not been asked yet.
    NotDetermined,
}

impl Authorization {
    /// Returns true if access is granted.
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Platform hook for listing capture devices.
///
/// Implementations are provided by the host platform glue.
pub trait DeviceDiscovery: Send + Sync {
    /// Current authorization for a device type.
    fn authorization(&self, device_type: DeviceType) -> Authorization;

    /// Devices of this type that are currently present.
    fn devices(&self, device_type: DeviceType) -> Vec<DeviceDescriptor>;
}

/// In-memory discovery backed by a fixed device list.
///
/// Suitable for hosts that learn about devices out of band, and for tests.
/// Device types without an explicit authorization are granted.
pub struct StaticDiscovery {
    devices: RwLock<Vec<DeviceDescriptor>>,
    authorization: RwLock<HashMap<DeviceType, Authorization>>,
}

impl StaticDiscovery {
    /// Create a discovery over the given devices.
    pub fn new(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            devices: RwLock::new(devices),
            authorization: RwLock::new(HashMap::new()),
        }
    }

    /// Add a device (hotplug).
    pub fn add_device(&self, device: DeviceDescriptor) {
        debug!(id = %device.id, "Device added");
        self.devices.write().push(device);
    }

    /// Remove a device by id. Returns true if it was present.
    pub fn remove_device(&self, id: &str) -> bool {
        let mut devices = self.devices.write();
        let before = devices.len();
        devices.retain(|device| device.id != id);
        before != devices.len()
    }

    /// Override the authorization for a device type.
    pub fn set_authorization(&self, device_type: DeviceType, authorization: Authorization) {
        self.authorization.write().insert(device_type, authorization);
    }
}

impl Default for StaticDiscovery {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl DeviceDiscovery for StaticDiscovery {
    fn authorization(&self, device_type: DeviceType) -> Authorization {
        self.authorization
            .read()
            .get(&device_type)
            .copied()
            .unwrap_or(Authorization::Granted)
    }

    #[instrument(name = "static_discovery_devices", skip(self))]
    fn devices(&self, device_type: DeviceType) -> Vec<DeviceDescriptor> {
        let devices: Vec<_> = self
            .devices
            .read()
            .iter()
            .filter(|device| device.device_type == device_type)
            .cloned()
            .collect();

        debug!(count = devices.len(), "Enumerated devices");
        devices
    }
}
