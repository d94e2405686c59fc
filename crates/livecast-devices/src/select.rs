//! Camera selection policy.

use tracing::debug;

use livecast_ipc::{DeviceDescriptor, DeviceType, Facing};

const FRONT_HINTS: &[&str] = &["front", "user", "selfie", "facetime"];
const BACK_HINTS: &[&str] = &["back", "rear", "environment", "world"];

/// Pick the camera facing the requested way.
///
/// Cameras reporting a structured position are matched on it. Cameras
/// without one fall back to a search of their friendly name, which is
/// fragile: names are localized and vendor specific.
pub fn select_camera(candidates: &[DeviceDescriptor], facing: Facing) -> Option<&DeviceDescriptor> {
    let cameras = || {
        candidates
            .iter()
            .filter(|device| device.device_type == DeviceType::Camera)
    };

    if let Some(device) = cameras().find(|device| device.facing == facing) {
        return Some(device);
    }

    let hints = match facing {
        Facing::Front => FRONT_HINTS,
        Facing::Back => BACK_HINTS,
        Facing::NotApplicable => return None,
    };

    let found = cameras()
        .filter(|device| device.facing == Facing::NotApplicable)
        .find(|device| {
            let name = device.friendly_name.to_lowercase();
            hints.iter().any(|hint| name.contains(hint))
        });

    if let Some(device) = found {
        debug!(
            id = %device.id,
            name = %device.friendly_name,
            facing = facing.name(),
            "Camera matched by name"
        );
    }

    found
}

/// Pick the device to attach at preview: the preferred camera position if
/// present, otherwise the first device listed.
pub fn select_default(candidates: &[DeviceDescriptor], preferred: Facing) -> Option<&DeviceDescriptor> {
    select_camera(candidates, preferred).or_else(|| candidates.first())
}
