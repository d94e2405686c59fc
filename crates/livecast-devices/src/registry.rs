//! Devices bound to a session.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use livecast_ipc::{DeviceDescriptor, DeviceType};

use crate::discovery::{Authorization, DeviceDiscovery};
use crate::error::DeviceError;
use crate::{DeviceResult, MUTED_GAIN, UNITY_GAIN};

/// A device currently bound into the session.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachedDevice {
    /// The bound device.
    pub descriptor: DeviceDescriptor,

    /// Input gain (0.0 - 1.0). Only meaningful for microphones.
    pub gain: f32,

    /// Whether the device feeds the session. Only meaningful for cameras.
    pub active: bool,
}

impl AttachedDevice {
    fn new(descriptor: DeviceDescriptor) -> Self {
        Self {
            descriptor,
            gain: UNITY_GAIN,
            active: true,
        }
    }

    /// Returns true if the gain is zero.
    pub fn is_muted(&self) -> bool {
        self.gain <= MUTED_GAIN
    }

    /// Device identifier.
    pub fn id(&self) -> &str {
        &self.descriptor.id
    }
}

/// Identifies one in-flight exchange. Tickets issued before
/// [`DeviceRegistry::release_all`] carry an older epoch and are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeTicket {
    /// Sequence number within the registry.
    pub id: u64,

    /// Registry epoch at issue time.
    pub epoch: u64,
}

/// An exchange waiting for the media engine's confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingExchange {
    pub ticket: ExchangeTicket,
    pub current: DeviceDescriptor,
    pub replacement: DeviceDescriptor,
}

/// Result of applying an exchange confirmation.
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeOutcome {
    /// The replacement is now attached.
    Applied(AttachedDevice),

    /// The engine refused; the previous device is still attached.
    Failed(DeviceError),

    /// The confirmation belongs to an exchange that no longer exists.
    Stale,
}

/// Tracks the devices bound to one session.
///
/// At most one device per [`DeviceType`] is attached at a time.
pub struct DeviceRegistry {
    discovery: Arc<dyn DeviceDiscovery>,
    attached: HashMap<DeviceType, AttachedDevice>,
    pending: Option<PendingExchange>,
    epoch: u64,
    next_ticket: u64,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new(discovery: Arc<dyn DeviceDiscovery>) -> Self {
        Self {
            discovery,
            attached: HashMap::new(),
            pending: None,
            epoch: 0,
            next_ticket: 0,
        }
    }

    /// List available devices of a type.
    #[instrument(name = "enumerate_devices", skip(self))]
    pub fn enumerate(&self, device_type: DeviceType) -> DeviceResult<Vec<DeviceDescriptor>> {
        match self.discovery.authorization(device_type) {
            Authorization::Granted => {}
            other => {
                return Err(DeviceError::DeviceUnavailable {
                    device_type,
                    reason: format!("access {}", authorization_name(other)),
                })
            }
        }

        Ok(self.discovery.devices(device_type))
    }

    /// Bind a device into the session.
    #[instrument(name = "attach_device", skip(self, descriptor), fields(id = %descriptor.id))]
    pub fn attach(&mut self, descriptor: DeviceDescriptor) -> DeviceResult<AttachedDevice> {
        let device_type = descriptor.device_type;

        if !self.discovery.authorization(device_type).is_granted() {
            return Err(DeviceError::PermissionDenied(device_type));
        }

        if self.attached.contains_key(&device_type) {
            return Err(DeviceError::AlreadyAttached(device_type));
        }

        let device = AttachedDevice::new(descriptor);
        info!(name = %device.descriptor.friendly_name, "Attached {}", device_type.name());
        self.attached.insert(device_type, device.clone());
        Ok(device)
    }

    /// Unbind the device of a type, if any.
    pub fn detach(&mut self, device_type: DeviceType) -> Option<AttachedDevice> {
        let device = self.attached.remove(&device_type)?;
        if self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.current.device_type == device_type)
        {
            self.pending = None;
        }
        debug!(id = %device.descriptor.id, "Detached {}", device_type.name());
        Some(device)
    }

    /// The device attached for a type.
    pub fn attached(&self, device_type: DeviceType) -> Option<&AttachedDevice> {
        self.attached.get(&device_type)
    }

    /// Snapshot of every attached device.
    pub fn attached_devices(&self) -> Vec<AttachedDevice> {
        let mut devices: Vec<_> = self.attached.values().cloned().collect();
        devices.sort_by(|a, b| a.descriptor.id.cmp(&b.descriptor.id));
        devices
    }

    /// The exchange waiting for confirmation, if any.
    pub fn pending_exchange(&self) -> Option<&PendingExchange> {
        self.pending.as_ref()
    }

    /// Current epoch. Advanced by [`release_all`](Self::release_all).
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Start replacing the attached device of the replacement's type.
    ///
    /// The current device stays attached until
    /// [`complete_exchange`](Self::complete_exchange) confirms the swap.
    #[instrument(name = "begin_exchange", skip(self, replacement), fields(id = %replacement.id))]
    pub fn begin_exchange(&mut self, replacement: DeviceDescriptor) -> DeviceResult<PendingExchange> {
        let device_type = replacement.device_type;

        if self.pending.is_some() {
            return Err(DeviceError::ExchangeInProgress);
        }

        if !self.discovery.authorization(device_type).is_granted() {
            return Err(DeviceError::PermissionDenied(device_type));
        }

        let current = self
            .attached
            .get(&device_type)
            .ok_or(DeviceError::NotAttached(device_type))?
            .descriptor
            .clone();

        let ticket = ExchangeTicket {
            id: self.next_ticket,
            epoch: self.epoch,
        };
        self.next_ticket += 1;

        let pending = PendingExchange {
            ticket,
            current,
            replacement,
        };

        debug!(
            from = %pending.current.id,
            to = %pending.replacement.id,
            ticket = ticket.id,
            "Exchange started"
        );

        self.pending = Some(pending.clone());
        Ok(pending)
    }

    /// Apply the media engine's confirmation for an exchange.
    pub fn complete_exchange(
        &mut self,
        ticket: ExchangeTicket,
        result: Result<(), String>,
    ) -> ExchangeOutcome {
        if ticket.epoch != self.epoch {
            debug!(ticket = ticket.id, "Ignoring exchange confirmation from a released epoch");
            return ExchangeOutcome::Stale;
        }

        let pending = match self.pending.take() {
            Some(pending) if pending.ticket == ticket => pending,
            other => {
                self.pending = other;
                debug!(ticket = ticket.id, "Ignoring confirmation for unknown exchange");
                return ExchangeOutcome::Stale;
            }
        };

        if let Err(reason) = result {
            warn!(
                from = %pending.current.id,
                to = %pending.replacement.id,
                "Exchange failed: {}",
                reason
            );
            return ExchangeOutcome::Failed(DeviceError::ExchangeFailed(reason));
        }

        let device_type = pending.replacement.device_type;
        let gain = self
            .attached
            .get(&device_type)
            .map(|device| device.gain)
            .unwrap_or(UNITY_GAIN);

        let mut device = AttachedDevice::new(pending.replacement);
        device.gain = gain;

        info!(
            from = %pending.current.id,
            to = %device.descriptor.id,
            "Exchanged {}",
            device_type.name()
        );

        self.attached.insert(device_type, device.clone());
        ExchangeOutcome::Applied(device)
    }

    /// Drop a pending exchange the media engine refused to start.
    pub fn abort_exchange(&mut self, ticket: ExchangeTicket) {
        if self
            .pending
            .as_ref()
            .is_some_and(|pending| pending.ticket == ticket)
        {
            self.pending = None;
        }
    }

    /// Set the attached microphone's gain (0.0 - 1.0).
    ///
    /// Without an attached microphone this does nothing and returns `None`;
    /// muting before a microphone is present is not an error.
    pub fn set_gain(&mut self, level: f32) -> Option<&AttachedDevice> {
        let level = level.clamp(MUTED_GAIN, UNITY_GAIN);

        match self.attached.get_mut(&DeviceType::Microphone) {
            Some(device) => {
                device.gain = level;
                debug!(id = %device.descriptor.id, gain = level, "Microphone gain set");
                Some(device)
            }
            None => {
                debug!(gain = level, "No microphone attached, gain not applied");
                None
            }
        }
    }

    /// Unbind everything and invalidate outstanding tickets.
    #[instrument(name = "release_devices", skip(self))]
    pub fn release_all(&mut self) -> Vec<AttachedDevice> {
        self.epoch += 1;
        self.pending = None;

        let mut released: Vec<_> = self.attached.drain().map(|(_, device)| device).collect();
        for device in &mut released {
            device.active = false;
        }

        info!(count = released.len(), epoch = self.epoch, "Released devices");
        released
    }
}

fn authorization_name(authorization: Authorization) -> &'static str {
    match authorization {
        Authorization::Granted => "granted",
        Authorization::Denied => "denied",
        Authorization::NotDetermined => "not yet granted",
    }
}
