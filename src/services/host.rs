//! Seam to the smart-home host's service/characteristic model.
//!
//! The host binding itself lives outside this crate. Implement
//! [`ServiceHost`] to connect the bridge to a concrete host; the bridge calls
//! it to create and remove services and to push characteristic values.

use super::{ServiceId, ServiceKind};
use crate::state::{ButtonAction, PositionState};
use log::{debug, info};

/// A host-visible characteristic value.
#[derive(Debug, Clone, PartialEq)]
pub enum Characteristic {
    On(bool),
    /// Percent 0..=100
    Brightness(u8),
    /// Degrees 0..360
    Hue(f64),
    /// Percent 0..=100
    Saturation(f64),
    CurrentPosition(u8),
    TargetPosition(u8),
    /// Lamella angle 0..=90
    CurrentTilt(u8),
    TargetTilt(u8),
    PositionState(PositionState),
    /// °C
    CurrentTemperature(f64),
    /// Lux
    AmbientLightLevel(f64),
    MotionDetected(bool),
    ProgrammableSwitchEvent(ButtonAction),
}

/// Host registration and update API.
///
/// Calls are synchronous and must not block; implementations queue work if
/// their host needs asynchronous I/O.
pub trait ServiceHost: Send + Sync + 'static {
    fn add_service(&self, id: ServiceId, kind: ServiceKind, name: &str);

    fn remove_service(&self, id: ServiceId);

    fn rename_service(&self, id: ServiceId, name: &str);

    /// Add or remove the brightness characteristic of a dimmer service.
    fn set_brightness_control(&self, id: ServiceId, enabled: bool);

    /// Push a new value for one characteristic of a service.
    fn update(&self, id: ServiceId, value: Characteristic);
}

/// Host that only logs. Used by the standalone binary.
pub struct LoggingHost {
    accessory: String,
}

impl LoggingHost {
    pub fn new(accessory: impl Into<String>) -> Self {
        Self {
            accessory: accessory.into(),
        }
    }
}

impl ServiceHost for LoggingHost {
    fn add_service(&self, id: ServiceId, kind: ServiceKind, name: &str) {
        info!("[Host] {}: added {} service {} \"{}\"", self.accessory, kind, id, name);
    }

    fn remove_service(&self, id: ServiceId) {
        info!("[Host] {}: removed service {}", self.accessory, id);
    }

    fn rename_service(&self, id: ServiceId, name: &str) {
        info!("[Host] {}: {} renamed to \"{}\"", self.accessory, id, name);
    }

    fn set_brightness_control(&self, id: ServiceId, enabled: bool) {
        debug!(
            "[Host] {}: {} brightness control {}",
            self.accessory,
            id,
            if enabled { "enabled" } else { "disabled" }
        );
    }

    fn update(&self, id: ServiceId, value: Characteristic) {
        debug!("[Host] {}: {} <- {:?}", self.accessory, id, value);
    }
}

#[cfg(test)]
pub(crate) use recording::RecordingHost;
