//! Host-facing services.
//!
//! Each logical service (dimmer, window covering, LED, sensors, buttons)
//! exposes GET/SET handlers to the host and an update handler that pushes
//! mirrored values to the host when a bus event for its device arrives.

pub mod button;
pub mod cover;
pub mod dimmer;
pub mod host;
pub mod led;
pub mod registry;
pub mod sensors;

pub use button::{ButtonCallback, ButtonService};
pub use cover::CoverService;
pub use dimmer::DimmerService;
pub use host::{Characteristic, LoggingHost, ServiceHost};
pub use led::LedService;
pub use registry::{ServiceHandle, ServiceRecord, ServiceRegistry};
pub use sensors::{LightService, MotionService, TemperatureService};

use crate::device::{DeviceIdentity, GuardedDevice};
use crate::events::{BridgeEvent, EventBus, EventKind, Subscription};
use crate::state::StateMirror;
use std::fmt;
use std::sync::Arc;

/// Stable logical id of a service; the registry is keyed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceId {
    /// Dimmer D1..D4 (physical output number)
    Dimmer(u8),
    /// Window covering B0/B1
    Cover(u8),
    Led,
    Temperature,
    Motion,
    Light,
    /// Button 1..4
    Button(u8),
}

impl ServiceId {
    pub fn kind(self) -> ServiceKind {
        match self {
            Self::Dimmer(_) => ServiceKind::Lightbulb,
            Self::Cover(_) => ServiceKind::WindowCovering,
            Self::Led => ServiceKind::ColorLightbulb,
            Self::Temperature => ServiceKind::TemperatureSensor,
            Self::Motion => ServiceKind::MotionSensor,
            Self::Light => ServiceKind::LightSensor,
            Self::Button(_) => ServiceKind::StatelessSwitch,
        }
    }

    /// Name used when the device does not provide one.
    pub fn default_name(self) -> String {
        match self {
            Self::Dimmer(n) => format!("Dimmer D{n}"),
            Self::Cover(n) => format!("Blind B{n}"),
            Self::Led => "LED".to_string(),
            Self::Temperature => "Temperature".to_string(),
            Self::Motion => "Motion".to_string(),
            Self::Light => "Light".to_string(),
            Self::Button(n) => format!("Button {n}"),
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dimmer(n) => write!(f, "D{n}"),
            Self::Cover(n) => write!(f, "B{n}"),
            Self::Led => f.write_str("LED"),
            Self::Temperature => f.write_str("Temperature"),
            Self::Motion => f.write_str("Motion"),
            Self::Light => f.write_str("Light"),
            Self::Button(n) => write!(f, "Button{n}"),
        }
    }
}

/// Host service type, following the conventional smart-home service set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ServiceKind {
    Lightbulb,
    ColorLightbulb,
    WindowCovering,
    TemperatureSensor,
    MotionSensor,
    LightSensor,
    StatelessSwitch,
}

/// Collaborators every service handler needs.
pub struct ServiceContext {
    pub identity: DeviceIdentity,
    pub mirror: Arc<StateMirror>,
    pub device: Arc<GuardedDevice>,
    pub host: Arc<dyn ServiceHost>,
}

/// Update side of a service: reacts to bus events for its own device.
pub trait ServiceHandler: Send + Sync + 'static {
    fn id(&self) -> ServiceId;

    /// Event kind this service listens to.
    fn event_kind(&self) -> EventKind;

    /// Called for events of [`Self::event_kind`] that belong to this device.
    fn handle_event(&self, event: &BridgeEvent);
}

/// Subscribe a service to the bus, filtering to its own device.
///
/// The subscription holds only a weak reference to the service, so a removed
/// service is never kept alive (or updated) by the bus.
pub fn attach<S: ServiceHandler>(
    service: &Arc<S>,
    identity: &DeviceIdentity,
    bus: &Arc<EventBus>,
) -> Subscription {
    let weak = Arc::downgrade(service);
    let identity = identity.clone();
    bus.subscribe(service.event_kind(), move |event| {
        if !identity.matches(event.device()) {
            return;
        }
        if let Some(service) = weak.upgrade() {
            service.handle_event(event);
        }
    })
}
