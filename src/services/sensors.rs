//! Read-only sensor services: room temperature, ambient light and PIR motion.

use super::{Characteristic, ServiceContext, ServiceHandler, ServiceId};
use crate::events::{BridgeEvent, EventKind};
use log::{debug, warn};
use std::sync::Arc;

/// Smallest ambient light level hosts accept.
pub const MIN_LUX: f64 = 0.0001;

pub struct TemperatureService {
    ctx: Arc<ServiceContext>,
}

impl TemperatureService {
    pub fn new(ctx: Arc<ServiceContext>) -> Arc<Self> {
        Arc::new(Self { ctx })
    }

    /// GET CurrentTemperature in °C
    pub fn get_temperature(&self) -> f64 {
        self.ctx.mirror.temperature().unwrap_or_else(|| {
            warn!("[Sensor] {}: temperature not yet known", self.ctx.identity);
            0.0
        })
    }
}

impl ServiceHandler for TemperatureService {
    fn id(&self) -> ServiceId {
        ServiceId::Temperature
    }

    fn event_kind(&self) -> EventKind {
        EventKind::StateUpdated
    }

    fn handle_event(&self, _event: &BridgeEvent) {
        if let Some(celsius) = self.ctx.mirror.temperature() {
            self.ctx
                .host
                .update(ServiceId::Temperature, Characteristic::CurrentTemperature(celsius));
        }
    }
}

pub struct LightService {
    ctx: Arc<ServiceContext>,
}

impl LightService {
    pub fn new(ctx: Arc<ServiceContext>) -> Arc<Self> {
        Arc::new(Self { ctx })
    }

    /// GET CurrentAmbientLightLevel in lux
    pub fn get_ambient_light(&self) -> f64 {
        match self.ctx.mirror.brightness() {
            Some(lux) => lux.max(MIN_LUX),
            None => {
                warn!("[Sensor] {}: brightness not yet known", self.ctx.identity);
                MIN_LUX
            }
        }
    }
}

impl ServiceHandler for LightService {
    fn id(&self) -> ServiceId {
        ServiceId::Light
    }

    fn event_kind(&self) -> EventKind {
        EventKind::StateUpdated
    }

    fn handle_event(&self, _event: &BridgeEvent) {
        if let Some(lux) = self.ctx.mirror.brightness() {
            self.ctx
                .host
                .update(ServiceId::Light, Characteristic::AmbientLightLevel(lux.max(MIN_LUX)));
        }
    }
}

pub struct MotionService {
    ctx: Arc<ServiceContext>,
}

impl MotionService {
    pub fn new(ctx: Arc<ServiceContext>) -> Arc<Self> {
        Arc::new(Self { ctx })
    }

    /// GET MotionDetected
    pub fn get_motion_detected(&self) -> bool {
        self.ctx.mirror.motion()
    }

    /// Push the mirrored reading, so a freshly added service starts in sync.
    pub fn refresh(&self) {
        self.ctx.host.update(
            ServiceId::Motion,
            Characteristic::MotionDetected(self.get_motion_detected()),
        );
    }
}

impl ServiceHandler for MotionService {
    fn id(&self) -> ServiceId {
        ServiceId::Motion
    }

    fn event_kind(&self) -> EventKind {
        EventKind::MotionChanged
    }

    fn handle_event(&self, event: &BridgeEvent) {
        if let BridgeEvent::MotionChanged { detected, .. } = event {
            debug!("[Motion] {}: motion {}", self.ctx.identity, detected);
            self.ctx
                .host
                .update(ServiceId::Motion, Characteristic::MotionDetected(*detected));
        }
    }
}
