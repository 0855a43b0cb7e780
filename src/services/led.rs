//! Front RGB LED service.

use super::{Characteristic, ServiceContext, ServiceHandler, ServiceId};
use crate::device::WriteCommand;
use crate::events::{BridgeEvent, EventKind};
use crate::state::{Hsv, LedState};
use log::{info, warn};
use std::sync::Arc;

pub struct LedService {
    ctx: Arc<ServiceContext>,
}

impl LedService {
    pub fn new(ctx: Arc<ServiceContext>) -> Arc<Self> {
        Arc::new(Self { ctx })
    }

    fn mirrored(&self) -> Option<LedState> {
        let state = self.ctx.mirror.led();
        if state.is_none() {
            warn!("[LED] {}: LED state not yet known", self.ctx.identity);
        }
        state
    }

    fn color(&self) -> Hsv {
        self.mirrored().map(|led| led.color()).unwrap_or_default()
    }

    pub fn get_on(&self) -> bool {
        self.mirrored().is_some_and(|led| led.on)
    }

    pub fn get_hue(&self) -> f64 {
        self.color().hue
    }

    pub fn get_saturation(&self) -> f64 {
        self.color().saturation
    }

    pub fn get_brightness(&self) -> u8 {
        self.color().value.round() as u8
    }

    pub async fn set_on(&self, on: bool) {
        self.write(Some(on), None).await;
    }

    pub async fn set_hue(&self, hue: f64) {
        let c = self.color();
        self.write(None, Some(Hsv::new(hue, c.saturation, c.value)))
            .await;
    }

    pub async fn set_saturation(&self, saturation: f64) {
        let c = self.color();
        self.write(None, Some(Hsv::new(c.hue, saturation, c.value)))
            .await;
    }

    pub async fn set_brightness(&self, value: u8) {
        let c = self.color();
        self.write(None, Some(Hsv::new(c.hue, c.saturation, f64::from(value))))
            .await;
    }

    async fn write(&self, on: Option<bool>, color: Option<Hsv>) {
        let led = match self.ctx.mirror.predict_led(on, color) {
            Ok(led) => led,
            Err(e) => {
                warn!("[LED] {}: {}", self.ctx.identity, e);
                return;
            }
        };

        let command = WriteCommand::Led {
            on: led.on,
            color: led.color(),
        };
        match self.ctx.device.write(command).await {
            Ok(()) => info!(
                "[LED] {} -> {} {}",
                self.ctx.identity,
                if led.on { "on" } else { "off" },
                led.color().to_wire()
            ),
            Err(e) => warn!("[LED] {}: write failed: {}", self.ctx.identity, e),
        }
    }

    pub fn refresh(&self) {
        let Some(led) = self.mirrored() else {
            return;
        };
        let color = led.color();
        let host = &self.ctx.host;
        host.update(ServiceId::Led, Characteristic::On(led.on));
        host.update(ServiceId::Led, Characteristic::Hue(color.hue));
        host.update(ServiceId::Led, Characteristic::Saturation(color.saturation));
        host.update(
            ServiceId::Led,
            Characteristic::Brightness(color.value.round() as u8),
        );
    }
}

impl ServiceHandler for LedService {
    fn id(&self) -> ServiceId {
        ServiceId::Led
    }

    fn event_kind(&self) -> EventKind {
        EventKind::StateUpdated
    }

    fn handle_event(&self, _event: &BridgeEvent) {
        self.refresh();
    }
}
