//! Dimmer output service (D1..D4).
//!
//! Host writes update the mirror optimistically, then issue the device
//! write. The next poll overwrites the prediction with device truth.

use super::{Characteristic, ServiceContext, ServiceHandler, ServiceId};
use crate::device::WriteCommand;
use crate::events::{BridgeEvent, EventKind};
use crate::state::DimmerState;
use log::{info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct DimmerService {
    id: ServiceId,
    channel: u8,
    dimmable: AtomicBool,
    ctx: Arc<ServiceContext>,
}

impl DimmerService {
    pub fn new(id: ServiceId, channel: u8, dimmable: bool, ctx: Arc<ServiceContext>) -> Arc<Self> {
        Arc::new(Self {
            id,
            channel,
            dimmable: AtomicBool::new(dimmable),
            ctx,
        })
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn is_dimmable(&self) -> bool {
        self.dimmable.load(Ordering::SeqCst)
    }

    /// Switch between dimmable and on/off-only. Returns true if it changed.
    pub fn set_dimmable(&self, dimmable: bool) -> bool {
        self.dimmable.swap(dimmable, Ordering::SeqCst) != dimmable
    }

    fn mirrored(&self) -> Option<DimmerState> {
        let state = self.ctx.mirror.dimmer(self.channel);
        if state.is_none() {
            warn!(
                "[Dimmer] {} {}: no mirrored state for channel {}",
                self.ctx.identity, self.id, self.channel
            );
        }
        state
    }

    /// GET On
    pub fn get_on(&self) -> bool {
        self.mirrored().is_some_and(|d| d.on)
    }

    /// GET Brightness
    pub fn get_brightness(&self) -> u8 {
        self.mirrored().map_or(0, |d| d.level)
    }

    /// SET On
    pub async fn set_on(&self, on: bool) {
        let level = if self.is_dimmable() {
            self.mirrored().map(|d| d.level)
        } else {
            None
        };
        self.write(on, level).await;
    }

    /// SET Brightness. A level of 0 switches the output off.
    pub async fn set_brightness(&self, level: u8) {
        if !self.is_dimmable() {
            warn!("[Dimmer] {} {}: brightness write on non-dimmable output ignored", self.ctx.identity, self.id);
            return;
        }
        let level = level.min(100);
        self.write(level > 0, Some(level)).await;
    }

    async fn write(&self, on: bool, level: Option<u8>) {
        if let Err(e) = self.ctx.mirror.predict_dimmer(self.channel, on, level) {
            warn!("[Dimmer] {} {}: {}", self.ctx.identity, self.id, e);
            return;
        }

        let command = WriteCommand::Dimmer {
            channel: self.channel,
            on,
            level,
        };
        match self.ctx.device.write(command).await {
            Ok(()) => info!(
                "[Dimmer] {} {} -> {}{}",
                self.ctx.identity,
                self.id,
                if on { "on" } else { "off" },
                level.map(|l| format!(" @ {l}%")).unwrap_or_default()
            ),
            Err(e) => warn!("[Dimmer] {} {}: write failed: {}", self.ctx.identity, self.id, e),
        }
    }

    /// Push mirrored values to the host.
    pub fn refresh(&self) {
        let Some(state) = self.mirrored() else {
            return;
        };
        self.ctx.host.update(self.id, Characteristic::On(state.on));
        if self.is_dimmable() {
            self.ctx
                .host
                .update(self.id, Characteristic::Brightness(state.level));
        }
    }
}

impl ServiceHandler for DimmerService {
    fn id(&self) -> ServiceId {
        self.id
    }

    fn event_kind(&self) -> EventKind {
        EventKind::StateUpdated
    }

    fn handle_event(&self, _event: &BridgeEvent) {
        self.refresh();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::attach;
    use crate::services::testing::harness;

    #[tokio::test]
    async fn test_get_reads_mirror() {
        let h = harness().await;
        let d1 = DimmerService::new(ServiceId::Dimmer(1), 0, true, h.ctx.clone());
        assert!(d1.get_on());
        assert_eq!(d1.get_brightness(), 80);

        // Channel missing from the mirror degrades to defaults
        let ghost = DimmerService::new(ServiceId::Dimmer(4), 7, true, h.ctx.clone());
        assert!(!ghost.get_on());
        assert_eq!(ghost.get_brightness(), 0);
    }

    #[tokio::test]
    async fn test_set_brightness_predicts_and_writes() {
        let h = harness().await;
        let d2 = DimmerService::new(ServiceId::Dimmer(2), 1, true, h.ctx.clone());

        d2.set_brightness(35).await;
        assert!(d2.get_on());
        assert_eq!(d2.get_brightness(), 35);
        assert_eq!(
            h.fake.writes(),
            vec![WriteCommand::Dimmer {
                channel: 1,
                on: true,
                level: Some(35)
            }]
        );
    }

    #[tokio::test]
    async fn test_set_on_completes_when_write_fails() {
        let h = harness().await;
        h.fake.fail_writes(true);
        let d1 = DimmerService::new(ServiceId::Dimmer(1), 0, true, h.ctx.clone());

        d1.set_on(false).await;
        // Prediction stays until the next poll
        assert!(!d1.get_on());
        assert_eq!(h.fake.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_non_dimmable_sends_no_level() {
        let h = harness().await;
        let d3 = DimmerService::new(ServiceId::Dimmer(3), 2, false, h.ctx.clone());

        d3.set_brightness(50).await;
        assert!(h.fake.writes().is_empty());

        d3.set_on(true).await;
        assert_eq!(
            h.fake.writes(),
            vec![WriteCommand::Dimmer {
                channel: 2,
                on: true,
                level: None
            }]
        );
    }

    #[tokio::test]
    async fn test_write_to_missing_channel_is_noop() {
        let h = harness().await;
        let ghost = DimmerService::new(ServiceId::Dimmer(4), 9, true, h.ctx.clone());
        ghost.set_on(true).await;
        assert!(h.fake.writes().is_empty());
    }

    #[tokio::test]
    async fn test_state_update_pushes_to_host() {
        let h = harness().await;
        let d1 = DimmerService::new(ServiceId::Dimmer(1), 0, true, h.ctx.clone());
        let _sub = attach(&d1, &h.ctx.identity, &h.bus);

        h.bus.publish(&BridgeEvent::StateUpdated {
            device: h.ctx.identity.id().to_string(),
        });
        assert_eq!(
            h.host.updates_for(ServiceId::Dimmer(1)),
            vec![Characteristic::On(true), Characteristic::Brightness(80)]
        );

        // Events for other devices are ignored
        h.host.clear_updates();
        h.bus.publish(&BridgeEvent::StateUpdated {
            device: "someone-else".into(),
        });
        assert!(h.host.updates().is_empty());
    }
}
