//! Window covering service (B0/B1).
//!
//! Target and current are tracked separately: a host write only moves the
//! target, the current position follows the device through polling.

use super::{Characteristic, ServiceContext, ServiceHandler, ServiceId};
use crate::device::WriteCommand;
use crate::events::{BridgeEvent, EventKind};
use crate::state::{PositionState, WindowCoveringState};
use log::{info, warn};
use std::sync::Arc;

pub struct CoverService {
    id: ServiceId,
    channel: u8,
    ctx: Arc<ServiceContext>,
}

impl CoverService {
    pub fn new(id: ServiceId, channel: u8, ctx: Arc<ServiceContext>) -> Arc<Self> {
        Arc::new(Self { id, channel, ctx })
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    fn mirrored(&self) -> Option<WindowCoveringState> {
        let state = self.ctx.mirror.cover(self.channel);
        if state.is_none() {
            warn!(
                "[Cover] {} {}: no mirrored state for channel {}",
                self.ctx.identity, self.id, self.channel
            );
        }
        state
    }

    pub fn get_current_position(&self) -> u8 {
        self.mirrored().map_or(0, |c| c.current.blind)
    }

    pub fn get_target_position(&self) -> u8 {
        self.mirrored().map_or(0, |c| c.target.blind)
    }

    pub fn get_current_tilt(&self) -> u8 {
        self.mirrored().map_or(0, |c| c.current.lamella)
    }

    pub fn get_target_tilt(&self) -> u8 {
        self.mirrored().map_or(0, |c| c.target.lamella)
    }

    pub fn get_position_state(&self) -> PositionState {
        self.mirrored()
            .map_or(PositionState::Stopped, |c| c.position_state())
    }

    /// SET TargetPosition (0..=100)
    pub async fn set_target_position(&self, blind: u8) {
        self.write(Some(blind.min(100)), None).await;
    }

    /// SET TargetTilt (0..=90)
    pub async fn set_target_tilt(&self, lamella: u8) {
        self.write(None, Some(lamella.min(90))).await;
    }

    async fn write(&self, blind: Option<u8>, lamella: Option<u8>) {
        let cover = match self
            .ctx
            .mirror
            .predict_cover_target(self.channel, blind, lamella)
        {
            Ok(cover) => cover,
            Err(e) => {
                warn!("[Cover] {} {}: {}", self.ctx.identity, self.id, e);
                return;
            }
        };

        if blind.is_some() {
            self.ctx
                .host
                .update(self.id, Characteristic::TargetPosition(cover.target.blind));
        }
        if lamella.is_some() {
            self.ctx
                .host
                .update(self.id, Characteristic::TargetTilt(cover.target.lamella));
        }
        self.ctx
            .host
            .update(self.id, Characteristic::PositionState(cover.position_state()));

        let command = WriteCommand::Shade {
            channel: self.channel,
            blind,
            lamella,
        };
        match self.ctx.device.write(command).await {
            Ok(()) => info!(
                "[Cover] {} {} -> blind {:?} lamella {:?}",
                self.ctx.identity, self.id, blind, lamella
            ),
            Err(e) => warn!("[Cover] {} {}: write failed: {}", self.ctx.identity, self.id, e),
        }
    }

    pub fn refresh(&self) {
        let Some(cover) = self.mirrored() else {
            return;
        };
        let host = &self.ctx.host;
        host.update(self.id, Characteristic::CurrentPosition(cover.current.blind));
        host.update(self.id, Characteristic::TargetPosition(cover.target.blind));
        host.update(self.id, Characteristic::CurrentTilt(cover.current.lamella));
        host.update(self.id, Characteristic::TargetTilt(cover.target.lamella));
        host.update(self.id, Characteristic::PositionState(cover.position_state()));
    }
}

impl ServiceHandler for CoverService {
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
    use crate::services::testing::harness;

    #[tokio::test]
    async fn test_write_moves_target_only() {
        let h = harness().await;
        let b0 = CoverService::new(ServiceId::Cover(0), 0, h.ctx.clone());
        assert_eq!(b0.get_current_position(), 20);
        assert_eq!(b0.get_target_position(), 20);

        b0.set_target_position(75).await;
        assert_eq!(b0.get_target_position(), 75);
        assert_eq!(b0.get_current_position(), 20);
        assert_eq!(b0.get_position_state(), PositionState::Increasing);
        assert_eq!(
            h.fake.writes(),
            vec![WriteCommand::Shade {
                channel: 0,
                blind: Some(75),
                lamella: None
            }]
        );
    }

    #[tokio::test]
    async fn test_current_converges_on_next_poll() {
        let h = harness().await;
        let b1 = CoverService::new(ServiceId::Cover(1), 1, h.ctx.clone());
        b1.set_target_position(40).await;
        assert_eq!(b1.get_position_state(), PositionState::Decreasing);

        let mut body = crate::device::fake::state_body(&[]);
        body["blinds"][1]["position"] = serde_json::json!(40);
        h.fake.set_response(crate::device::ReadEndpoint::State, body);
        h.ctx.mirror.apply_state(&h.ctx.device.state().await.unwrap());

        assert_eq!(b1.get_current_position(), 40);
        assert_eq!(b1.get_position_state(), PositionState::Stopped);
    }

    #[tokio::test]
    async fn test_tilt_clamped() {
        let h = harness().await;
        let b0 = CoverService::new(ServiceId::Cover(0), 0, h.ctx.clone());
        b0.set_target_tilt(120).await;
        assert_eq!(b0.get_target_tilt(), 90);
        assert_eq!(b0.get_current_tilt(), 10);
        assert_eq!(
            h.host.updates_for(ServiceId::Cover(0)),
            vec![
                Characteristic::TargetTilt(90),
                Characteristic::PositionState(PositionState::Stopped)
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_write_still_completes() {
        let h = harness().await;
        h.fake.fail_writes(true);
        let b0 = CoverService::new(ServiceId::Cover(0), 0, h.ctx.clone());
        b0.set_target_position(0).await;
        assert_eq!(b0.get_target_position(), 0);
    }

    #[tokio::test]
    async fn test_failed_write_settles_after_stopped_poll() {
        let h = harness().await;
        h.fake.fail_writes(true);
        let b0 = CoverService::new(ServiceId::Cover(0), 0, h.ctx.clone());
        b0.set_target_position(0).await;
        assert_eq!(b0.get_position_state(), PositionState::Decreasing);

        let mut body = crate::device::fake::state_body(&[]);
        body["blinds"][0]["moving"] = serde_json::json!("stop");
        h.fake.set_response(crate::device::ReadEndpoint::State, body);
        for _ in 0..3 {
            h.ctx.mirror.apply_state(&h.ctx.device.state().await.unwrap());
        }

        assert_eq!(b0.get_current_position(), 20);
        assert_eq!(b0.get_target_position(), 20);
        assert_eq!(b0.get_position_state(), PositionState::Stopped);
    }
}
