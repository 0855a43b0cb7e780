//! In-memory mirror of the device state.
//!
//! Every host read path consults the mirror and every poll or push path
//! mutates it. A full-state poll is applied under a single write lock from a
//! completely parsed response, so readers never observe a half-applied poll.

use super::led::{Hsv, LedState};
use crate::device::models::{BlindStateDto, StateResponse};
use crate::error::{BridgeError, Result};
use crate::topology::OutputKind;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;

/// Button action reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ButtonAction {
    #[strum(serialize = "single-press")]
    SinglePress,
    #[strum(serialize = "double-press")]
    DoublePress,
    #[strum(serialize = "long-press")]
    LongPress,
}

impl ButtonAction {
    /// Device callback action codes: 1 single, 2 double, 3 long.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::SinglePress),
            2 => Some(Self::DoublePress),
            3 => Some(Self::LongPress),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimmerState {
    pub channel: u8,
    pub on: bool,
    /// Brightness 0..=100
    pub level: u8,
    pub output: Option<OutputKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoverPosition {
    /// Blind extension 0..=100
    pub blind: u8,
    /// Lamella angle 0..=90
    pub lamella: u8,
}

/// Direction of blind travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Decreasing,
    Increasing,
    Stopped,
}

impl PositionState {
    /// Map the firmware `moving` field: "up", "down" or "stop".
    pub fn from_moving(moving: &str) -> Option<Self> {
        match moving.trim().to_ascii_lowercase().as_str() {
            "up" => Some(Self::Increasing),
            "down" => Some(Self::Decreasing),
            "stop" | "stopped" => Some(Self::Stopped),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCoveringState {
    pub channel: u8,
    pub current: CoverPosition,
    pub target: CoverPosition,
    /// Travel reported by the last poll, cleared by a local prediction.
    pub moving: Option<PositionState>,
}

impl WindowCoveringState {
    /// Device-reported travel if known, else target vs current.
    pub fn position_state(&self) -> PositionState {
        if let Some(moving) = self.moving {
            return moving;
        }
        match self.target.blind.cmp(&self.current.blind) {
            std::cmp::Ordering::Less => PositionState::Decreasing,
            std::cmp::Ordering::Greater => PositionState::Increasing,
            std::cmp::Ordering::Equal => PositionState::Stopped,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct MirrorState {
    dimmers: Vec<DimmerState>,
    covers: Vec<WindowCoveringState>,
    outputs: HashMap<u8, OutputKind>,
    led: Option<LedState>,
    temperature: Option<f64>,
    brightness: Option<f64>,
    motion: bool,
    buttons: HashMap<u8, ButtonAction>,
    last_update: Option<DateTime<Utc>>,
}

/// Shared snapshot of device-reported state.
#[derive(Default)]
pub struct StateMirror {
    inner: RwLock<MirrorState>,
}

impl fmt::Debug for StateMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMirror")
            .field("state", &*self.inner.read())
            .finish()
    }
}

fn clamp_percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

impl StateMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether at least one full-state poll has been applied.
    pub fn is_populated(&self) -> bool {
        self.inner.read().last_update.is_some()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.inner.read().last_update
    }

    /// Overwrite dimmers, covers, LED, temperature and brightness from a
    /// fully parsed `/api/v1/state` response.
    ///
    /// Output tags come from the dimmer config, not the poll. Cover targets
    /// survive when the firmware reports neither a target nor a stopped blind.
    pub fn apply_state(&self, response: &StateResponse) {
        let mut state = self.inner.write();

        let dimmers = response
            .dimmers
            .iter()
            .enumerate()
            .map(|(position, dto)| {
                let channel = dto
                    .index
                    .as_ref()
                    .map_or(position as u8, |index| index.relative);
                DimmerState {
                    channel,
                    on: dto.on,
                    level: clamp_percent(dto.value),
                    output: state.outputs.get(&channel).copied(),
                }
            })
            .collect();

        let covers = response
            .blinds
            .iter()
            .enumerate()
            .map(|(position, dto)| cover_from_dto(&state.covers, position, dto))
            .collect();

        state.dimmers = dimmers;
        state.covers = covers;
        state.led = Some(LedState::from_dto(&response.led));
        state.temperature = response.sensors.room_temperature;
        state.brightness = response.sensors.brightness;
        state.last_update = Some(Utc::now());
    }

    pub fn dimmer(&self, channel: u8) -> Option<DimmerState> {
        self.inner
            .read()
            .dimmers
            .iter()
            .find(|d| d.channel == channel)
            .copied()
    }

    pub fn cover(&self, channel: u8) -> Option<WindowCoveringState> {
        self.inner
            .read()
            .covers
            .iter()
            .find(|c| c.channel == channel)
            .copied()
    }

    pub fn led(&self) -> Option<LedState> {
        self.inner.read().led.clone()
    }

    pub fn temperature(&self) -> Option<f64> {
        self.inner.read().temperature
    }

    pub fn brightness(&self) -> Option<f64> {
        self.inner.read().brightness
    }

    pub fn motion(&self) -> bool {
        self.inner.read().motion
    }

    /// Store a motion reading. Returns true if it differs from the mirrored value.
    pub fn set_motion(&self, motion: bool) -> bool {
        let mut state = self.inner.write();
        let changed = state.motion != motion;
        state.motion = motion;
        changed
    }

    pub fn record_button(&self, button: u8, action: ButtonAction) {
        self.inner.write().buttons.insert(button, action);
    }

    pub fn button(&self, button: u8) -> Option<ButtonAction> {
        self.inner.read().buttons.get(&button).copied()
    }

    /// Record the output kind from the dimmer config for a channel.
    pub fn set_dimmer_output(&self, channel: u8, output: Option<OutputKind>) {
        let mut state = self.inner.write();
        match output {
            Some(kind) => state.outputs.insert(channel, kind),
            None => state.outputs.remove(&channel),
        };
        if let Some(dimmer) = state.dimmers.iter_mut().find(|d| d.channel == channel) {
            dimmer.output = output;
        }
    }

    /// Locally predicted dimmer state after a host write.
    pub fn predict_dimmer(&self, channel: u8, on: bool, level: Option<u8>) -> Result<DimmerState> {
        let mut state = self.inner.write();
        let dimmer = state
            .dimmers
            .iter_mut()
            .find(|d| d.channel == channel)
            .ok_or_else(|| missing("dimmer", channel))?;
        dimmer.on = on;
        if let Some(level) = level {
            dimmer.level = level.min(100);
        }
        Ok(*dimmer)
    }

    /// Locally predicted cover target after a host write. `current` is untouched.
    pub fn predict_cover_target(
        &self,
        channel: u8,
        blind: Option<u8>,
        lamella: Option<u8>,
    ) -> Result<WindowCoveringState> {
        let mut state = self.inner.write();
        let cover = state
            .covers
            .iter_mut()
            .find(|c| c.channel == channel)
            .ok_or_else(|| missing("window covering", channel))?;
        if let Some(blind) = blind {
            cover.target.blind = blind.min(100);
        }
        if let Some(lamella) = lamella {
            cover.target.lamella = lamella.min(90);
        }
        cover.moving = None;
        Ok(*cover)
    }

    /// Locally predicted LED state after a host write.
    pub fn predict_led(&self, on: Option<bool>, color: Option<Hsv>) -> Result<LedState> {
        let mut state = self.inner.write();
        let led = state
            .led
            .as_mut()
            .ok_or_else(|| BridgeError::InconsistentState("LED state not yet known".into()))?;
        if let Some(on) = on {
            led.on = on;
        }
        if let Some(color) = color {
            led.predict_color(color);
        }
        Ok(led.clone())
    }
}

fn missing(what: &str, channel: u8) -> BridgeError {
    BridgeError::InconsistentState(format!("no {what} state for channel {channel}"))
}

fn cover_from_dto(
    previous: &[WindowCoveringState],
    position: usize,
    dto: &BlindStateDto,
) -> WindowCoveringState {
    let channel = dto
        .index
        .as_ref()
        .map_or(position as u8, |index| index.relative);
    let current = CoverPosition {
        blind: dto.position.min(100),
        lamella: dto.lamella.min(90),
    };
    let moving = dto.moving.as_deref().and_then(PositionState::from_moving);
    let target = match (dto.target, moving) {
        (Some(target), _) => CoverPosition {
            blind: target.blind.min(100),
            lamella: target.lamella.min(90),
        },
        // A stopped blind is where it will stay
        (None, Some(PositionState::Stopped)) => current,
        (None, _) => previous
            .iter()
            .find(|c| c.channel == channel)
            .map_or(current, |c| c.target),
    };
    WindowCoveringState {
        channel,
        current,
        target,
        moving,
    }
}
