//! Local mirror of live device state.

pub mod led;
pub mod mirror;

pub use led::{Hsv, LedMode, LedState};
pub use mirror::{
    ButtonAction, CoverPosition, DimmerState, PositionState, StateMirror, WindowCoveringState,
};
