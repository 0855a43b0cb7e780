//! dingz bridge library.
//!
//! Adapts a dingz multi-function wall device (dimmers, blinds, RGB LED, PIR,
//! light and temperature sensors, four buttons), reachable only through its
//! polled REST API, to a smart-home host's service model.

pub mod accessory;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod instance_lock;
pub mod polling;
pub mod services;
pub mod state;
pub mod synchronizer;
pub mod topology;

pub use accessory::Accessory;
pub use error::{BridgeError, Result};
