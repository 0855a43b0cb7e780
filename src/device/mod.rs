//! Device client for the dingz REST API.
//!
//! [`DeviceApi`] is the transport seam, [`HttpDeviceClient`] the `reqwest`
//! implementation and [`GuardedDevice`] the typed access layer that
//! serialises the shared read endpoints.

pub mod api;
#[cfg(test)]
pub(crate) mod fake;
pub mod guard;
pub mod http;
pub mod identity;
pub mod models;

pub use api::{DeviceApi, ReadEndpoint, WriteCommand};
pub use guard::GuardedDevice;
pub use http::HttpDeviceClient;
pub use identity::{DeviceIdentity, DeviceInfo};
