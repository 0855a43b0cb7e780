//! Typed device access with the read-serialising guard.
//!
//! The firmware can return incoherent composite reads when two GETs against
//! the shared read registers race. `state`, `motion` and `input_config`
//! therefore hold one async mutex for the duration of the network call.
//! Writes and the configuration reads are not guarded.

use super::api::{DeviceApi, ReadEndpoint, WriteCommand};
use super::identity::DeviceInfo;
use super::models::{
    DeviceInfoResponse, DimmerConfigResponse, InputConfigResponse, MotionResponse, StateResponse,
};
use crate::error::{BridgeError, Result};
use crate::topology::{DimmerMetadataSet, InputActivity};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct GuardedDevice {
    api: Arc<dyn DeviceApi>,
    read_lock: Mutex<()>,
}

impl GuardedDevice {
    pub fn new(api: Arc<dyn DeviceApi>) -> Self {
        Self {
            api,
            read_lock: Mutex::new(()),
        }
    }

    /// Read under the guard. The lock guard lives until the response is
    /// decoded and is released on every exit path, errors included.
    async fn guarded_read<T: DeserializeOwned>(&self, endpoint: ReadEndpoint) -> Result<T> {
        let _guard = self.read_lock.lock().await;
        let value = self.api.read(endpoint).await?;
        decode(endpoint, value)
    }

    async fn unguarded_read<T: DeserializeOwned>(&self, endpoint: ReadEndpoint) -> Result<T> {
        let value = self.api.read(endpoint).await?;
        decode(endpoint, value)
    }

    /// Identity, DIP setting and PIR presence.
    pub async fn device_info(&self) -> Result<DeviceInfo> {
        let response: DeviceInfoResponse = self.unguarded_read(ReadEndpoint::Device).await?;
        DeviceInfo::from_response(response)
    }

    /// Full device state (guarded).
    pub async fn state(&self) -> Result<StateResponse> {
        self.guarded_read(ReadEndpoint::State).await
    }

    /// PIR motion flag (guarded).
    pub async fn motion(&self) -> Result<bool> {
        let response: MotionResponse = self.guarded_read(ReadEndpoint::Motion).await?;
        if !response.success {
            return Err(BridgeError::InvalidResponse(
                "motion read reported success=false".to_string(),
            ));
        }
        Ok(response.motion)
    }

    /// Input-active flags (guarded).
    pub async fn input_config(&self) -> Result<InputActivity> {
        let response: InputConfigResponse = self.guarded_read(ReadEndpoint::InputConfig).await?;
        Ok(InputActivity::new(
            response.inputs.iter().map(|i| i.active).collect(),
        ))
    }

    /// Dimmer names and output kinds.
    pub async fn dimmer_config(&self) -> Result<DimmerMetadataSet> {
        let response: DimmerConfigResponse =
            self.unguarded_read(ReadEndpoint::DimmerConfig).await?;
        Ok(DimmerMetadataSet::from(&response))
    }

    pub async fn write(&self, command: WriteCommand) -> Result<()> {
        self.api.write(command).await
    }
}

fn decode<T: DeserializeOwned>(endpoint: ReadEndpoint, value: serde_json::Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| BridgeError::InvalidResponse(format!("{endpoint}: {e}")))
}
