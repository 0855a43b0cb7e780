//! Response bodies of the dingz REST API (`/api/v1/...`).
//!
//! Fields the bridge does not use are ignored; everything optional on the
//! wire is `#[serde(default)]` so firmware differences don't fail a poll.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `GET /api/v1/device`: a single entry keyed by the device MAC.
pub type DeviceInfoResponse = HashMap<String, DeviceInfoEntry>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceInfoEntry {
    /// Front module serial number
    #[serde(default)]
    pub front_sn: Option<String>,

    /// Raw DIP switch value (0..=3)
    pub dip_config: u8,

    /// Whether the front module carries a PIR motion sensor
    #[serde(default)]
    pub has_pir: bool,

    #[serde(default)]
    pub fw_version: Option<String>,

    #[serde(default)]
    pub hw_version: Option<String>,
}

/// `GET /api/v1/state`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateResponse {
    #[serde(default)]
    pub dimmers: Vec<DimmerStateDto>,
    #[serde(default)]
    pub blinds: Vec<BlindStateDto>,
    pub led: LedStateDto,
    pub sensors: SensorsDto,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelIndex {
    #[serde(default)]
    pub relative: u8,
    #[serde(default)]
    pub absolute: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DimmerStateDto {
    #[serde(default)]
    pub on: bool,
    /// Brightness 0..=100
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub index: Option<ChannelIndex>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindPositionDto {
    #[serde(default)]
    pub blind: u8,
    #[serde(default)]
    pub lamella: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlindStateDto {
    /// Current blind position 0..=100
    #[serde(default)]
    pub position: u8,
    /// Current lamella angle 0..=90
    #[serde(default)]
    pub lamella: u8,
    #[serde(default)]
    pub moving: Option<String>,
    /// Last commanded position, when the firmware reports it
    #[serde(default)]
    pub target: Option<BlindPositionDto>,
    #[serde(default)]
    pub index: Option<ChannelIndex>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedStateDto {
    #[serde(default)]
    pub on: bool,
    /// `"hue;saturation;value"`
    #[serde(default)]
    pub hsv: Option<String>,
    /// `"RRGGBB"`
    #[serde(default)]
    pub rgb: Option<String>,
    /// `"hsv"` or `"rgb"`
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorsDto {
    /// Compensated room temperature in °C
    #[serde(default)]
    pub room_temperature: Option<f64>,
    /// Ambient brightness in lux
    #[serde(default)]
    pub brightness: Option<f64>,
}

/// `GET /api/v1/motion`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MotionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub motion: bool,
}

/// `GET /api/v1/input_config`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfigResponse {
    #[serde(default)]
    pub inputs: Vec<InputConfigEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfigEntry {
    #[serde(default)]
    pub active: bool,
}

/// `GET /api/v1/dimmer_config`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DimmerConfigResponse {
    #[serde(default)]
    pub dimmers: Vec<DimmerConfigEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DimmerConfigEntry {
    #[serde(default)]
    pub name: Option<String>,
    /// `"halogen"`, `"led"`, `"non_dimmable"`, ...
    #[serde(default)]
    pub output: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_parses_with_missing_optionals() {
        let body = json!({
            "dimmers": [{ "on": true, "value": 42, "index": { "relative": 0, "absolute": 2 } }],
            "blinds": [{ "position": 30, "lamella": 45 }],
            "led": { "on": false, "hsv": "0;0;100", "mode": "hsv" },
            "sensors": { "room_temperature": 21.25 }
        });
        let state: StateResponse = serde_json::from_value(body).unwrap();
        assert_eq!(state.dimmers.len(), 1);
        assert_eq!(state.dimmers[0].value, 42.0);
        assert_eq!(state.blinds[0].target, None);
        assert_eq!(state.sensors.brightness, None);
    }

    #[test]
    fn test_state_requires_led_and_sensors() {
        let body = json!({ "dimmers": [], "blinds": [] });
        assert!(serde_json::from_value::<StateResponse>(body).is_err());
    }

    #[test]
    fn test_device_info_keyed_by_mac() {
        let body = json!({
            "F008D1C4E9A0": { "front_sn": "1234", "dip_config": 3, "has_pir": true }
        });
        let info: DeviceInfoResponse = serde_json::from_value(body).unwrap();
        let entry = &info["F008D1C4E9A0"];
        assert_eq!(entry.dip_config, 3);
        assert!(entry.has_pir);
    }
}
