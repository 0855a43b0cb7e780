//! The device REST surface as typed endpoints and commands.

use crate::error::Result;
use crate::state::led::Hsv;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Read endpoints (`GET`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadEndpoint {
    Device,
    State,
    Motion,
    InputConfig,
    DimmerConfig,
}

impl ReadEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Device => "/api/v1/device",
            Self::State => "/api/v1/state",
            Self::Motion => "/api/v1/motion",
            Self::InputConfig => "/api/v1/input_config",
            Self::DimmerConfig => "/api/v1/dimmer_config",
        }
    }
}

impl fmt::Display for ReadEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Write commands (`POST`).
#[derive(Debug, Clone, PartialEq)]
pub enum WriteCommand {
    /// `POST /api/v1/dimmer/{channel}/{on|off}[?value=level]`
    Dimmer {
        channel: u8,
        on: bool,
        level: Option<u8>,
    },
    /// `POST /api/v1/shade/{channel}/` with `blind=..&lamella=..`
    Shade {
        channel: u8,
        blind: Option<u8>,
        lamella: Option<u8>,
    },
    /// `POST /api/v1/led/set` with `action=..&color=h;s;v&mode=hsv&ramp=150`
    Led { on: bool, color: Hsv },
}

/// LED colour ramp in milliseconds sent with every LED write.
pub const LED_RAMP_MS: u32 = 150;

impl WriteCommand {
    pub fn path(&self) -> String {
        match self {
            Self::Dimmer { channel, on, level } => {
                let action = if *on { "on" } else { "off" };
                match level {
                    Some(level) => format!("/api/v1/dimmer/{channel}/{action}?value={level}"),
                    None => format!("/api/v1/dimmer/{channel}/{action}"),
                }
            }
            Self::Shade { channel, .. } => format!("/api/v1/shade/{channel}/"),
            Self::Led { .. } => "/api/v1/led/set".to_string(),
        }
    }

    /// Form-encoded body fields, in wire order.
    pub fn form(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Dimmer { .. } => Vec::new(),
            Self::Shade { blind, lamella, .. } => {
                let mut form = Vec::new();
                if let Some(blind) = blind {
                    form.push(("blind", blind.to_string()));
                }
                if let Some(lamella) = lamella {
                    form.push(("lamella", lamella.to_string()));
                }
                form
            }
            Self::Led { on, color } => vec![
                ("action", if *on { "on" } else { "off" }.to_string()),
                ("color", color.to_wire()),
                ("mode", "hsv".to_string()),
                ("ramp", LED_RAMP_MS.to_string()),
            ],
        }
    }
}

/// Transport seam to the physical device.
///
/// Implementations attach the auth token, perform the HTTP call and parse the
/// JSON body. They never cache or retry; a failure is a transport error and
/// retry policy belongs to the caller.
#[async_trait]
pub trait DeviceApi: Send + Sync + 'static {
    async fn read(&self, endpoint: ReadEndpoint) -> Result<Value>;

    async fn write(&self, command: WriteCommand) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimmer_paths() {
        let on = WriteCommand::Dimmer {
            channel: 2,
            on: true,
            level: Some(55),
        };
        assert_eq!(on.path(), "/api/v1/dimmer/2/on?value=55");
        assert!(on.form().is_empty());

        let off = WriteCommand::Dimmer {
            channel: 0,
            on: false,
            level: None,
        };
        assert_eq!(off.path(), "/api/v1/dimmer/0/off");
    }

    #[test]
    fn test_shade_omits_missing_fields() {
        let cmd = WriteCommand::Shade {
            channel: 1,
            blind: None,
            lamella: Some(45),
        };
        assert_eq!(cmd.path(), "/api/v1/shade/1/");
        assert_eq!(cmd.form(), vec![("lamella", "45".to_string())]);
    }

    #[test]
    fn test_led_form() {
        let cmd = WriteCommand::Led {
            on: true,
            color: Hsv::new(120.0, 50.0, 80.0),
        };
        assert_eq!(
            cmd.form(),
            vec![
                ("action", "on".to_string()),
                ("color", "120;50;80".to_string()),
                ("mode", "hsv".to_string()),
                ("ramp", "150".to_string()),
            ]
        );
    }
}
