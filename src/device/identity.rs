use super::models::DeviceInfoResponse;
use crate::error::{BridgeError, Result};
use crate::topology::DipConfiguration;
use std::fmt;

/// Parsed `/api/v1/device` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub mac: String,
    pub serial: Option<String>,
    pub dip: DipConfiguration,
    pub has_pir: bool,
    pub firmware: Option<String>,
    pub hardware: Option<String>,
}

impl DeviceInfo {
    pub fn from_response(response: DeviceInfoResponse) -> Result<Self> {
        if response.len() != 1 {
            return Err(BridgeError::InvalidResponse(format!(
                "device info has {} entries, expected 1",
                response.len()
            )));
        }
        let Some((mac, entry)) = response.into_iter().next() else {
            return Err(BridgeError::InvalidResponse("empty device info".into()));
        };
        let dip = DipConfiguration::from_raw(entry.dip_config).ok_or_else(|| {
            BridgeError::InvalidResponse(format!("unknown dip_config {}", entry.dip_config))
        })?;

        Ok(Self {
            mac: normalize_mac(&mac),
            serial: entry.front_sn.filter(|s| !s.trim().is_empty()),
            dip,
            has_pir: entry.has_pir,
            firmware: entry.fw_version,
            hardware: entry.hw_version,
        })
    }

    /// Stable identifier: front serial number, MAC as fallback.
    pub fn identifier(&self) -> &str {
        self.serial.as_deref().unwrap_or(&self.mac)
    }
}

/// Hex digits of a MAC in upper case, whatever the separator notation.
pub fn normalize_mac(mac: &str) -> String {
    mac.chars()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Who we are talking to. Immutable after construction.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    id: String,
    mac: String,
    address: String,
    token: Option<String>,
}

impl DeviceIdentity {
    pub fn new(info: &DeviceInfo, address: impl Into<String>, token: Option<String>) -> Self {
        Self {
            id: info.identifier().to_string(),
            mac: info.mac.clone(),
            address: address.into(),
            token,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn mac(&self) -> &str {
        &self.mac
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether requests carry a bearer token.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Whether an event source string refers to this device (id or MAC, any MAC notation).
    pub fn matches(&self, source: &str) -> bool {
        source == self.id || normalize_mac(source) == self.mac
    }
}

impl fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceIdentity")
            .field("id", &self.id)
            .field("mac", &self.mac)
            .field("address", &self.address)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.address)
    }
}
