use crate::topology::DipConfiguration;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Device request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Device returned {status} for {endpoint}")]
    HttpStatus { endpoint: String, status: u16 },

    #[error("Unexpected device response: {0}")]
    InvalidResponse(String),

    #[error("Inconsistent state: {0}")]
    InconsistentState(String),

    #[error("DIP configuration changed from {previous} to {current}; runtime re-topology is not implemented")]
    UnsupportedReconfiguration {
        previous: DipConfiguration,
        current: DipConfiguration,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

impl BridgeError {
    /// Network, timeout and non-2xx failures. Callers retry these on the next tick.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::HttpStatus { .. })
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
