use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Load environment variables from a .env file.
/// Values may contain spaces without quotes; variables already set win.
///
/// Must run before any other thread exists, i.e. before the tokio runtime is built.
pub fn load_dotenv() {
    load_dotenv_from(Path::new(".env"));
}

fn load_dotenv_from(env_path: &Path) {
    let Ok(content) = fs::read_to_string(env_path) else {
        return;
    };

    for (key, value) in parse_dotenv(&content) {
        if std::env::var(key).is_err() {
            // SAFETY: only called from a plain `fn main` before the runtime is built, so no other thread reads the environment
            unsafe { std::env::set_var(key, value) };
        }
    }
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let mut value = value.trim();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }
            Some((key.trim(), value))
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub device: DeviceConfig,
    pub polling: PollingConfig,
    pub reconcile: ReconcileConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Host or IP of the device, optionally with scheme and port.
    pub address: String,
    /// Bearer token, if the device has API authentication enabled.
    pub token: Option<String>,
    /// Accessory display name.
    pub name: String,
}

impl std::fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("address", &self.address)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    pub state_interval_secs: u64,
    pub motion_interval_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    pub interval_secs: u64,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceConfig {
                address: String::new(),
                token: None,
                name: "dingz".to_string(),
            },
            polling: PollingConfig {
                state_interval_secs: 10,
                motion_interval_secs: 2,
                request_timeout_secs: 5,
            },
            reconcile: ReconcileConfig {
                interval_secs: 24 * 60 * 60,
                initial_backoff_secs: 10,
                max_backoff_secs: 60 * 60,
            },
        }
    }
}

impl PollingConfig {
    pub fn state_interval(&self) -> Duration {
        Duration::from_secs(self.state_interval_secs)
    }

    pub fn motion_interval(&self) -> Duration {
        Duration::from_secs(self.motion_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ReconcileConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_secs(self.initial_backoff_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(address) = std::env::var("DINGZ_ADDRESS") {
            config.device.address = address;
        }
        if let Ok(token) = std::env::var("DINGZ_TOKEN")
            && !token.is_empty()
        {
            config.device.token = Some(token);
        }
        if let Ok(name) = std::env::var("DINGZ_NAME") {
            config.device.name = name;
        }

        // Polling cadence
        if let Ok(secs) = std::env::var("DINGZ_STATE_INTERVAL")
            && let Ok(s) = secs.parse()
        {
            config.polling.state_interval_secs = s;
        }
        if let Ok(secs) = std::env::var("DINGZ_MOTION_INTERVAL")
            && let Ok(s) = secs.parse()
        {
            config.polling.motion_interval_secs = s;
        }
        if let Ok(secs) = std::env::var("DINGZ_RECONCILE_INTERVAL")
            && let Ok(s) = secs.parse()
        {
            config.reconcile.interval_secs = s;
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.device.address.trim().is_empty() {
            return Err(BridgeError::InvalidConfig("device address is empty".into()));
        }
        let intervals = [
            ("state poll interval", self.polling.state_interval_secs),
            ("motion poll interval", self.polling.motion_interval_secs),
            ("request timeout", self.polling.request_timeout_secs),
            ("reconcile interval", self.reconcile.interval_secs),
            ("reconcile backoff", self.reconcile.initial_backoff_secs),
        ];
        if let Some((what, _)) = intervals.iter().find(|(_, secs)| *secs == 0) {
            return Err(BridgeError::InvalidConfig(format!("{what} must be positive")));
        }
        if self.reconcile.max_backoff_secs < self.reconcile.initial_backoff_secs {
            return Err(BridgeError::InvalidConfig(
                "max backoff is shorter than the initial backoff".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_address(address: &str) -> Config {
        let mut config = Config::default();
        config.device.address = address.into();
        config
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.polling.state_interval(), Duration::from_secs(10));
        assert_eq!(config.polling.motion_interval(), Duration::from_secs(2));
        assert_eq!(config.reconcile.interval(), Duration::from_secs(86_400));
        assert_eq!(config.reconcile.max_backoff(), Duration::from_secs(3_600));
    }

    #[test]
    fn test_validate() {
        tokio_test::assert_ok!(with_address("192.168.1.40").validate());
        let err = tokio_test::assert_err!(Config::default().validate());
        assert!(matches!(err, BridgeError::InvalidConfig(_)));

        let mut config = with_address("192.168.1.40");
        config.polling.motion_interval_secs = 0;
        tokio_test::assert_err!(config.validate());

        let mut config = with_address("192.168.1.40");
        config.reconcile.max_backoff_secs = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_dotenv() {
        let parsed = parse_dotenv(
            "# comment\n\nDINGZ_ADDRESS = 10.0.0.7\nDINGZ_NAME=\"Living room\"\nDINGZ_TOKEN='abc'\nnot a pair\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("DINGZ_ADDRESS", "10.0.0.7"),
                ("DINGZ_NAME", "Living room"),
                ("DINGZ_TOKEN", "abc"),
            ]
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let mut config = with_address("10.0.0.7");
        config.device.token = Some("secret".into());
        assert!(!format!("{config:?}").contains("secret"));
    }
}
