//! One bridged device: identity, mirror, services and background loops.

use crate::config::{Config, ReconcileConfig};
use crate::device::{DeviceApi, DeviceIdentity, GuardedDevice};
use crate::error::{BridgeError, Result};
use crate::events::EventBus;
use crate::polling::{PollContext, Poller, poll_state_once};
use crate::services::{ButtonCallback, ServiceContext, ServiceHost, ServiceRegistry};
use crate::state::StateMirror;
use crate::synchronizer::{ReconcileReport, ServiceSynchronizer};
use log::{error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct Accessory {
    name: String,
    identity: DeviceIdentity,
    mirror: Arc<StateMirror>,
    bus: Arc<EventBus>,
    sync: Arc<ServiceSynchronizer>,
    state_poller: Mutex<Option<Poller>>,
    reconcile: ReconcileConfig,
}

impl Accessory {
    /// Identify the device, resolve its topology, create the services and start polling.
    pub async fn connect(
        config: &Config,
        api: Arc<dyn DeviceApi>,
        host: Arc<dyn ServiceHost>,
        bus: Arc<EventBus>,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let device = Arc::new(GuardedDevice::new(api));
        let info = device.device_info().await?;
        let identity = DeviceIdentity::new(
            &info,
            config.device.address.clone(),
            config.device.token.clone(),
        );
        info!(
            "Connected to {} (MAC {}, firmware {}, hardware {}, {}, PIR {}, auth {})",
            identity,
            info.mac,
            info.firmware.as_deref().unwrap_or("unknown"),
            info.hardware.as_deref().unwrap_or("unknown"),
            info.dip,
            if info.has_pir { "present" } else { "absent" },
            if identity.has_token() { "bearer" } else { "none" }
        );

        let mirror = Arc::new(StateMirror::new());
        let poll_ctx = PollContext {
            device_id: identity.id().to_string(),
            device: device.clone(),
            mirror: mirror.clone(),
            bus: bus.clone(),
        };
        if !poll_state_once(&poll_ctx).await {
            warn!("{}: starting without device state; values fill in on the next poll", identity);
        }

        let ctx = Arc::new(ServiceContext {
            identity: identity.clone(),
            mirror: mirror.clone(),
            device,
            host,
        });
        let sync =
            ServiceSynchronizer::start(ctx, bus.clone(), &info, config.polling.motion_interval())
                .await?;
        let state_poller = Poller::state(poll_ctx, config.polling.state_interval());

        Ok(Arc::new(Self {
            name: config.device.name.clone(),
            identity,
            mirror,
            bus,
            sync,
            state_poller: Mutex::new(Some(state_poller)),
            reconcile: config.reconcile.clone(),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn mirror(&self) -> &Arc<StateMirror> {
        &self.mirror
    }

    pub fn registry(&self) -> &ServiceRegistry {
        self.sync.registry()
    }

    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        self.sync.reconcile().await
    }

    /// Reconcile at the configured cadence until cancelled, backing off on failures.
    pub async fn run_reconciliation(self: Arc<Self>, cancel: CancellationToken) {
        let mut backoff = Backoff::new(&self.reconcile);
        let mut wait = self.reconcile.interval();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(wait) => {}
            }

            let outcome = self.reconcile().await;
            if let Err(e) = &outcome {
                error!("[Sync] {}: reconciliation failed: {}", self.identity, e);
            }
            wait = backoff.after(&outcome);
            if backoff.is_backing_off() {
                info!("[Sync] {}: retrying in {:?}", self.identity, wait);
            }
        }
        info!("[Sync] {}: reconciliation stopped", self.identity);
    }

    /// Turn a button callback body into a `button-pressed` event.
    ///
    /// Returns the number of handlers that received the event.
    pub fn handle_button_callback(&self, body: &str) -> Result<usize> {
        let callback = ButtonCallback::parse(body)?;
        if !self.identity.matches(&callback.mac) {
            info!(
                "{}: callback for other device {} forwarded to the bus",
                self.identity, callback.mac
            );
        }
        Ok(self.bus.publish(&callback.into_event()))
    }

    /// Stop every loop and remove all services from the host.
    pub fn shutdown(&self) {
        if let Some(poller) = self.state_poller.lock().take() {
            poller.stop();
        }
        self.sync.clear();
        info!("{}: shut down", self.identity);
    }

    pub fn is_polling(&self) -> bool {
        self.state_poller
            .lock()
            .as_ref()
            .is_some_and(Poller::is_running)
    }
}

/// Delay schedule for reconciliation: the normal interval after success,
/// doubling delays from the initial backoff up to the cap after a failure.
#[derive(Debug, Clone)]
pub struct Backoff {
    interval: Duration,
    initial: Duration,
    max: Duration,
    current: Option<Duration>,
}

impl Backoff {
    pub fn new(config: &ReconcileConfig) -> Self {
        Self {
            interval: config.interval(),
            initial: config.initial_backoff(),
            max: config.max_backoff(),
            current: None,
        }
    }

    /// Delay before the next attempt given the outcome of the last one.
    pub fn after<T>(&mut self, outcome: &Result<T>) -> Duration {
        match outcome {
            Ok(_) | Err(BridgeError::UnsupportedReconfiguration { .. }) => {
                self.current = None;
                self.interval
            }
            Err(_) => {
                let next = match self.current {
                    None => self.initial,
                    Some(current) => (current * 2).min(self.max),
                };
                self.current = Some(next);
                next
            }
        }
    }

    pub fn is_backing_off(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ReadEndpoint;
    use crate::device::fake::{FAKE_MAC, FakeDevice};
    use crate::services::host::RecordingHost;
    use crate::services::{Characteristic, ServiceId};
    use crate::state::ButtonAction;
    use crate::topology::DipConfiguration;

    fn config() -> Config {
        let mut config = Config::default();
        config.device.address = "127.0.0.1".into();
        config.reconcile.interval_secs = 60;
        config
    }

    async fn connect(fake: &Arc<FakeDevice>) -> (Arc<Accessory>, Arc<RecordingHost>) {
        let host = Arc::new(RecordingHost::default());
        let accessory = Accessory::connect(&config(), fake.clone(), host.clone(), EventBus::new())
            .await
            .unwrap();
        (accessory, host)
    }

    #[test]
    fn test_backoff_schedule() {
        let mut backoff = Backoff::new(&config().reconcile);
        let failed: Result<()> = Err(BridgeError::HttpStatus {
            endpoint: "/api/v1/device".into(),
            status: 503,
        });

        let delays: Vec<u64> = (0..11).map(|_| backoff.after(&failed).as_secs()).collect();
        assert_eq!(delays, vec![10, 20, 40, 80, 160, 320, 640, 1280, 2560, 3600, 3600]);
        assert!(backoff.is_backing_off());

        assert_eq!(backoff.after(&Ok(())), Duration::from_secs(60));
        assert!(!backoff.is_backing_off());
        assert_eq!(backoff.after(&failed), Duration::from_secs(10));

        let unsupported: Result<()> = Err(BridgeError::UnsupportedReconfiguration {
            previous: DipConfiguration::FourDimmers,
            current: DipConfiguration::TwoBlinds,
        });
        assert_eq!(backoff.after(&unsupported), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_connect_builds_services_and_polls() {
        let fake = Arc::new(FakeDevice::standard());
        let (accessory, host) = connect(&fake).await;

        assert_eq!(accessory.identity().id(), "SN-TEST-1");
        assert!(accessory.mirror().is_populated());
        assert!(accessory.is_polling());
        assert!(accessory.registry().contains(ServiceId::Motion));
        assert_eq!(accessory.registry().active_pollers(), 1);
        assert_eq!(host.service_ids().len(), 12);

        accessory.shutdown();
        assert!(!accessory.is_polling());
        assert!(accessory.registry().is_empty());
        assert!(host.service_ids().is_empty());
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_config() {
        let fake = Arc::new(FakeDevice::standard());
        let host = Arc::new(RecordingHost::default());
        let result = Accessory::connect(&Config::default(), fake, host, EventBus::new()).await;
        assert!(matches!(result, Err(BridgeError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_button_callback_reaches_service() {
        let fake = Arc::new(FakeDevice::standard());
        let (accessory, host) = connect(&fake).await;
        host.clear_updates();

        let body = format!("mac={FAKE_MAC}&index=2&action=3");
        assert_eq!(accessory.handle_button_callback(&body).unwrap(), 4);
        assert_eq!(
            host.updates_for(ServiceId::Button(2)),
            vec![Characteristic::ProgrammableSwitchEvent(ButtonAction::LongPress)]
        );
        assert_eq!(
            accessory.registry().button(2).unwrap().get_last_action(),
            Some(ButtonAction::LongPress)
        );

        assert!(accessory.handle_button_callback("mac=x&index=9&action=1").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconciliation_backs_off_on_transport_errors() {
        let fake = Arc::new(FakeDevice::standard());
        fake.set_device(3, false);
        let (accessory, _host) = connect(&fake).await;
        fake.fail_reads(ReadEndpoint::Device, true);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(accessory.clone().run_reconciliation(cancel.clone()));

        // connect read the device once; attempts follow at 60s, 70s, 90s, 130s
        tokio::time::sleep(Duration::from_secs(65)).await;
        assert_eq!(fake.read_count(ReadEndpoint::Device), 2);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fake.read_count(ReadEndpoint::Device), 3);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(fake.read_count(ReadEndpoint::Device), 4);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fake.read_count(ReadEndpoint::Device), 4);

        cancel.cancel();
        task.await.unwrap();
        accessory.shutdown();
    }
}
