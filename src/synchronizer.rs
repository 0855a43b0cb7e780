//! Keeps the registered services in line with the device's topology.
//!
//! At startup the topology is resolved once and exactly the services it names
//! are created. Reconciliation re-reads the device configuration and applies
//! the small set of changes the bridge supports at runtime: PIR appearing or
//! disappearing, the D1 slot coming and going with input 0, and dimmer names
//! and output kinds. A changed DIP switch is reported, never applied.

use crate::device::DeviceInfo;
use crate::error::{BridgeError, Result};
use crate::events::EventBus;
use crate::polling::{PollContext, Poller};
use crate::services::button::BUTTON_COUNT;
use crate::services::{
    ButtonService, CoverService, DimmerService, LedService, LightService, MotionService,
    ServiceContext, ServiceHandle, ServiceId, ServiceRecord, ServiceRegistry, TemperatureService,
    attach,
};
use crate::topology::{self, DimmerMetadataSet, DipConfiguration, InputActivity, OutputSlot, SlotKind};
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// What a reconciliation pass changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<ServiceId>,
    pub removed: Vec<ServiceId>,
    pub relabeled: Vec<ServiceId>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.relabeled.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct Applied {
    dip: DipConfiguration,
    has_pir: bool,
}

pub struct ServiceSynchronizer {
    ctx: Arc<ServiceContext>,
    bus: Arc<EventBus>,
    registry: ServiceRegistry,
    motion_interval: Duration,
    applied: Mutex<Applied>,
    reconciling: tokio::sync::Mutex<()>,
}

impl ServiceSynchronizer {
    /// Read the input and dimmer configuration and create the initial service set.
    pub async fn start(
        ctx: Arc<ServiceContext>,
        bus: Arc<EventBus>,
        info: &DeviceInfo,
        motion_interval: Duration,
    ) -> Result<Arc<Self>> {
        let inputs = ctx.device.input_config().await?;
        let metadata = ctx.device.dimmer_config().await?;
        Ok(Self::build(ctx, bus, info, &inputs, &metadata, motion_interval))
    }

    /// Create exactly the services the resolved topology names, plus the fixed ones.
    pub fn build(
        ctx: Arc<ServiceContext>,
        bus: Arc<EventBus>,
        info: &DeviceInfo,
        inputs: &InputActivity,
        metadata: &DimmerMetadataSet,
        motion_interval: Duration,
    ) -> Arc<Self> {
        let sync = Arc::new(Self {
            registry: ServiceRegistry::new(ctx.host.clone()),
            ctx,
            bus,
            motion_interval,
            applied: Mutex::new(Applied {
                dip: info.dip,
                has_pir: info.has_pir,
            }),
            reconciling: tokio::sync::Mutex::new(()),
        });

        let topology = topology::resolve(info.dip, inputs, metadata);
        info!(
            "[Sync] {}: {} with {} output service(s)",
            sync.ctx.identity,
            info.dip,
            topology.slots.len()
        );
        for slot in &topology.slots {
            sync.add_output(slot, metadata);
        }

        sync.add_fixed();
        if info.has_pir {
            sync.add_motion();
        }
        sync
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn dip(&self) -> DipConfiguration {
        self.applied.lock().dip
    }

    pub fn has_pir(&self) -> bool {
        self.applied.lock().has_pir
    }

    /// Re-read the device configuration and apply supported changes.
    ///
    /// A DIP change yields [`BridgeError::UnsupportedReconfiguration`] and
    /// leaves every service untouched. Passes never overlap.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let _serial = self.reconciling.lock().await;

        let info = self.ctx.device.device_info().await?;
        let inputs = self.ctx.device.input_config().await?;
        let metadata = self.ctx.device.dimmer_config().await?;

        if !self.ctx.identity.matches(info.identifier()) {
            return Err(BridgeError::InconsistentState(format!(
                "device at {} now reports itself as {}",
                self.ctx.identity.address(),
                info.identifier()
            )));
        }

        let applied = *self.applied.lock();
        if info.dip != applied.dip {
            return Err(BridgeError::UnsupportedReconfiguration {
                previous: applied.dip,
                current: info.dip,
            });
        }

        let mut report = ReconcileReport::default();

        if info.has_pir != applied.has_pir {
            if info.has_pir {
                self.add_motion();
                report.added.push(ServiceId::Motion);
            } else {
                if self.registry.remove(ServiceId::Motion) {
                    report.removed.push(ServiceId::Motion);
                }
                // No sensor, no motion
                self.ctx.mirror.set_motion(false);
            }
            self.applied.lock().has_pir = info.has_pir;
        }

        let desired = topology::resolve(info.dip, &inputs, &metadata);

        for id in self.registry.ids() {
            if is_output(id) && !desired.contains(id) {
                self.registry.remove(id);
                report.removed.push(id);
            }
        }

        for slot in &desired.slots {
            if !self.registry.contains(slot.id) {
                self.add_output(slot, &metadata);
                report.added.push(slot.id);
            } else if slot.kind == SlotKind::Dimmer && self.relabel_dimmer(slot, &metadata) {
                report.relabeled.push(slot.id);
            }
        }

        if report.is_empty() {
            info!("[Sync] {}: topology unchanged", self.ctx.identity);
        } else {
            info!(
                "[Sync] {}: added {:?}, removed {:?}, relabeled {:?}",
                self.ctx.identity, report.added, report.removed, report.relabeled
            );
        }
        Ok(report)
    }

    /// Remove every service and stop the motion loop.
    pub fn clear(&self) {
        self.registry.clear();
    }

    fn add_output(&self, slot: &OutputSlot, metadata: &DimmerMetadataSet) {
        let name = slot.name.clone().unwrap_or_else(|| slot.id.default_name());
        match slot.kind {
            SlotKind::Dimmer => {
                if let ServiceId::Dimmer(number) = slot.id {
                    self.ctx
                        .mirror
                        .set_dimmer_output(slot.channel, metadata.for_dimmer(number).output);
                }
                let dimmer = DimmerService::new(slot.id, slot.channel, slot.dimmable, self.ctx.clone());
                let subscription = attach(&dimmer, &self.ctx.identity, &self.bus);
                self.registry.insert(ServiceRecord::new(
                    slot.id,
                    name,
                    ServiceHandle::Dimmer(dimmer.clone()),
                    subscription,
                ));
                self.ctx.host.set_brightness_control(slot.id, slot.dimmable);
                dimmer.refresh();
            }
            SlotKind::Cover => {
                let cover = CoverService::new(slot.id, slot.channel, self.ctx.clone());
                let subscription = attach(&cover, &self.ctx.identity, &self.bus);
                self.registry.insert(ServiceRecord::new(
                    slot.id,
                    name,
                    ServiceHandle::Cover(cover.clone()),
                    subscription,
                ));
                cover.refresh();
            }
        }
    }

    fn add_fixed(&self) {
        let led = LedService::new(self.ctx.clone());
        let subscription = attach(&led, &self.ctx.identity, &self.bus);
        self.register(ServiceId::Led, ServiceHandle::Led(led), subscription);

        let temperature = TemperatureService::new(self.ctx.clone());
        let subscription = attach(&temperature, &self.ctx.identity, &self.bus);
        self.register(
            ServiceId::Temperature,
            ServiceHandle::Temperature(temperature),
            subscription,
        );

        let light = LightService::new(self.ctx.clone());
        let subscription = attach(&light, &self.ctx.identity, &self.bus);
        self.register(ServiceId::Light, ServiceHandle::Light(light), subscription);

        for button in 1..=BUTTON_COUNT {
            let service = ButtonService::new(button, self.ctx.clone());
            let subscription = attach(&service, &self.ctx.identity, &self.bus);
            self.register(ServiceId::Button(button), ServiceHandle::Button(service), subscription);
        }
    }

    fn register(&self, id: ServiceId, handle: ServiceHandle, subscription: crate::events::Subscription) {
        self.registry
            .insert(ServiceRecord::new(id, id.default_name(), handle, subscription));
    }

    /// The motion service owns its poll loop; removing the service stops it.
    fn add_motion(&self) {
        let motion = MotionService::new(self.ctx.clone());
        let subscription = attach(&motion, &self.ctx.identity, &self.bus);
        let poller = Poller::motion(
            PollContext {
                device_id: self.ctx.identity.id().to_string(),
                device: self.ctx.device.clone(),
                mirror: self.ctx.mirror.clone(),
                bus: self.bus.clone(),
            },
            self.motion_interval,
        );
        self.registry.insert(
            ServiceRecord::new(
                ServiceId::Motion,
                ServiceId::Motion.default_name(),
                ServiceHandle::Motion(motion.clone()),
                subscription,
            )
            .with_poller(poller),
        );
        motion.refresh();
    }

    /// Apply fresh name and output kind to a surviving dimmer. Returns true if the name changed.
    fn relabel_dimmer(&self, slot: &OutputSlot, metadata: &DimmerMetadataSet) -> bool {
        let Some(dimmer) = self.registry.dimmer(slot.id) else {
            warn!("[Sync] {}: {} is not a dimmer", self.ctx.identity, slot.id);
            return false;
        };

        if let ServiceId::Dimmer(number) = slot.id {
            self.ctx
                .mirror
                .set_dimmer_output(slot.channel, metadata.for_dimmer(number).output);
        }
        if dimmer.set_dimmable(slot.dimmable) {
            info!(
                "[Sync] {}: {} is now {}",
                self.ctx.identity,
                slot.id,
                if slot.dimmable { "dimmable" } else { "on/off only" }
            );
        }
        self.ctx.host.set_brightness_control(slot.id, slot.dimmable);

        let name = slot.name.clone().unwrap_or_else(|| slot.id.default_name());
        self.registry.rename(slot.id, &name)
    }
}

fn is_output(id: ServiceId) -> bool {
    matches!(id, ServiceId::Dimmer(_) | ServiceId::Cover(_))
}
