//! Registered services, keyed by stable logical id.
//!
//! A record owns everything tied to the service's lifetime: its bus
//! subscription and, for the motion sensor, its poll loop. Removing the
//! record from the registry drops both, so no timer or handler outlives the
//! service it belongs to.

use super::{
    ButtonService, CoverService, DimmerService, LedService, LightService, MotionService,
    ServiceHost, ServiceId, TemperatureService,
};
use crate::events::Subscription;
use crate::polling::Poller;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone)]
pub enum ServiceHandle {
    Dimmer(Arc<DimmerService>),
    Cover(Arc<CoverService>),
    Led(Arc<LedService>),
    Temperature(Arc<TemperatureService>),
    Light(Arc<LightService>),
    Motion(Arc<MotionService>),
    Button(Arc<ButtonService>),
}

pub struct ServiceRecord {
    pub id: ServiceId,
    pub name: String,
    pub handle: ServiceHandle,
    /// Held for its drop: unsubscribes the handler with the record.
    _subscription: Subscription,
    poller: Option<Poller>,
}

impl ServiceRecord {
    pub fn new(id: ServiceId, name: String, handle: ServiceHandle, subscription: Subscription) -> Self {
        Self {
            id,
            name,
            handle,
            _subscription: subscription,
            poller: None,
        }
    }

    /// Tie a poll loop to this service; it stops when the record is dropped.
    pub fn with_poller(mut self, poller: Poller) -> Self {
        self.poller = Some(poller);
        self
    }
}

pub struct ServiceRegistry {
    records: Mutex<BTreeMap<ServiceId, ServiceRecord>>,
    host: Arc<dyn ServiceHost>,
}

impl ServiceRegistry {
    pub fn new(host: Arc<dyn ServiceHost>) -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            host,
        }
    }

    /// Register a service with the host and keep its record.
    ///
    /// An existing record with the same id is replaced (and torn down).
    pub fn insert(&self, record: ServiceRecord) {
        let id = record.id;
        if self.records.lock().contains_key(&id) {
            self.remove(id);
        }
        self.host.add_service(id, id.kind(), &record.name);
        self.records.lock().insert(id, record);
    }

    /// Remove a service from the host and drop its record. Returns false if it was not registered.
    pub fn remove(&self, id: ServiceId) -> bool {
        let record = self.records.lock().remove(&id);
        match record {
            Some(record) => {
                drop(record);
                self.host.remove_service(id);
                true
            }
            None => false,
        }
    }

    /// Change the display name. Returns true if it differed.
    pub fn rename(&self, id: ServiceId, name: &str) -> bool {
        let changed = {
            let mut records = self.records.lock();
            match records.get_mut(&id) {
                Some(record) if record.name != name => {
                    record.name = name.to_string();
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.host.rename_service(id, name);
        }
        changed
    }

    pub fn contains(&self, id: ServiceId) -> bool {
        self.records.lock().contains_key(&id)
    }

    pub fn ids(&self) -> Vec<ServiceId> {
        self.records.lock().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    pub fn name(&self, id: ServiceId) -> Option<String> {
        self.records.lock().get(&id).map(|r| r.name.clone())
    }

    pub fn handle(&self, id: ServiceId) -> Option<ServiceHandle> {
        self.records.lock().get(&id).map(|r| r.handle.clone())
    }

    pub fn dimmer(&self, id: ServiceId) -> Option<Arc<DimmerService>> {
        match self.handle(id)? {
            ServiceHandle::Dimmer(dimmer) => Some(dimmer),
            _ => None,
        }
    }

    pub fn cover(&self, id: ServiceId) -> Option<Arc<CoverService>> {
        match self.handle(id)? {
            ServiceHandle::Cover(cover) => Some(cover),
            _ => None,
        }
    }

    pub fn led(&self) -> Option<Arc<LedService>> {
        match self.handle(ServiceId::Led)? {
            ServiceHandle::Led(led) => Some(led),
            _ => None,
        }
    }

    pub fn motion(&self) -> Option<Arc<MotionService>> {
        match self.handle(ServiceId::Motion)? {
            ServiceHandle::Motion(motion) => Some(motion),
            _ => None,
        }
    }

    pub fn button(&self, button: u8) -> Option<Arc<ButtonService>> {
        match self.handle(ServiceId::Button(button))? {
            ServiceHandle::Button(service) => Some(service),
            _ => None,
        }
    }

    /// Number of poll loops currently owned by registered services.
    pub fn active_pollers(&self) -> usize {
        self.records
            .lock()
            .values()
            .filter(|r| r.poller.as_ref().is_some_and(Poller::is_running))
            .count()
    }

    /// Remove every service.
    pub fn clear(&self) {
        for id in self.ids() {
            self.remove(id);
        }
    }
}
