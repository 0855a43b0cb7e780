//! Scripted in-memory device for unit tests.

use super::api::{DeviceApi, ReadEndpoint, WriteCommand};
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub const FAKE_MAC: &str = "F008D1C4E9A0";
pub const FAKE_SERIAL: &str = "SN-TEST-1";

pub struct FakeDevice {
    responses: Mutex<HashMap<ReadEndpoint, Value>>,
    failing: Mutex<HashSet<ReadEndpoint>>,
    fail_writes: AtomicBool,
    writes: Mutex<Vec<WriteCommand>>,
    read_counts: Mutex<HashMap<ReadEndpoint, usize>>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeDevice {
    /// DIP 3, PIR present, all inputs inactive, four dimmers and two blinds in the state.
    pub fn standard() -> Self {
        let mut responses = HashMap::new();
        responses.insert(ReadEndpoint::Device, device_info(3, true));
        responses.insert(ReadEndpoint::InputConfig, inputs(false));
        responses.insert(
            ReadEndpoint::DimmerConfig,
            json!({ "dimmers": [
                { "name": "Ceiling", "output": "halogen" },
                { "name": "Wall", "output": "led" },
                { "name": "", "output": "non_dimmable" },
                { "name": "Desk", "output": "led" }
            ]}),
        );
        responses.insert(ReadEndpoint::Motion, json!({ "success": true, "motion": false }));
        responses.insert(ReadEndpoint::State, state_body(&[(true, 80), (false, 0), (true, 30), (false, 0)]));

        Self {
            responses: Mutex::new(responses),
            failing: Mutex::new(HashSet::new()),
            fail_writes: AtomicBool::new(false),
            writes: Mutex::new(Vec::new()),
            read_counts: Mutex::new(HashMap::new()),
            latency: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_response(&self, endpoint: ReadEndpoint, body: Value) {
        self.responses.lock().insert(endpoint, body);
    }

    pub fn set_device(&self, dip: u8, has_pir: bool) {
        self.set_response(ReadEndpoint::Device, device_info(dip, has_pir));
    }

    pub fn set_input0(&self, active: bool) {
        self.set_response(ReadEndpoint::InputConfig, inputs(active));
    }

    pub fn set_motion(&self, motion: bool) {
        self.set_response(ReadEndpoint::Motion, json!({ "success": true, "motion": motion }));
    }

    pub fn set_dimmers(&self, dimmers: &[(bool, u8)]) {
        self.set_response(ReadEndpoint::State, state_body(dimmers));
    }

    pub fn fail_reads(&self, endpoint: ReadEndpoint, fail: bool) {
        let mut failing = self.failing.lock();
        if fail {
            failing.insert(endpoint);
        } else {
            failing.remove(&endpoint);
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<WriteCommand> {
        self.writes.lock().clone()
    }

    pub fn read_count(&self, endpoint: ReadEndpoint) -> usize {
        self.read_counts.lock().get(&endpoint).copied().unwrap_or(0)
    }

    pub fn max_concurrent_guarded_reads(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

fn is_guarded(endpoint: ReadEndpoint) -> bool {
    matches!(
        endpoint,
        ReadEndpoint::State | ReadEndpoint::Motion | ReadEndpoint::InputConfig
    )
}

#[async_trait]
impl DeviceApi for FakeDevice {
    async fn read(&self, endpoint: ReadEndpoint) -> Result<Value> {
        *self.read_counts.lock().entry(endpoint).or_default() += 1;

        let guarded = is_guarded(endpoint);
        if guarded {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if guarded {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        if self.failing.lock().contains(&endpoint) {
            return Err(BridgeError::HttpStatus {
                endpoint: endpoint.path().to_string(),
                status: 503,
            });
        }
        self.responses
            .lock()
            .get(&endpoint)
            .cloned()
            .ok_or_else(|| BridgeError::InvalidResponse(format!("no fake response for {endpoint}")))
    }

    async fn write(&self, command: WriteCommand) -> Result<()> {
        self.writes.lock().push(command.clone());
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BridgeError::HttpStatus {
                endpoint: command.path(),
                status: 500,
            });
        }
        Ok(())
    }
}

pub fn device_info(dip: u8, has_pir: bool) -> Value {
    json!({
        FAKE_MAC: {
            "front_sn": FAKE_SERIAL,
            "dip_config": dip,
            "has_pir": has_pir,
            "fw_version": "1.4.3",
            "hw_version": "1.3.30"
        }
    })
}

pub fn inputs(first_active: bool) -> Value {
    json!({ "inputs": [
        { "active": first_active },
        { "active": false },
        { "active": false },
        { "active": false }
    ]})
}

pub fn state_body(dimmers: &[(bool, u8)]) -> Value {
    let dimmers: Vec<Value> = dimmers
        .iter()
        .enumerate()
        .map(|(i, (on, value))| {
            json!({ "on": on, "value": value, "index": { "relative": i, "absolute": i } })
        })
        .collect();
    json!({
        "dimmers": dimmers,
        "blinds": [
            { "position": 20, "lamella": 10, "index": { "relative": 0, "absolute": 0 } },
            { "position": 100, "lamella": 0, "index": { "relative": 1, "absolute": 1 } }
        ],
        "led": { "on": true, "hsv": "120;50;80", "rgb": "66CC66", "mode": "hsv" },
        "sensors": { "room_temperature": 21.5, "brightness": 250.0 }
    })
}
