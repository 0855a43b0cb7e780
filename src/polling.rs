//! Periodic polling of the device.
//!
//! Two independent loops: the full-state poll (default every 10 s) and the
//! motion poll (default every 2 s, only when a PIR is fitted). Each loop is
//! owned by a [`Poller`]; dropping it stops the loop.

use crate::device::GuardedDevice;
use crate::events::{BridgeEvent, EventBus};
use crate::state::StateMirror;
use log::{debug, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Shared inputs of both poll loops.
#[derive(Clone)]
pub struct PollContext {
    /// Identifier carried by published events.
    pub device_id: String,
    pub device: Arc<GuardedDevice>,
    pub mirror: Arc<StateMirror>,
    pub bus: Arc<EventBus>,
}

/// Handle of a running poll loop. Cancels the loop on drop.
pub struct Poller {
    name: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Poller {
    /// Poll `/api/v1/state` and publish `StateUpdated` after every successful refresh.
    pub fn state(ctx: PollContext, every: Duration) -> Self {
        Self::spawn("state", every, move || {
            let ctx = ctx.clone();
            async move {
                poll_state_once(&ctx).await;
            }
        })
    }

    /// Poll `/api/v1/motion` and publish `MotionChanged` only when the value flips.
    pub fn motion(ctx: PollContext, every: Duration) -> Self {
        Self::spawn("motion", every, move || {
            let ctx = ctx.clone();
            async move {
                poll_motion_once(&ctx).await;
            }
        })
    }

    fn spawn<F, Fut>(name: &'static str, every: Duration, mut poll: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // first tick is immediate; the caller already has fresh data

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    () = async {
                        ticker.tick().await;
                        poll().await;
                    } => {}
                }
            }
            debug!("[Poll] {} loop stopped", name);
        });

        debug!("[Poll] {} loop started every {:?}", name, every);
        Self {
            name,
            cancel,
            handle,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }

    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            debug!("[Poll] stopping {} loop", self.name);
        }
        self.cancel.cancel();
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

/// One full-state refresh. Returns false if the read failed.
pub async fn poll_state_once(ctx: &PollContext) -> bool {
    match ctx.device.state().await {
        Ok(state) => {
            ctx.mirror.apply_state(&state);
            ctx.bus.publish(&BridgeEvent::StateUpdated {
                device: ctx.device_id.clone(),
            });
            true
        }
        Err(e) => {
            warn!("[Poll] {}: state poll failed: {}", ctx.device_id, e);
            false
        }
    }
}

/// One motion read. Returns true if the value changed and an event went out.
pub async fn poll_motion_once(ctx: &PollContext) -> bool {
    match ctx.device.motion().await {
        Ok(detected) => {
            if !ctx.mirror.set_motion(detected) {
                return false;
            }
            ctx.bus.publish(&BridgeEvent::MotionChanged {
                device: ctx.device_id.clone(),
                detected,
            });
            true
        }
        Err(e) => {
            warn!("[Poll] {}: motion poll failed: {}", ctx.device_id, e);
            false
        }
    }
}
