//! Stateless programmable switch for each of the four front buttons.
//!
//! Button state is only ever changed by push notifications arriving on the
//! bus, never by polling.

use super::{Characteristic, ServiceContext, ServiceHandler, ServiceId};
use crate::device::identity::normalize_mac;
use crate::error::{BridgeError, Result};
use crate::events::{BridgeEvent, EventKind};
use crate::state::ButtonAction;
use log::info;
use std::sync::Arc;

pub const BUTTON_COUNT: u8 = 4;

/// Push notification the device sends when a front button is used.
///
/// Body is form encoded: `mac=<MAC>&index=<1..4>&action=<1|2|3>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonCallback {
    pub mac: String,
    pub button: u8,
    pub action: ButtonAction,
}

impl ButtonCallback {
    pub fn parse(body: &str) -> Result<Self> {
        let mut mac = None;
        let mut button = None;
        let mut action = None;

        for (key, value) in url::form_urlencoded::parse(body.trim().as_bytes()) {
            match key.as_ref() {
                "mac" => mac = Some(normalize_mac(&value)),
                "index" => button = value.trim().parse::<u8>().ok(),
                "action" => {
                    action = value
                        .trim()
                        .parse::<u8>()
                        .ok()
                        .and_then(ButtonAction::from_code)
                }
                _ => {}
            }
        }

        let invalid = |what: &str| BridgeError::InvalidResponse(format!("button callback: {what} in {body:?}"));
        let mac = mac.filter(|m| !m.is_empty()).ok_or_else(|| invalid("missing mac"))?;
        let button = button
            .filter(|b| (1..=BUTTON_COUNT).contains(b))
            .ok_or_else(|| invalid("bad index"))?;
        let action = action.ok_or_else(|| invalid("bad action"))?;
        Ok(Self { mac, button, action })
    }

    pub fn into_event(self) -> BridgeEvent {
        BridgeEvent::ButtonPressed {
            device: self.mac,
            button: self.button,
            action: self.action,
        }
    }
}

pub struct ButtonService {
    button: u8,
    ctx: Arc<ServiceContext>,
}

impl ButtonService {
    pub fn new(button: u8, ctx: Arc<ServiceContext>) -> Arc<Self> {
        Arc::new(Self { button, ctx })
    }

    pub fn button(&self) -> u8 {
        self.button
    }

    /// Last action seen for this button, if any.
    pub fn get_last_action(&self) -> Option<ButtonAction> {
        self.ctx.mirror.button(self.button)
    }
}

impl ServiceHandler for ButtonService {
    fn id(&self) -> ServiceId {
        ServiceId::Button(self.button)
    }

    fn event_kind(&self) -> EventKind {
        EventKind::ButtonPressed
    }

    fn handle_event(&self, event: &BridgeEvent) {
        let BridgeEvent::ButtonPressed { button, action, .. } = event else {
            return;
        };
        if *button != self.button {
            return;
        }
        info!("[Button] {} button {}: {}", self.ctx.identity, button, action);
        self.ctx.mirror.record_button(self.button, *action);
        self.ctx.host.update(
            ServiceId::Button(self.button),
            Characteristic::ProgrammableSwitchEvent(*action),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::attach;
    use crate::services::testing::harness;

    #[test]
    fn test_parse_callback() {
        let cb = ButtonCallback::parse("mac=f008d1c4e9a0&index=3&action=2").unwrap();
        assert_eq!(cb.mac, "F008D1C4E9A0");
        assert_eq!(cb.button, 3);
        assert_eq!(cb.action, ButtonAction::DoublePress);
    }

    #[tokio::test]
    async fn test_parse_callback_decodes_form() {
        let h = harness().await;
        let cb = ButtonCallback::parse("mac=F0%3A08%3AD1%3AC4%3AE9%3AA0&index=1&action=1").unwrap();
        assert_eq!(cb.mac, "F008D1C4E9A0");
        assert!(h.ctx.identity.matches(&cb.mac));

        let cb = ButtonCallback::parse("action=3&mac=f0-08-d1-c4-e9-a0&index=+4&extra=x+y").unwrap();
        assert_eq!(cb.mac, "F008D1C4E9A0");
        assert_eq!(cb.button, 4);
        assert_eq!(cb.action, ButtonAction::LongPress);
    }

    #[test]
    fn test_parse_callback_rejects_bad_input() {
        assert!(ButtonCallback::parse("").is_err());
        assert!(ButtonCallback::parse("mac=AA&index=5&action=1").is_err());
        assert!(ButtonCallback::parse("mac=AA&index=1&action=9").is_err());
        assert!(ButtonCallback::parse("index=1&action=1").is_err());
        assert!(ButtonCallback::parse("mac=%3A%3A&index=1&action=1").is_err());
    }

    #[tokio::test]
    async fn test_only_own_button_and_device() {
        let h = harness().await;
        let b1 = ButtonService::new(1, h.ctx.clone());
        let b2 = ButtonService::new(2, h.ctx.clone());
        let _s1 = attach(&b1, &h.ctx.identity, &h.bus);
        let _s2 = attach(&b2, &h.ctx.identity, &h.bus);

        h.bus.publish(&BridgeEvent::ButtonPressed {
            device: h.ctx.identity.mac().to_string(),
            button: 2,
            action: ButtonAction::LongPress,
        });
        h.bus.publish(&BridgeEvent::ButtonPressed {
            device: "AABBCCDDEEFF".into(),
            button: 1,
            action: ButtonAction::SinglePress,
        });

        assert_eq!(b1.get_last_action(), None);
        assert_eq!(b2.get_last_action(), Some(ButtonAction::LongPress));
        assert_eq!(
            h.host.updates(),
            vec![(
                ServiceId::Button(2),
                Characteristic::ProgrammableSwitchEvent(ButtonAction::LongPress)
            )]
        );
    }
}
