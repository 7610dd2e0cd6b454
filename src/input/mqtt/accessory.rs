//! Protocol side over MQTT: exposes the lock mechanism characteristics.
//!
//! Topics below the accessory base topic:
//! - `current_state` retained current-state value (0-3)
//! - `target_state` retained target-state value (0-1)
//! - `target_state/set` target writes from clients

use super::client::MqttRequests;
use crate::lock::{LockCharacteristic, LockStateBridge, LockTargetState};
use log::{info, warn};
use rumqttc::QoS;
use std::sync::Arc;

/// MQTT exposure of one bridged lock's characteristics.
pub struct MqttLockAccessory {
    bridge: Arc<LockStateBridge>,
    client: Arc<dyn MqttRequests>,
    base_topic: String,
}

impl MqttLockAccessory {
    pub fn new(
        bridge: Arc<LockStateBridge>,
        client: Arc<dyn MqttRequests>,
        base_topic: impl Into<String>,
    ) -> Self {
        Self {
            bridge,
            client,
            base_topic: base_topic.into(),
        }
    }

    pub fn characteristic_topic(&self, characteristic: &LockCharacteristic) -> String {
        format!("{}/{}", self.base_topic, characteristic.name())
    }

    pub fn target_set_topic(&self) -> String {
        format!("{}/{}/set", self.base_topic, self.bridge.target_state().name())
    }

    /// Wire both characteristics so every write is published.
    pub fn attach(&self) {
        for characteristic in [self.bridge.current_state(), self.bridge.target_state()] {
            let topic = self.characteristic_topic(characteristic);
            let client = self.client.clone();
            characteristic.set_pusher(Arc::new(move |value: u8| {
                let payload = value.to_string().into_bytes();
                if let Err(e) = client.try_publish(&topic, QoS::AtLeastOnce, true, payload) {
                    warn!("[MQTT] Failed to publish {} = {}: {:?}", topic, value, e);
                }
            }));
        }
    }

    /// Publish the current characteristic values (e.g., after connecting).
    pub fn publish_all(&self) {
        for characteristic in [self.bridge.current_state(), self.bridge.target_state()] {
            characteristic.set_value(characteristic.get());
        }
    }

    /// Handle a client write on the target-state set topic.
    ///
    /// Malformed and out-of-range values are dropped here. An accepted value
    /// is stored on the target characteristic as written, together with the
    /// bridge raising its echo flag.
    pub fn handle_target_write(&self, payload: &str) {
        let target = match parse_target_payload(payload) {
            Some(target) => target,
            None => {
                warn!(
                    "[MQTT] {}: Ignoring invalid target state {:?}",
                    self.bridge.entity_id(),
                    payload
                );
                return;
            }
        };

        info!(
            "[MQTT] {}: Target state write {:?}",
            self.bridge.entity_id(),
            target
        );
        if let Err(e) = self.bridge.on_client_target_write(target as u8) {
            warn!("[MQTT] {}: {}", self.bridge.entity_id(), e);
        }
    }
}

/// Decode a target-state payload; only "0" and "1" are valid.
pub fn parse_target_payload(payload: &str) -> Option<LockTargetState> {
    let raw: u8 = payload.trim().parse().ok()?;
    LockTargetState::try_from(raw).ok()
}
