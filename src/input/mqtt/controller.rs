//! Controller side over MQTT: state change decoding and service calls.
//!
//! State messages come in two shapes:
//! - a plain state string (statestream style), e.g. `locked`
//! - a state-changed event, e.g.
//!   `{"entity_id": "lock.front_door", "old_state": "unlocked", "new_state": "locked"}`
//!   where either state may also be a full state object with a `state` field.
//!
//! An empty payload, or an event without a new state, carries no information.

use super::client::MqttRequests;
use crate::error::DispatchError;
use crate::lock::{LockCommandDispatcher, ServiceCall};
use log::info;
use rumqttc::QoS;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Decoded controller state message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateMessage {
    /// State change for the bridged entity. `None` carries no new state.
    Changed {
        old_state: Option<String>,
        new_state: Option<String>,
    },
    /// Event for a different entity sharing the topic.
    OtherEntity(String),
}

#[derive(Debug, Deserialize)]
struct StateChangedEvent {
    #[serde(default)]
    entity_id: Option<String>,
    #[serde(default)]
    old_state: Option<Value>,
    #[serde(default)]
    new_state: Option<Value>,
}

/// Extract the state string from an event field.
fn state_of(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(state) => Some(state),
        Value::Object(map) => map.get("state")?.as_str().map(str::to_string),
        _ => None,
    }
}

/// Decode a payload received on the entity's state topic.
pub fn parse_state_message(entity_id: &str, payload: &str) -> Result<StateMessage, serde_json::Error> {
    let payload = payload.trim();

    if payload.is_empty() {
        return Ok(StateMessage::Changed {
            old_state: None,
            new_state: None,
        });
    }

    if !payload.starts_with('{') {
        return Ok(StateMessage::Changed {
            old_state: None,
            new_state: Some(payload.to_string()),
        });
    }

    let event: StateChangedEvent = serde_json::from_str(payload)?;
    if let Some(other) = event.entity_id.filter(|id| id != entity_id) {
        return Ok(StateMessage::OtherEntity(other));
    }

    Ok(StateMessage::Changed {
        old_state: state_of(event.old_state),
        new_state: state_of(event.new_state),
    })
}

/// Publishes lock service calls as JSON to the controller's command topic.
///
/// Uses the non-blocking publish path, so it can be called from the
/// bridge without an async context.
pub struct MqttServiceCaller {
    client: Arc<dyn MqttRequests>,
    command_topic: String,
}

impl MqttServiceCaller {
    pub fn new(client: Arc<dyn MqttRequests>, command_topic: impl Into<String>) -> Self {
        Self {
            client,
            command_topic: command_topic.into(),
        }
    }
}

impl LockCommandDispatcher for MqttServiceCaller {
    fn call_service(&self, call: &ServiceCall) -> Result<(), DispatchError> {
        let payload = serde_json::to_vec(call)?;
        self.client
            .try_publish(&self.command_topic, QoS::AtLeastOnce, false, payload)?;
        info!(
            "[MQTT] Called {}.{} for {}",
            call.domain, call.service, call.entity_id
        );
        Ok(())
    }
}
