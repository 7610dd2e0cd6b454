//! MQTT transports for bridged locks.
//!
//! The controller side (entity state changes and lock service calls) and the
//! protocol side (lock mechanism characteristics) both run over one broker
//! connection.

mod accessory;
mod client;
mod controller;
mod integration;

pub use accessory::{MqttLockAccessory, parse_target_payload};
pub use client::{MqttClient, MqttEvent, MqttMessage, MqttRequests};
pub use controller::{MqttServiceCaller, StateMessage, parse_state_message};
pub use integration::MqttIntegration;
