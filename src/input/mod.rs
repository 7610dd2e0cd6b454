//! Transports that feed the lock bridge.
//!
//! Current transports:
//! - `mqtt`: controller state/service calls and accessory characteristics over MQTT

pub mod mqtt;
