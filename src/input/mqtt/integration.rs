//! MQTT Integration orchestrator for bridged locks.
//!
//! Provides a high-level API for bridging lock entities without exposing
//! MQTT internals to main.rs. Supports multiple locks on one connection.

use super::accessory::MqttLockAccessory;
use super::client::{MqttClient, MqttEvent, MqttRequests};
use super::controller::{MqttServiceCaller, StateMessage, parse_state_message};
use crate::config::{LockConfig, MqttConfig};
use crate::lock::{LockCommandDispatcher, LockStateBridge};
use log::{debug, info, warn};
use rumqttc::QoS;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One bridged lock: its core bridge plus both transports' topics.
struct LockDevice {
    name: String,
    state_topic: String,
    bridge: Arc<LockStateBridge>,
    accessory: MqttLockAccessory,
}

impl LockDevice {
    fn new(
        config: LockConfig,
        client: Arc<dyn MqttRequests>,
        dispatcher: Arc<dyn LockCommandDispatcher>,
    ) -> Self {
        let bridge = Arc::new(LockStateBridge::new(config.entity_id, dispatcher));
        let accessory = MqttLockAccessory::new(bridge.clone(), client, config.accessory_topic);
        accessory.attach();

        Self {
            name: config.name,
            state_topic: config.state_topic,
            bridge,
            accessory,
        }
    }

    fn subscribe_topics(&self) -> Vec<String> {
        vec![self.state_topic.clone(), self.accessory.target_set_topic()]
    }

    /// Subscribe to this device's topics and republish its characteristics.
    ///
    /// Called on every ConnAck. Uses the non-blocking request path so the
    /// event loop task is never waited on.
    fn on_connected(&self, client: &dyn MqttRequests) {
        for topic in self.subscribe_topics() {
            if let Err(e) = client.try_subscribe(&topic, QoS::AtLeastOnce) {
                warn!("[MQTT] Failed to subscribe to {}: {:?}", topic, e);
            }
        }
        self.accessory.publish_all();
    }

    /// Route a message to the controller or accessory side.
    /// Returns true if the message was for this device.
    fn process_message(&self, topic: &str, payload: &str) -> bool {
        if topic == self.state_topic {
            self.process_state_message(payload)
        } else if topic == self.accessory.target_set_topic() {
            self.accessory.handle_target_write(payload);
            true
        } else {
            false
        }
    }

    fn process_state_message(&self, payload: &str) -> bool {
        match parse_state_message(self.bridge.entity_id(), payload) {
            Ok(StateMessage::Changed {
                old_state,
                new_state,
            }) => {
                debug!(
                    "[MQTT] {} state changed: {:?} -> {:?}",
                    self.name, old_state, new_state
                );
                self.bridge.on_controller_state_update(new_state.as_deref());
                true
            }
            Ok(StateMessage::OtherEntity(_)) => false,
            Err(e) => {
                warn!("[MQTT] Failed to parse {} state: {}", self.name, e);
                true
            }
        }
    }
}

/// MQTT Integration orchestrator.
///
/// Manages the MQTT client and lock subscriptions, keeping MQTT internals
/// out of main.rs.
pub struct MqttIntegration {
    config: MqttConfig,
    locks: Vec<LockConfig>,
}

impl MqttIntegration {
    /// Create a new MQTT integration with the given broker config.
    pub fn new(config: MqttConfig) -> Self {
        Self {
            config,
            locks: Vec::new(),
        }
    }

    /// Add a lock entity to bridge.
    pub fn with_lock(mut self, config: LockConfig) -> Self {
        self.locks.push(config);
        self
    }

    /// Start the MQTT integration.
    ///
    /// Spawns a background task that connects to the broker, subscribes to
    /// lock topics, and routes messages to the appropriate bridges.
    /// Returns a JoinHandle that can be used to abort the task on shutdown.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(self) {
        if self.locks.is_empty() {
            info!("[MQTT] No locks configured, skipping MQTT integration");
            return;
        }

        info!(
            "[MQTT] Connecting to {}:{}",
            self.config.broker_host, self.config.broker_port
        );

        let mqtt_client = MqttClient::new(&self.config);
        let client: Arc<dyn MqttRequests> = Arc::new(mqtt_client.client());

        let devices: Vec<LockDevice> = self
            .locks
            .into_iter()
            .map(|lock| {
                let caller = Arc::new(MqttServiceCaller::new(
                    client.clone(),
                    lock.command_topic.clone(),
                ));
                LockDevice::new(lock, client.clone(), caller)
            })
            .collect();

        // Channel for MQTT events
        let (event_tx, mut event_rx) = mpsc::channel::<MqttEvent>(64);

        // Start MQTT event loop FIRST (so it can establish connection)
        let mqtt_loop = tokio::spawn(async move {
            mqtt_client.run(event_tx).await;
        });

        // Nothing but a ConnAck can arrive before the first connect
        match tokio::time::timeout(Duration::from_secs(10), event_rx.recv()).await {
            Ok(Some(MqttEvent::Connected)) => {
                info!("[MQTT] Connection established, subscribing to topics");
                for device in &devices {
                    device.on_connected(client.as_ref());
                }
            }
            Ok(Some(MqttEvent::Message(msg))) => {
                warn!("[MQTT] Message on {} before connect, ignoring", msg.topic);
            }
            Ok(None) => {
                warn!("[MQTT] Event channel closed before connect");
                return;
            }
            Err(_) => {
                warn!("[MQTT] Connection timeout after 10 seconds");
                mqtt_loop.abort();
                return;
            }
        }

        info!("[MQTT] Integration started with {} lock(s)", devices.len());

        while let Some(event) = event_rx.recv().await {
            match event {
                MqttEvent::Connected => {
                    // Clean session: the broker forgot our subscriptions
                    info!("[MQTT] Reconnected, renewing subscriptions");
                    for device in &devices {
                        device.on_connected(client.as_ref());
                    }
                }
                MqttEvent::Message(msg) => {
                    if !devices
                        .iter()
                        .any(|device| device.process_message(&msg.topic, &msg.payload))
                    {
                        debug!("[MQTT] Unhandled message on {}", msg.topic);
                    }
                }
            }
        }

        mqtt_loop.abort();
    }
}
