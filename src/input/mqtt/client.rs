//! MQTT client wrapper shared by the controller and accessory transports.

use crate::config::MqttConfig;
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, ClientError, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;

/// Message received from MQTT broker.
#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
}

/// Event forwarded from the MQTT event loop.
#[derive(Debug, Clone)]
pub enum MqttEvent {
    /// A ConnAck was received. Sent on every (re)connect; subscriptions
    /// must be renewed since the session starts clean.
    Connected,
    Message(MqttMessage),
}

/// Non-blocking publish/subscribe requests.
///
/// Requests are queued for the event loop; a full queue is an error rather
/// than a wait, so callers may hold locks while issuing them.
pub trait MqttRequests: Send + Sync {
    fn try_publish(&self, topic: &str, qos: QoS, retain: bool, payload: Vec<u8>)
    -> Result<(), ClientError>;

    fn try_subscribe(&self, topic: &str, qos: QoS) -> Result<(), ClientError>;
}

impl MqttRequests for AsyncClient {
    fn try_publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> Result<(), ClientError> {
        AsyncClient::try_publish(self, topic, qos, retain, payload)
    }

    fn try_subscribe(&self, topic: &str, qos: QoS) -> Result<(), ClientError> {
        AsyncClient::try_subscribe(self, topic, qos)
    }
}

/// MQTT client for the bridge.
pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
}

impl MqttClient {
    /// Create a new MQTT client from configuration.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));

        // Set credentials if provided
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self { client, event_loop }
    }

    /// Run the MQTT event loop and forward events to the provided channel.
    ///
    /// Runs until the event channel is closed, reconnecting after
    /// connection errors.
    pub async fn run(mut self, tx: mpsc::Sender<MqttEvent>) {
        info!("[MQTT] Starting event loop");

        loop {
            let event = match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("[MQTT] Connected to broker");
                    MqttEvent::Connected
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let topic = publish.topic.clone();
                    let payload = match String::from_utf8(publish.payload.to_vec()) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!("[MQTT] Invalid UTF-8 in payload on {}: {}", topic, e);
                            continue;
                        }
                    };

                    debug!("[MQTT] Received message on {}: {}", topic, payload);
                    MqttEvent::Message(MqttMessage { topic, payload })
                }
                Ok(_) => continue,
                Err(e) => {
                    error!("[MQTT] Connection error: {:?}", e);
                    // Wait before reconnecting
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            if tx.send(event).await.is_err() {
                error!("[MQTT] Event channel closed");
                break;
            }
        }
    }

    /// Get a clone of the async client for publishing from other tasks.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }
}

/// Records requests instead of queueing them.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingRequests {
    /// (topic, retain, payload)
    pub publishes: parking_lot::Mutex<Vec<(String, bool, String)>>,
    pub subscriptions: parking_lot::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MqttRequests for RecordingRequests {
    fn try_publish(
        &self,
        topic: &str,
        _qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> Result<(), ClientError> {
        let payload = String::from_utf8_lossy(&payload).into_owned();
        self.publishes.lock().push((topic.to_string(), retain, payload));
        Ok(())
    }

    fn try_subscribe(&self, topic: &str, _qos: QoS) -> Result<(), ClientError> {
        self.subscriptions.lock().push(topic.to_string());
        Ok(())
    }
}
