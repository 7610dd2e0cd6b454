use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(key).is_err() {
            // SAFETY: We're single-threaded at this point (called before any async runtime)
            unsafe { std::env::set_var(key, value) };
        }
    }
}

/// Parse `KEY=value` lines, skipping blanks and comments and stripping
/// surrounding quotes from values.
fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Find the first '=' and split there
        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            pairs.push((key, value));
        }
    }

    pairs
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub lock: LockConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// The lock entity to bridge and the topics both sides talk on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Controller entity id (e.g., "lock.front_door")
    pub entity_id: String,
    /// Display name of the accessory
    pub name: String,
    /// Topic the controller publishes entity state changes on
    pub state_topic: String,
    /// Topic service calls are published to
    pub command_topic: String,
    /// Base topic for the accessory's characteristics
    pub accessory_topic: String,
}

impl LockConfig {
    /// Build a config with topics derived from the entity id.
    pub fn for_entity(entity_id: impl Into<String>) -> Self {
        let entity_id = entity_id.into();
        let object_id = entity_id
            .split_once('.')
            .map(|(_, object_id)| object_id)
            .unwrap_or(entity_id.as_str())
            .to_string();

        Self {
            name: object_id.replace('_', " "),
            state_topic: format!("homeassistant/lock/{}/state", object_id),
            command_topic: "homeassistant/service/call".to_string(),
            accessory_topic: format!("virtual-lock-bridge/{}", object_id),
            entity_id,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mqtt: MqttConfig {
                broker_host: "127.0.0.1".to_string(),
                broker_port: 1883,
                client_id: "virtual-lock-bridge".to_string(),
                username: None,
                password: None,
            },
            lock: LockConfig {
                name: "Front Door".to_string(),
                ..LockConfig::for_entity("lock.front_door")
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        // MQTT configuration
        if let Some(host) = var("MQTT_BROKER_HOST") {
            config.mqtt.broker_host = host;
        }
        if let Some(port) = var("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            config.mqtt.broker_port = p;
        }
        if let Some(client_id) = var("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Some(username) = var("MQTT_USERNAME") {
            config.mqtt.username = Some(username);
        }
        if let Some(password) = var("MQTT_PASSWORD") {
            config.mqtt.password = Some(password);
        }

        // Lock configuration; derived topics follow the entity id
        if let Some(entity_id) = var("LOCK_ENTITY_ID") {
            config.lock = LockConfig::for_entity(entity_id);
        }
        if let Some(name) = var("LOCK_NAME") {
            config.lock.name = name;
        }
        if let Some(topic) = var("LOCK_STATE_TOPIC") {
            config.lock.state_topic = topic;
        }
        if let Some(topic) = var("LOCK_COMMAND_TOPIC") {
            config.lock.command_topic = topic;
        }
        if let Some(topic) = var("LOCK_ACCESSORY_TOPIC") {
            config.lock.accessory_topic = topic;
        }

        config
    }
}
