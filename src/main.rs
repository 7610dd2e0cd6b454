use log::info;
use tokio::signal;
use virtual_lock_bridge::config::{self, Config};
use virtual_lock_bridge::input::mqtt::MqttIntegration;

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env file before anything else
    config::load_dotenv();

    init_logger();
    info!("Starting Virtual Lock Bridge");

    let config = Config::from_env();
    info!("Configuration loaded:");
    info!("  Lock: {} ({})", config.lock.name, config.lock.entity_id);
    info!(
        "  MQTT broker: {}:{}",
        config.mqtt.broker_host, config.mqtt.broker_port
    );
    info!("  State topic: {}", config.lock.state_topic);
    info!("  Command topic: {}", config.lock.command_topic);
    info!("  Accessory topic: {}", config.lock.accessory_topic);

    let mqtt_task = MqttIntegration::new(config.mqtt)
        .with_lock(config.lock)
        .start();

    info!("Virtual Lock Bridge is running");
    info!("  - Press Ctrl+C to exit");

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal");
        }
        Err(e) => {
            log::error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    mqtt_task.abort();

    info!("Virtual Lock Bridge stopped");
}
