use crate::lock::LockService;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Invalid lock target state: {0} (expected 0 or 1)")]
    InvalidTargetValue(u8),

    #[error("Unrecognized controller state: {0:?}")]
    UnrecognizedControllerState(String),

    #[error("Failed to call lock.{service} for {entity_id}: {source}")]
    CommandDispatchFailed {
        service: LockService,
        entity_id: String,
        #[source]
        source: DispatchError,
    },
}

/// Errors raised by a controller-side command transport.
#[derive(ThisError, Debug)]
pub enum DispatchError {
    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("Failed to encode service call: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Command rejected: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
