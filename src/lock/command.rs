//! Controller-side command dispatch.

use super::state::LockService;
use crate::error::DispatchError;
use serde::{Deserialize, Serialize};

/// A service call sent to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCall {
    pub domain: String,
    pub service: LockService,
    pub entity_id: String,
}

impl ServiceCall {
    pub fn new(domain: impl Into<String>, service: LockService, entity_id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            service,
            entity_id: entity_id.into(),
        }
    }
}

/// Sends lock/unlock requests to the controller.
///
/// Implementations must not block waiting for the device to react; the
/// resulting state change comes back through the controller's state updates.
/// A dispatcher may deliver that state update synchronously, before
/// `call_service` returns.
pub trait LockCommandDispatcher: Send + Sync {
    fn call_service(&self, call: &ServiceCall) -> Result<(), DispatchError>;
}
