//! Two-way sync between a controller lock entity and its protocol-side
//! lock mechanism.
//!
//! Target writes from protocol clients become lock/unlock service calls.
//! Controller state updates are mirrored onto the current-state
//! characteristic, and onto the target-state characteristic unless the update
//! is the echo of a command this bridge just sent.

use super::characteristic::LockCharacteristic;
use super::command::{LockCommandDispatcher, ServiceCall};
use super::state::{ControllerState, LOCK_DOMAIN, LockCurrentState, LockTargetState};
use crate::error::{BridgeError, Result};
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::Arc;

/// Bridge for one lock entity.
///
/// State flow:
/// - `on_protocol_target_write()` raises the echo flag, then dispatches the command
/// - `on_controller_state_update()` writes current state, and target state
///   when the update is binary and not an echo
/// - The echo flag is consumed by the next binary update, whatever its origin
pub struct LockStateBridge {
    entity_id: String,
    current_state: Arc<LockCharacteristic>,
    target_state: Arc<LockCharacteristic>,
    /// Set while a protocol-originated command awaits its controller echo.
    /// Guards the characteristic writes of a controller update as well.
    awaiting_echo: Mutex<bool>,
    dispatcher: Arc<dyn LockCommandDispatcher>,
}

impl LockStateBridge {
    /// Create a bridge with placeholder characteristic values
    /// (current = unknown, target = locked) until the first controller update.
    pub fn new(entity_id: impl Into<String>, dispatcher: Arc<dyn LockCommandDispatcher>) -> Self {
        Self {
            entity_id: entity_id.into(),
            current_state: Arc::new(LockCharacteristic::new(
                "current_state",
                LockCurrentState::Unknown as u8,
            )),
            target_state: Arc::new(LockCharacteristic::new(
                "target_state",
                LockTargetState::Locked as u8,
            )),
            awaiting_echo: Mutex::new(false),
            dispatcher,
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// The lock mechanism current-state characteristic.
    pub fn current_state(&self) -> &Arc<LockCharacteristic> {
        &self.current_state
    }

    /// The lock mechanism target-state characteristic.
    pub fn target_state(&self) -> &Arc<LockCharacteristic> {
        &self.target_state
    }

    /// Handle a target-state write from a protocol client.
    ///
    /// Values other than 0 (unlocked) and 1 (locked) are rejected without
    /// touching any state. A dispatch failure is reported, but the echo flag
    /// stays raised until the next binary controller update.
    pub fn on_protocol_target_write(&self, value: u8) -> Result<()> {
        self.target_write(value, false)
    }

    /// Like [`Self::on_protocol_target_write`], for transports that do not
    /// store the client's value themselves: the target characteristic is set
    /// to `value` in the same critical section that raises the echo flag, so
    /// no controller update can land in between.
    pub fn on_client_target_write(&self, value: u8) -> Result<()> {
        self.target_write(value, true)
    }

    fn target_write(&self, value: u8, store_target: bool) -> Result<()> {
        let target = LockTargetState::try_from(value)?;
        let state = target.controller_state();
        let service = state
            .service()
            .ok_or(BridgeError::InvalidTargetValue(value))?;

        debug!("[Lock] {}: Set state to {}", self.entity_id, value);

        // Raised before dispatch so a synchronous echo already sees it.
        // The lock is released first; the dispatcher may call back into us.
        {
            let mut awaiting_echo = self.awaiting_echo.lock();
            if store_target {
                self.target_state.set_value(target as u8);
            }
            *awaiting_echo = true;
        }

        let call = ServiceCall::new(LOCK_DOMAIN, service, self.entity_id.as_str());
        self.dispatcher.call_service(&call).map_err(|source| {
            warn!(
                "[Lock] {}: Failed to call {}.{}: {}",
                self.entity_id, LOCK_DOMAIN, service, source
            );
            BridgeError::CommandDispatchFailed {
                service,
                entity_id: self.entity_id.clone(),
                source,
            }
        })
    }

    /// Handle a state change reported by the controller.
    ///
    /// `None` means the update carried no new state and is ignored.
    /// Unrecognized states are logged and otherwise ignored.
    pub fn on_controller_state_update(&self, new_state: Option<&str>) {
        let Some(raw) = new_state else {
            return;
        };

        match raw.parse::<ControllerState>() {
            Ok(state) => self.apply_controller_state(state),
            Err(_) => {
                let err = BridgeError::UnrecognizedControllerState(raw.to_string());
                warn!("[Lock] {}: {}", self.entity_id, err);
            }
        }
    }

    /// Mirror a known controller state onto the characteristics.
    pub fn apply_controller_state(&self, state: ControllerState) {
        let mut awaiting_echo = self.awaiting_echo.lock();

        let current = state.current_state() as u8;
        self.current_state.set_value(current);
        debug!(
            "[Lock] {}: Updated current state to {} ({})",
            self.entity_id, state, current
        );

        // Target state only supports locked and unlocked
        if let Some(target) = state.target_state() {
            if *awaiting_echo {
                debug!(
                    "[Lock] {}: {} is the echo of our command, target left as is",
                    self.entity_id, state
                );
            } else {
                self.target_state.set_value(target as u8);
            }
            *awaiting_echo = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use crate::lock::LockService;
    use parking_lot::RwLock;
    use std::sync::Weak;

    /// Records every service call; optionally fails them.
    #[derive(Default)]
    struct RecordingDispatcher {
        calls: Mutex<Vec<ServiceCall>>,
        fail: bool,
    }

    impl RecordingDispatcher {
        fn failing() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn services(&self) -> Vec<LockService> {
            self.calls.lock().iter().map(|c| c.service).collect()
        }
    }

    impl LockCommandDispatcher for RecordingDispatcher {
        fn call_service(&self, call: &ServiceCall) -> std::result::Result<(), DispatchError> {
            self.calls.lock().push(call.clone());
            if self.fail {
                Err(DispatchError::Rejected("device offline".to_string()))
            } else {
                Ok(())
            }
        }
    }

    /// Reports the commanded state back to the bridge before returning,
    /// like a controller that updates its state machine in the same call.
    #[derive(Default)]
    struct EchoingDispatcher {
        bridge: RwLock<Weak<LockStateBridge>>,
    }

    impl LockCommandDispatcher for EchoingDispatcher {
        fn call_service(&self, call: &ServiceCall) -> std::result::Result<(), DispatchError> {
            let state = match call.service {
                LockService::Lock => "locked",
                LockService::Unlock => "unlocked",
            };
            if let Some(bridge) = self.bridge.read().upgrade() {
                bridge.on_controller_state_update(Some(state));
            }
            Ok(())
        }
    }

    fn recording_bridge() -> (LockStateBridge, Arc<RecordingDispatcher>) {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let bridge = LockStateBridge::new("lock.front_door", dispatcher.clone());
        (bridge, dispatcher)
    }

    fn values(bridge: &LockStateBridge) -> (u8, u8, bool) {
        (
            bridge.current_state().get(),
            bridge.target_state().get(),
            *bridge.awaiting_echo.lock(),
        )
    }

    #[test]
    fn test_defaults() {
        let (bridge, dispatcher) = recording_bridge();
        assert_eq!(values(&bridge), (3, 1, false));
        assert_eq!(bridge.entity_id(), "lock.front_door");
        assert!(dispatcher.calls.lock().is_empty());
    }

    #[test]
    fn test_empty_update_is_ignored() {
        let (bridge, _) = recording_bridge();
        *bridge.awaiting_echo.lock() = true;
        bridge.on_controller_state_update(None);
        assert_eq!(values(&bridge), (3, 1, true));
        assert_eq!(bridge.current_state().version(), 0);
    }

    #[test]
    fn test_external_change_updates_target() {
        let (bridge, dispatcher) = recording_bridge();
        bridge.on_controller_state_update(Some("unlocked"));
        assert_eq!(values(&bridge), (0, 0, false));

        bridge.on_controller_state_update(Some("locked"));
        assert_eq!(values(&bridge), (1, 1, false));
        assert!(dispatcher.calls.lock().is_empty());
    }

    #[test]
    fn test_target_write_dispatches_command() {
        let (bridge, dispatcher) = recording_bridge();
        bridge.on_protocol_target_write(0).unwrap();

        let calls = dispatcher.calls.lock();
        assert_eq!(
            *calls,
            vec![ServiceCall::new("lock", LockService::Unlock, "lock.front_door")]
        );
        assert!(*bridge.awaiting_echo.lock());
    }

    #[test]
    fn test_echo_does_not_rewrite_target() {
        let (bridge, _) = recording_bridge();
        bridge.on_controller_state_update(Some("locked"));
        assert_eq!(values(&bridge), (1, 1, false));

        bridge.on_protocol_target_write(0).unwrap();
        let target_version = bridge.target_state().version();

        bridge.on_controller_state_update(Some("unlocked"));
        assert_eq!(values(&bridge), (0, 1, false));
        assert_eq!(bridge.target_state().version(), target_version);
    }

    #[test]
    fn test_synchronous_echo_is_suppressed() {
        let dispatcher = Arc::new(EchoingDispatcher::default());
        let bridge = Arc::new(LockStateBridge::new("lock.front_door", dispatcher.clone()));
        *dispatcher.bridge.write() = Arc::downgrade(&bridge);

        bridge.on_controller_state_update(Some("unlocked"));
        assert_eq!(values(&bridge), (0, 0, false));

        bridge.on_protocol_target_write(1).unwrap();
        assert_eq!(values(&bridge), (1, 0, false));
    }

    #[test]
    fn test_flag_is_consumed_once() {
        let (bridge, _) = recording_bridge();
        bridge.on_controller_state_update(Some("unlocked"));
        bridge.on_protocol_target_write(1).unwrap();

        bridge.on_controller_state_update(Some("locked"));
        assert_eq!(values(&bridge), (1, 0, false));

        // Someone unlocks by hand right after; this must propagate
        bridge.on_controller_state_update(Some("unlocked"));
        assert_eq!(values(&bridge), (0, 0, false));
    }

    #[test]
    fn test_unknown_leaves_target_and_flag() {
        let (bridge, _) = recording_bridge();
        bridge.on_controller_state_update(Some("unlocked"));

        bridge.on_controller_state_update(Some("unknown"));
        assert_eq!(values(&bridge), (3, 0, false));

        bridge.on_protocol_target_write(1).unwrap();
        bridge.on_controller_state_update(Some("unknown"));
        assert_eq!(values(&bridge), (3, 0, true));
    }

    #[test]
    fn test_flag_survives_unknown_until_next_binary_update() {
        let (bridge, _) = recording_bridge();
        bridge.on_controller_state_update(Some("unlocked"));
        bridge.on_protocol_target_write(1).unwrap();

        bridge.on_controller_state_update(Some("unknown"));
        assert!(*bridge.awaiting_echo.lock());

        // The pending flag suppresses whatever binary update comes next
        bridge.on_controller_state_update(Some("unlocked"));
        assert_eq!(values(&bridge), (0, 0, false));
        bridge.on_controller_state_update(Some("locked"));
        assert_eq!(values(&bridge), (1, 1, false));
    }

    #[test]
    fn test_invalid_target_is_rejected() {
        let (bridge, dispatcher) = recording_bridge();
        bridge.on_controller_state_update(Some("unlocked"));

        for value in [2, 3] {
            let err = bridge.on_protocol_target_write(value).unwrap_err();
            assert!(matches!(err, BridgeError::InvalidTargetValue(v) if v == value));
        }
        assert_eq!(values(&bridge), (0, 0, false));
        assert!(dispatcher.calls.lock().is_empty());
    }

    #[test]
    fn test_dispatch_failure_keeps_flag() {
        let dispatcher = Arc::new(RecordingDispatcher::failing());
        let bridge = LockStateBridge::new("lock.front_door", dispatcher.clone());

        let err = bridge.on_protocol_target_write(0).unwrap_err();
        match err {
            BridgeError::CommandDispatchFailed {
                service, entity_id, ..
            } => {
                assert_eq!(service, LockService::Unlock);
                assert_eq!(entity_id, "lock.front_door");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(*bridge.awaiting_echo.lock());
        assert_eq!(dispatcher.services(), vec![LockService::Unlock]);

        // An unrelated update still consumes it
        bridge.on_controller_state_update(Some("unlocked"));
        assert_eq!(values(&bridge), (0, 1, false));
    }

    #[test]
    fn test_unrecognized_state_changes_nothing() {
        let (bridge, _) = recording_bridge();
        bridge.on_controller_state_update(Some("locked"));
        bridge.on_protocol_target_write(0).unwrap();

        for raw in ["jammed", "unavailable", "", "LOCKED"] {
            bridge.on_controller_state_update(Some(raw));
        }
        assert_eq!(values(&bridge), (1, 1, true));
        assert_eq!(bridge.current_state().version(), 1);
    }

    #[test]
    fn test_repeated_update_is_idempotent() {
        let (bridge, _) = recording_bridge();
        for _ in 0..3 {
            bridge.on_controller_state_update(Some("locked"));
            assert_eq!(values(&bridge), (1, 1, false));
        }
        for _ in 0..3 {
            bridge.on_controller_state_update(Some("unknown"));
            assert_eq!(values(&bridge), (3, 1, false));
        }
    }

    #[test]
    fn test_lock_unlock_scenario() {
        let (bridge, dispatcher) = recording_bridge();
        assert_eq!(values(&bridge), (3, 1, false));

        bridge.on_controller_state_update(Some("unlocked"));
        assert_eq!(values(&bridge), (0, 0, false));

        bridge.on_protocol_target_write(1).unwrap();
        assert_eq!(dispatcher.services(), vec![LockService::Lock]);
        assert_eq!(values(&bridge), (0, 0, true));

        // Target is not rewritten by the echo
        bridge.on_controller_state_update(Some("locked"));
        assert_eq!(values(&bridge), (1, 0, false));
    }

    #[test]
    fn test_client_write_stores_target() {
        let (bridge, dispatcher) = recording_bridge();
        bridge.on_controller_state_update(Some("unlocked"));

        bridge.on_client_target_write(1).unwrap();
        assert_eq!(values(&bridge), (0, 1, true));
        assert_eq!(dispatcher.services(), vec![LockService::Lock]);

        bridge.on_controller_state_update(Some("locked"));
        assert_eq!(values(&bridge), (1, 1, false));

        let err = bridge.on_client_target_write(2).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidTargetValue(2)));
        assert_eq!(values(&bridge), (1, 1, false));
    }

    #[test]
    fn test_client_write_stores_target_inside_critical_section() {
        let (bridge, _) = recording_bridge();
        let bridge = Arc::new(bridge);

        // The pusher runs during the target store; the bridge lock must be
        // held then, so a controller update cannot slip in before the flag.
        let held = Arc::new(Mutex::new(Vec::new()));
        let sink = held.clone();
        let weak = Arc::downgrade(&bridge);
        bridge.target_state().set_pusher(Arc::new(move |_value: u8| {
            if let Some(bridge) = weak.upgrade() {
                sink.lock().push(bridge.awaiting_echo.try_lock().is_none());
            }
        }));

        bridge.on_client_target_write(0).unwrap();
        assert_eq!(*held.lock(), vec![true]);
        assert!(*bridge.awaiting_echo.lock());
    }

    #[test]
    fn test_concurrent_updates_leave_flag_consistent() {
        let (bridge, dispatcher) = recording_bridge();
        let bridge = Arc::new(bridge);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let bridge = bridge.clone();
                std::thread::spawn(move || {
                    for n in 0..100 {
                        if (i + n) % 2 == 0 {
                            bridge.on_protocol_target_write((n % 2) as u8).unwrap();
                        } else {
                            let state = if n % 3 == 0 { "locked" } else { "unlocked" };
                            bridge.on_controller_state_update(Some(state));
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // One final binary update always leaves the bridge idle
        bridge.on_controller_state_update(Some("locked"));
        assert!(!*bridge.awaiting_echo.lock());
        assert_eq!(bridge.current_state().get(), 1);
        assert_eq!(dispatcher.calls.lock().len(), 200);
    }
}
