//! Lock state tables shared by the controller and protocol sides.
//!
//! The controller knows three states, the protocol's current-state
//! characteristic knows four (it can report a jammed mechanism) and the
//! target-state characteristic only accepts the two commandable values.
//! All conversions between these spaces live here.

use crate::error::BridgeError;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, FromRepr};

/// Service domain used for every lock command.
pub const LOCK_DOMAIN: &str = "lock";

/// Lock state as reported by the controller-side integration.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ControllerState {
    Locked,
    Unlocked,
    Unknown,
}

impl ControllerState {
    /// Value to show on the current-state characteristic.
    ///
    /// Never yields [`LockCurrentState::Jammed`].
    pub fn current_state(self) -> LockCurrentState {
        match self {
            Self::Unlocked => LockCurrentState::Unlocked,
            Self::Locked => LockCurrentState::Locked,
            Self::Unknown => LockCurrentState::Unknown,
        }
    }

    /// Value to show on the target-state characteristic, if representable.
    pub fn target_state(self) -> Option<LockTargetState> {
        match self {
            Self::Unlocked => Some(LockTargetState::Unlocked),
            Self::Locked => Some(LockTargetState::Locked),
            Self::Unknown => None,
        }
    }

    /// Service that drives the lock into this state. `Unknown` has none.
    pub fn service(self) -> Option<LockService> {
        match self {
            Self::Locked => Some(LockService::Lock),
            Self::Unlocked => Some(LockService::Unlock),
            Self::Unknown => None,
        }
    }
}

/// Lock mechanism current state characteristic value.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, FromRepr)]
#[repr(u8)]
pub enum LockCurrentState {
    Unlocked = 0,
    Locked = 1,
    /// Mechanism fault; the controller has no equivalent.
    Jammed = 2,
    Unknown = 3,
}

impl LockCurrentState {
    /// Controller state for this value. `Jammed` has none.
    pub fn controller_state(self) -> Option<ControllerState> {
        match self {
            Self::Unlocked => Some(ControllerState::Unlocked),
            Self::Locked => Some(ControllerState::Locked),
            Self::Jammed => None,
            Self::Unknown => Some(ControllerState::Unknown),
        }
    }
}

/// Lock mechanism target state characteristic value.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, FromRepr)]
#[repr(u8)]
pub enum LockTargetState {
    Unlocked = 0,
    Locked = 1,
}

impl LockTargetState {
    pub fn controller_state(self) -> ControllerState {
        match self {
            Self::Unlocked => ControllerState::Unlocked,
            Self::Locked => ControllerState::Locked,
        }
    }
}

impl TryFrom<u8> for LockTargetState {
    type Error = BridgeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_repr(value).ok_or(BridgeError::InvalidTargetValue(value))
    }
}

/// Controller services understood by a lock entity.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LockService {
    Lock,
    Unlock,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [ControllerState; 3] = [
        ControllerState::Locked,
        ControllerState::Unlocked,
        ControllerState::Unknown,
    ];

    #[test]
    fn test_current_state_round_trip() {
        for state in ALL_STATES {
            assert_eq!(state.current_state().controller_state(), Some(state));
        }
    }

    #[test]
    fn test_current_state_codes() {
        assert_eq!(ControllerState::Unlocked.current_state() as u8, 0);
        assert_eq!(ControllerState::Locked.current_state() as u8, 1);
        assert_eq!(ControllerState::Unknown.current_state() as u8, 3);
    }

    #[test]
    fn test_jammed_is_unreachable_from_controller() {
        for state in ALL_STATES {
            assert_ne!(state.current_state(), LockCurrentState::Jammed);
        }
        assert_eq!(LockCurrentState::Jammed.controller_state(), None);
    }

    #[test]
    fn test_target_state_from_raw() {
        assert_eq!(LockTargetState::try_from(0u8).ok(), Some(LockTargetState::Unlocked));
        assert_eq!(LockTargetState::try_from(1u8).ok(), Some(LockTargetState::Locked));
        for raw in [2u8, 3, 255] {
            assert!(matches!(
                LockTargetState::try_from(raw),
                Err(BridgeError::InvalidTargetValue(v)) if v == raw
            ));
        }
    }

    #[test]
    fn test_services() {
        assert_eq!(ControllerState::Locked.service(), Some(LockService::Lock));
        assert_eq!(ControllerState::Unlocked.service(), Some(LockService::Unlock));
        assert_eq!(ControllerState::Unknown.service(), None);
        assert_eq!(LockService::Lock.to_string(), "lock");
        assert_eq!(LockService::Unlock.to_string(), "unlock");
    }

    #[test]
    fn test_parse_controller_state() {
        assert_eq!("locked".parse::<ControllerState>().ok(), Some(ControllerState::Locked));
        assert_eq!("unlocked".parse::<ControllerState>().ok(), Some(ControllerState::Unlocked));
        assert_eq!("unknown".parse::<ControllerState>().ok(), Some(ControllerState::Unknown));
        assert!("jammed".parse::<ControllerState>().is_err());
        assert!("unavailable".parse::<ControllerState>().is_err());
    }

    #[test]
    fn test_target_states() {
        assert_eq!(ControllerState::Unknown.target_state(), None);
        for state in [ControllerState::Locked, ControllerState::Unlocked] {
            let target = state.target_state().unwrap();
            assert_eq!(target.controller_state(), state);
        }
    }
}
