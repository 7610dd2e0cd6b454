//! Lock accessory core.
//!
//! Maps a controller lock entity onto a protocol lock mechanism
//! (current-state and target-state characteristics) and keeps both in sync
//! without feedback loops.

pub mod bridge;
pub mod characteristic;
pub mod command;
pub mod state;

pub use bridge::LockStateBridge;
pub use characteristic::{LockCharacteristic, ValuePusher};
pub use command::{LockCommandDispatcher, ServiceCall};
pub use state::{ControllerState, LOCK_DOMAIN, LockCurrentState, LockService, LockTargetState};
