//! Protocol-side lock mechanism characteristics.
//!
//! Provides thread-safe value holders for the current-state and target-state
//! characteristics. Writes are last-value-wins; an optional pusher forwards
//! every write to whatever transport exposes the characteristic to clients.

use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

/// Callback invoked with the new raw value on every characteristic write.
pub type ValuePusher = Arc<dyn Fn(u8) + Send + Sync>;

/// Thread-safe characteristic value.
///
/// The version is incremented each time the value actually changes, so
/// readers can detect updates without comparing values.
pub struct LockCharacteristic {
    name: &'static str,
    value: AtomicU8,
    version: AtomicU32,
    pusher: RwLock<Option<ValuePusher>>,
}

impl LockCharacteristic {
    /// Create a new characteristic with the given initial value.
    pub fn new(name: &'static str, initial: u8) -> Self {
        Self {
            name,
            value: AtomicU8::new(initial),
            version: AtomicU32::new(0),
            pusher: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get the current raw value.
    pub fn get(&self) -> u8 {
        self.value.load(Ordering::SeqCst)
    }

    /// Get the change counter.
    pub fn version(&self) -> u32 {
        self.version.load(Ordering::SeqCst)
    }

    /// Write a new value. Increments version if the value changed.
    ///
    /// The pusher runs on every write, changed or not.
    pub fn set_value(&self, value: u8) {
        let old = self.value.swap(value, Ordering::SeqCst);
        if old != value {
            self.version.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(pusher) = self.pusher.read().as_ref() {
            pusher(value);
        }
    }

    /// Attach the transport callback for outgoing writes.
    pub fn set_pusher(&self, pusher: ValuePusher) {
        *self.pusher.write() = Some(pusher);
    }
}
