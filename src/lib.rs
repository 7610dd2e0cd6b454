//! Virtual Lock Bridge library.
//!
//! Keeps a smart-home lock entity and an accessory-protocol lock mechanism
//! in sync, in both directions, without feedback loops.

pub mod config;
pub mod error;
pub mod input;
pub mod lock;
