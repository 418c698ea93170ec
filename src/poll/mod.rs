//! Background polling
//!
//! Cooperative interval loops that keep per-character inventory state
//! fresh and repaint only what changed.

pub mod service;

pub use service::{InventoryWatcher, PollingHandle};
