//! Griddeck - a 5x3 grid-deck companion for a remote game service
//!
//! Drives a 15-key grid device whose tiles mirror a player's characters
//! and equipment, pulling definitions and images through local caches and
//! keeping live inventory fresh with background polling.

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod device;
pub mod frames;
pub mod model;
pub mod poll;
pub mod render;

// Re-export commonly used types
pub use app::{Deck, DeckContext};
pub use config::{Session, Settings};
pub use device::Device;
pub use frames::{FrameSpec, FrameStack, TileValue};
