//! Grid device boundary
//!
//! The physical device is a 15-key grid arranged 5 wide by 3 tall. This
//! module owns the key-index geometry and the `Device` trait everything
//! renders through; actual driver bring-up lives behind the trait.

pub mod virtual_deck;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::Settings;

pub use virtual_deck::VirtualDeck;

/// Grid width in keys
pub const GRID_COLUMNS: usize = 5;
/// Grid height in keys
pub const GRID_ROWS: usize = 3;
/// Total number of keys
pub const KEY_COUNT: usize = GRID_COLUMNS * GRID_ROWS;

/// Device boundary errors
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no grid device detected (set `virtual_deck` in settings to run without hardware)")]
    NoDevice,
    #[error("key image write failed: {0}")]
    Write(String),
    #[error("input read failed: {0}")]
    Input(String),
}

/// A single key press or release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub index: u8,
    pub pressed: bool,
}

/// Channel order of the device's native pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelOrder {
    Rgb,
    Bgr,
}

/// Pixel format a device expects for key images (8 bits per channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSpec {
    pub width: u32,
    pub height: u32,
    pub order: PixelOrder,
}

impl ImageSpec {
    /// Byte length of one native key image
    pub fn byte_len(&self) -> usize {
        (self.width * self.height * 3) as usize
    }
}

/// Map grid coordinates to a key index.
///
/// Panics outside the 5x3 grid; callers iterate the fixed grid constants,
/// so an out-of-range coordinate is a bug, not an input condition.
pub fn key_index(x: usize, y: usize) -> u8 {
    assert!(x < GRID_COLUMNS && y < GRID_ROWS, "key ({}, {}) outside 5x3 grid", x, y);
    (y * GRID_COLUMNS + x) as u8
}

/// Map a key index back to grid coordinates. Panics for indices >= 15.
pub fn key_coords(index: u8) -> (usize, usize) {
    assert!((index as usize) < KEY_COUNT, "key index {} outside 5x3 grid", index);
    let x = index as usize % GRID_COLUMNS;
    let y = (index as usize - x) / GRID_COLUMNS;
    (x, y)
}

/// The physical (or virtual) grid device
pub trait Device: Send + Sync {
    /// Pixel format for `set_key_image`
    fn image_spec(&self) -> ImageSpec;

    /// The all-black native image used for empty tiles
    fn blank_image(&self) -> Vec<u8> {
        vec![0; self.image_spec().byte_len()]
    }

    /// Write one key's image in the device's native format
    fn set_key_image(&self, index: u8, image: &[u8]) -> Result<(), DeviceError>;

    /// Pull the next key event, waiting up to `timeout`
    fn poll_key(&self, timeout: Duration) -> Result<Option<KeyEvent>, DeviceError>;

    /// Release the device
    fn close(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Open the first usable device.
///
/// Hardware enumeration is a driver concern behind this boundary; this
/// build ships the virtual backend, opted into via settings. Startup with
/// nothing usable is fatal for the caller.
pub fn open_default(settings: &Settings) -> Result<Arc<dyn Device>, DeviceError> {
    if settings.virtual_deck {
        log::info!("Opening virtual deck");
        return Ok(Arc::new(VirtualDeck::new(settings.cache_dir.clone())));
    }
    Err(DeviceError::NoDevice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_key_mapping_is_a_bijection() {
        let mut seen = HashSet::new();
        for index in 0..KEY_COUNT as u8 {
            let (x, y) = key_coords(index);
            assert!(x < GRID_COLUMNS);
            assert!(y < GRID_ROWS);
            assert_eq!(key_index(x, y), index);
            assert!(seen.insert((x, y)), "duplicate coords for index {}", index);
        }
        assert_eq!(seen.len(), KEY_COUNT);
    }

    #[test]
    fn test_known_positions() {
        assert_eq!(key_index(0, 0), 0);
        assert_eq!(key_index(4, 0), 4);
        assert_eq!(key_index(0, 1), 5);
        assert_eq!(key_index(4, 2), 14);
        assert_eq!(key_coords(7), (2, 1));
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_coords_panic() {
        key_index(5, 0);
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_index_panics() {
        key_coords(15);
    }

    #[test]
    fn test_blank_image_matches_spec() {
        let deck = VirtualDeck::new(None);
        let blank = deck.blank_image();
        assert_eq!(blank.len(), deck.image_spec().byte_len());
        assert!(blank.iter().all(|&b| b == 0));
    }
}
