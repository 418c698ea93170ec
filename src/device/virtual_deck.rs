//! Virtual deck backend
//!
//! Stands in for real hardware: remembers every key image written to it,
//! serves injected key events, and can dump tiles as PNGs for eyeballing
//! composed output. Doubles as the device used by tests.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use std::thread;

use parking_lot::Mutex;

use super::{Device, DeviceError, ImageSpec, KeyEvent, PixelOrder, KEY_COUNT};

/// Tile edge length, matching the common 72px hardware tile
const TILE_SIZE: u32 = 72;

pub struct VirtualDeck {
    spec: ImageSpec,
    /// Last image written per key
    keys: Mutex<Vec<Vec<u8>>>,
    /// Injected input events waiting to be polled
    events: Mutex<VecDeque<KeyEvent>>,
    /// Total `set_key_image` calls
    writes: AtomicUsize,
    /// Where to dump tiles as PNGs, when set
    dump_dir: Option<PathBuf>,
}

impl VirtualDeck {
    pub fn new(dump_dir: Option<PathBuf>) -> Self {
        Self {
            spec: ImageSpec {
                width: TILE_SIZE,
                height: TILE_SIZE,
                order: PixelOrder::Rgb,
            },
            keys: Mutex::new(vec![Vec::new(); KEY_COUNT]),
            events: Mutex::new(VecDeque::new()),
            writes: AtomicUsize::new(0),
            dump_dir: dump_dir.map(|dir| dir.join("deck-dump")),
        }
    }

    /// Queue a press/release pair for a key, as hardware would deliver it
    pub fn inject_key(&self, index: u8) {
        let mut events = self.events.lock();
        events.push_back(KeyEvent { index, pressed: true });
        events.push_back(KeyEvent { index, pressed: false });
    }

    /// Last image written to a key (empty until first write)
    pub fn key_image(&self, index: u8) -> Vec<u8> {
        self.keys.lock()[index as usize].clone()
    }

    /// Number of keys that have been written at least once
    pub fn written_keys(&self) -> usize {
        self.keys.lock().iter().filter(|k| !k.is_empty()).count()
    }

    /// Total number of key writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn dump(&self, index: u8, image: &[u8]) {
        let Some(dir) = &self.dump_dir else { return };
        if std::fs::create_dir_all(dir).is_err() {
            return;
        }
        let Some(rgb) =
            image::RgbImage::from_raw(self.spec.width, self.spec.height, image.to_vec())
        else {
            return;
        };
        let path = dir.join(format!("key-{:02}.png", index));
        if let Err(e) = rgb.save(&path) {
            log::debug!("Could not dump key {} to {}: {}", index, path.display(), e);
        }
    }
}

impl Device for VirtualDeck {
    fn image_spec(&self) -> ImageSpec {
        self.spec
    }

    fn set_key_image(&self, index: u8, image: &[u8]) -> Result<(), DeviceError> {
        assert!((index as usize) < KEY_COUNT, "key index {} outside 5x3 grid", index);
        if image.len() != self.spec.byte_len() {
            return Err(DeviceError::Write(format!(
                "expected {} bytes, got {}",
                self.spec.byte_len(),
                image.len()
            )));
        }
        self.keys.lock()[index as usize] = image.to_vec();
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.dump(index, image);
        Ok(())
    }

    fn poll_key(&self, timeout: Duration) -> Result<Option<KeyEvent>, DeviceError> {
        if let Some(event) = self.events.lock().pop_front() {
            return Ok(Some(event));
        }
        thread::sleep(timeout);
        Ok(self.events.lock().pop_front())
    }
}
