//! Tile rendering
//!
//! Pure composition of tile images into the device's native pixel format.

pub mod pipeline;

pub use pipeline::{Overlay, RenderError, RenderPipeline};
