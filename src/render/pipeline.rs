//! Tile composition pipeline
//!
//! Converts abstract tile content into the device's native pixel format:
//! resize to the tile dimensions, draw overlay graphics (stat badges, ammo
//! boxes, labels), then reorder channels for the device. Stateless apart
//! from the loaded overlay font; safe to call from any thread.

use std::path::Path;
use std::fs;

use ab_glyph::{FontArc, PxScale};
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, Blend};
use imageproc::rect::Rect;
use thiserror::Error;

use crate::device::{ImageSpec, PixelOrder};

/// Vertical advance between text lines, as a multiple of the font size
const LINE_SPACING: f32 = 1.2;

/// Rendering errors
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// One graphic composed onto a tile at a fixed pixel offset
#[derive(Debug, Clone)]
pub enum Overlay {
    /// Flat color rectangle, alpha-blended over the tile
    Rect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        color: [u8; 4],
    },
    /// Text label; skipped (with a one-time warning at load) when no
    /// overlay font is available
    Text {
        x: i32,
        y: i32,
        size: f32,
        color: [u8; 4],
        text: String,
    },
    /// Another image pasted over the tile, resized and alpha-composited
    Icon {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
        image: DynamicImage,
    },
}

/// Stateless tile composer
pub struct RenderPipeline {
    font: Option<FontArc>,
}

impl RenderPipeline {
    /// Create a pipeline, loading the overlay font when configured.
    /// A missing font degrades to rect-only overlays.
    pub fn new(font_path: Option<&Path>) -> Self {
        let font = font_path.and_then(|path| match fs::read(path) {
            Ok(bytes) => match FontArc::try_from_vec(bytes) {
                Ok(font) => {
                    log::info!("Loaded overlay font from {}", path.display());
                    Some(font)
                }
                Err(e) => {
                    log::warn!("Unusable overlay font {}: {}. Text overlays disabled.", path.display(), e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Could not read overlay font {}: {}. Text overlays disabled.", path.display(), e);
                None
            }
        });
        Self { font }
    }

    /// Decode raw fetched bytes into an image
    pub fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, RenderError> {
        Ok(image::load_from_memory(bytes)?)
    }

    /// Compose a source image plus overlays into native device bytes
    pub fn compose(
        &self,
        source: &DynamicImage,
        overlays: &[Overlay],
        spec: ImageSpec,
    ) -> Vec<u8> {
        let resized =
            imageops::resize(source, spec.width, spec.height, imageops::FilterType::Lanczos3);
        let composed = self.apply_overlays(resized, overlays);
        to_native(&composed, spec)
    }

    /// A solid-color tile with optional overlays
    pub fn solid_tile(&self, color: [u8; 3], overlays: &[Overlay], spec: ImageSpec) -> Vec<u8> {
        let mut canvas = RgbaImage::new(spec.width, spec.height);
        for pixel in canvas.pixels_mut() {
            *pixel = Rgba([color[0], color[1], color[2], 255]);
        }
        let composed = self.apply_overlays(canvas, overlays);
        to_native(&composed, spec)
    }

    /// A black tile carrying left-aligned text lines, used for the
    /// loading tile and character info tiles
    pub fn text_tile(&self, lines: &[String], size: f32, spec: ImageSpec) -> Vec<u8> {
        let overlays: Vec<Overlay> = lines
            .iter()
            .enumerate()
            .map(|(i, line)| Overlay::Text {
                x: 8,
                y: 8 + (i as f32 * size * LINE_SPACING) as i32,
                size,
                color: [255, 255, 255, 255],
                text: line.clone(),
            })
            .collect();
        self.solid_tile([0, 0, 0], &overlays, spec)
    }

    /// Whether text overlays will actually draw
    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    fn apply_overlays(&self, base: RgbaImage, overlays: &[Overlay]) -> RgbaImage {
        let mut canvas = Blend(base);
        for overlay in overlays {
            match overlay {
                Overlay::Rect { x, y, width, height, color } => {
                    draw_filled_rect_mut(
                        &mut canvas,
                        Rect::at(*x, *y).of_size(*width, *height),
                        Rgba(*color),
                    );
                }
                Overlay::Text { x, y, size, color, text } => {
                    if let Some(font) = &self.font {
                        draw_text_mut(
                            &mut canvas,
                            Rgba(*color),
                            *x,
                            *y,
                            PxScale::from(*size),
                            font,
                            text,
                        );
                    }
                }
                Overlay::Icon { x, y, width, height, image } => {
                    let icon =
                        imageops::resize(image, *width, *height, imageops::FilterType::Lanczos3);
                    imageops::overlay(&mut canvas.0, &icon, *x, *y);
                }
            }
        }
        canvas.0
    }
}

/// Reorder an RGBA canvas into the device's 3-channel native format
fn to_native(image: &RgbaImage, spec: ImageSpec) -> Vec<u8> {
    let mut out = Vec::with_capacity(spec.byte_len());
    for pixel in image.pixels() {
        let [r, g, b, _] = pixel.0;
        match spec.order {
            PixelOrder::Rgb => out.extend_from_slice(&[r, g, b]),
            PixelOrder::Bgr => out.extend_from_slice(&[b, g, r]),
        }
    }
    out
}
