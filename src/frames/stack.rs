//! Frame stack
//!
//! Ordered stack of frames; the top frame is the active one, receives all
//! input, and is what the device shows. Push and pop mutate the stack and
//! re-render the whole grid; handler failures are caught at the dispatch
//! boundary so the stack stays usable.

use crate::app::DeckContext;
use crate::device::{key_coords, key_index, Device, GRID_COLUMNS, GRID_ROWS, KEY_COUNT};

use super::{build_frame, Frame, FrameAction, FrameSpec, GridState, TileValue};

/// Navigation stack; index 0 is the top
pub struct FrameStack {
    ctx: DeckContext,
    frames: Vec<Box<dyn Frame>>,
}

impl FrameStack {
    /// Create an empty stack and blank the device
    pub fn new(ctx: DeckContext) -> Self {
        let stack = Self {
            ctx,
            frames: Vec::new(),
        };
        stack.render_full();
        stack
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Push a new frame: deactivate the current top, run the new frame's
    /// setup (which may block on remote calls), insert it on top, and
    /// re-render. A failed setup leaves the stack as it was.
    pub fn push(&mut self, spec: FrameSpec) -> anyhow::Result<()> {
        log::info!("Pushing {} frame", spec.kind());
        self.install(build_frame(spec))
    }

    fn install(&mut self, mut frame: Box<dyn Frame>) -> anyhow::Result<()> {
        if let Some(top) = self.frames.first() {
            top.set_active(false);
        }
        if let Err(e) = frame.setup(&self.ctx) {
            if let Some(top) = self.frames.first() {
                top.set_active(true);
            }
            return Err(e);
        }
        frame.set_active(true);
        self.frames.insert(0, frame);
        self.render_full();
        Ok(())
    }

    /// Pop the top frame. Its destroy runs to completion (joining any
    /// background work) before the frame below is reactivated.
    pub fn pop(&mut self) {
        if self.frames.is_empty() {
            return;
        }
        let mut frame = self.frames.remove(0);
        log::info!("Popping {} frame", frame.kind());
        frame.set_active(false);
        frame.destroy();
        drop(frame);

        if let Some(top) = self.frames.first() {
            top.set_active(true);
        }
        self.render_full();
    }

    /// Route a key event to the top frame. Only the press-down edge
    /// dispatches; releases and presses on an empty stack are ignored.
    pub fn dispatch(&mut self, index: u8, pressed: bool) {
        if !pressed || self.frames.is_empty() {
            return;
        }
        let (x, y) = key_coords(index);

        let action = match self.frames[0].press(&self.ctx, x, y) {
            Ok(action) => action,
            Err(e) => {
                log::warn!(
                    "{} press handler failed at ({}, {}): {:#}",
                    self.frames[0].kind(),
                    x,
                    y,
                    e
                );
                return;
            }
        };
        self.apply(action);
    }

    fn apply(&mut self, action: FrameAction) {
        match action {
            FrameAction::None => {}
            FrameAction::Render => self.render_full(),
            FrameAction::Pop => self.pop(),
            FrameAction::Push(spec) => {
                if let Err(e) = self.push(spec) {
                    log::error!("Push failed: {:#}", e);
                }
            }
        }
    }

    /// Render every key. An empty stack blanks the device; otherwise the
    /// top frame's grid is resolved tile by tile.
    pub fn render_full(&self) {
        match self.frames.first() {
            None => {
                let blank = self.ctx.device.blank_image();
                for index in 0..KEY_COUNT as u8 {
                    if let Err(e) = self.ctx.device.set_key_image(index, &blank) {
                        log::warn!("Key {} write failed: {}", index, e);
                    }
                }
            }
            Some(top) => {
                // Clone under the lock, resolve outside it; tile fetches
                // may hit the network
                let state = top.grid().lock().clone();
                render_grid(&self.ctx, &state);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn push_boxed(&mut self, frame: Box<dyn Frame>) -> anyhow::Result<()> {
        self.install(frame)
    }

    #[cfg(test)]
    pub(crate) fn top(&self) -> Option<&dyn Frame> {
        self.frames.first().map(|f| f.as_ref())
    }
}

/// Write one grid's 15 tiles to the device. Also used by pollers for
/// partial refreshes, which re-render the grid without touching the stack.
pub fn render_grid(ctx: &DeckContext, state: &GridState) {
    for y in 0..GRID_ROWS {
        for x in 0..GRID_COLUMNS {
            let native = resolve_tile(ctx, state.get(x, y));
            let index = key_index(x, y);
            if let Err(e) = ctx.device.set_key_image(index, &native) {
                log::warn!("Key {} write failed: {}", index, e);
            }
        }
    }
}

/// Resolve a tile to native bytes. A failed remote fetch degrades to the
/// blank tile rather than failing the whole render.
fn resolve_tile(ctx: &DeckContext, tile: &TileValue) -> Vec<u8> {
    match tile {
        TileValue::Empty => ctx.device.blank_image(),
        TileValue::RenderedImage(bytes) => bytes.clone(),
        TileValue::RemoteImageRef(route) => match render_remote(ctx, route) {
            Ok(native) => native,
            Err(e) => {
                log::warn!("Tile image {} unavailable: {:#}", route, e);
                ctx.device.blank_image()
            }
        },
    }
}

fn render_remote(ctx: &DeckContext, route: &str) -> anyhow::Result<Vec<u8>> {
    let bytes = ctx.fetch_asset(route)?;
    let image = ctx.pipeline.decode(&bytes)?;
    Ok(ctx.pipeline.compose(&image, &[], ctx.device.image_spec()))
}
