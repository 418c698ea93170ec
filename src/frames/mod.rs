//! Navigation frames
//!
//! A frame is one navigable screen: it owns a 5x3 tile grid and the input
//! handling for as long as it sits on top of the stack. The set of frame
//! kinds is closed; pushing is done by spec value, not by type.

pub mod bucket_menu;
pub mod character_select;
pub mod character_splash;
pub mod icons;
pub mod stack;

#[cfg(test)]
pub(crate) mod testutil;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::app::DeckContext;
use crate::device::{GRID_COLUMNS, GRID_ROWS};
use crate::model::{CharacterSummary, InventorySnapshot};

pub use stack::FrameStack;

/// One key's visual content
#[derive(Debug, Clone, Default)]
pub enum TileValue {
    /// Nothing; renders as the device blank
    #[default]
    Empty,
    /// A service image route, fetched through the asset cache at render
    RemoteImageRef(String),
    /// Already-composed native bytes, rendered directly
    RenderedImage(Vec<u8>),
}

/// A frame's tile grid plus its active flag.
///
/// The one mutex wrapping this struct is the only synchronization between
/// the input path and the frame's poller: grid writes and active-flag
/// flips both go through it.
#[derive(Debug, Clone)]
pub struct GridState {
    tiles: [[TileValue; GRID_ROWS]; GRID_COLUMNS],
    pub active: bool,
}

impl GridState {
    pub fn new() -> Self {
        Self {
            tiles: std::array::from_fn(|_| std::array::from_fn(|_| TileValue::Empty)),
            active: false,
        }
    }

    pub fn get(&self, x: usize, y: usize) -> &TileValue {
        &self.tiles[x][y]
    }

    pub fn set(&mut self, x: usize, y: usize, tile: TileValue) {
        self.tiles[x][y] = tile;
    }
}

impl Default for GridState {
    fn default() -> Self {
        Self::new()
    }
}

/// Grid handle shared between a frame and its background work
pub type SharedGrid = Arc<Mutex<GridState>>;

/// Latest inventory snapshot for a character session, owned by the
/// splash frame's poller and read by bucket menus stacked above it
pub type SharedSnapshot = Arc<Mutex<Option<InventorySnapshot>>>;

pub fn new_shared_grid() -> SharedGrid {
    Arc::new(Mutex::new(GridState::new()))
}

/// Closed set of frame kinds with their typed payloads
#[derive(Debug, Clone)]
pub enum FrameSpec {
    CharacterSelect {
        characters: Vec<CharacterSummary>,
    },
    CharacterSplash {
        character: CharacterSummary,
    },
    BucketMenu {
        bucket_hash: u32,
        bucket_index: usize,
        /// Tile of the pressed bucket, echoed in the menu corner
        source_tile: TileValue,
        character_id: String,
        snapshot: SharedSnapshot,
    },
}

impl FrameSpec {
    /// Kind tag for logging
    pub fn kind(&self) -> &'static str {
        match self {
            FrameSpec::CharacterSelect { .. } => "character-select",
            FrameSpec::CharacterSplash { .. } => "character-splash",
            FrameSpec::BucketMenu { .. } => "bucket-menu",
        }
    }
}

/// What a press handler asks the stack to do once it returns
#[derive(Debug)]
pub enum FrameAction {
    /// Nothing further
    None,
    /// Push a new frame on top
    Push(FrameSpec),
    /// Pop this frame
    Pop,
    /// Re-render the grid
    Render,
}

/// One navigable screen
pub trait Frame: Send {
    /// Kind tag for logging
    fn kind(&self) -> &'static str;

    /// The frame's grid handle
    fn grid(&self) -> &SharedGrid;

    /// Populate the grid; may block on remote calls. A failed setup
    /// aborts the push.
    fn setup(&mut self, ctx: &DeckContext) -> anyhow::Result<()>;

    /// Handle a press at grid coordinates
    fn press(&mut self, ctx: &DeckContext, x: usize, y: usize) -> anyhow::Result<FrameAction>;

    /// Flip the active flag under the grid mutex
    fn set_active(&self, active: bool) {
        self.grid().lock().active = active;
    }

    /// Release background work; must block until it is fully released
    fn destroy(&mut self) {}
}

/// Construct the frame for a spec
pub fn build_frame(spec: FrameSpec) -> Box<dyn Frame> {
    match spec {
        FrameSpec::CharacterSelect { characters } => {
            Box::new(character_select::CharacterSelectFrame::new(characters))
        }
        FrameSpec::CharacterSplash { character } => {
            Box::new(character_splash::CharacterSplashFrame::new(character))
        }
        FrameSpec::BucketMenu {
            bucket_hash,
            bucket_index,
            source_tile,
            character_id,
            snapshot,
        } => Box::new(bucket_menu::BucketMenuFrame::new(
            bucket_hash,
            bucket_index,
            source_tile,
            character_id,
            snapshot,
        )),
    }
}
