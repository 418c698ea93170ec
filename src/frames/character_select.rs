//! Character selection screen
//!
//! Middle row shows one emblem per character with an info tile below it;
//! pressing an emblem opens that character's splash screen.

use crate::app::DeckContext;
use crate::device::Device;
use crate::model::CharacterSummary;

use super::{icons, new_shared_grid, Frame, FrameAction, FrameSpec, SharedGrid, TileValue};

/// Columns 1..=3 hold the character slots
const FIRST_SLOT_COLUMN: usize = 1;
const SLOT_COUNT: usize = 3;

pub struct CharacterSelectFrame {
    grid: SharedGrid,
    characters: Vec<CharacterSummary>,
}

impl CharacterSelectFrame {
    pub fn new(characters: Vec<CharacterSummary>) -> Self {
        Self {
            grid: new_shared_grid(),
            characters,
        }
    }
}

impl Frame for CharacterSelectFrame {
    fn kind(&self) -> &'static str {
        "character-select"
    }

    fn grid(&self) -> &SharedGrid {
        &self.grid
    }

    fn setup(&mut self, ctx: &DeckContext) -> anyhow::Result<()> {
        self.characters.truncate(SLOT_COUNT);

        // Compose everything before taking the grid lock
        let choose = ctx
            .pipeline
            .text_tile(&["Choose".to_string()], 12.0, ctx.device.image_spec());
        let info_tiles: Vec<Vec<u8>> = self
            .characters
            .iter()
            .map(|c| icons::info_tile(ctx, c))
            .collect();
        let filler = icons::filler_tile(ctx);

        let mut grid = self.grid.lock();
        grid.set(2, 0, TileValue::RenderedImage(choose));
        for (i, character) in self.characters.iter().enumerate() {
            let x = FIRST_SLOT_COLUMN + i;
            grid.set(x, 1, TileValue::RemoteImageRef(character.emblem_route.clone()));
            grid.set(x, 2, TileValue::RenderedImage(info_tiles[i].clone()));
        }
        // Gray out character slots nobody fills
        for x in (FIRST_SLOT_COLUMN + self.characters.len())..(FIRST_SLOT_COLUMN + SLOT_COUNT) {
            grid.set(x, 1, TileValue::RenderedImage(filler.clone()));
        }
        Ok(())
    }

    fn press(&mut self, _ctx: &DeckContext, x: usize, y: usize) -> anyhow::Result<FrameAction> {
        if y == 1 && (FIRST_SLOT_COLUMN..FIRST_SLOT_COLUMN + SLOT_COUNT).contains(&x) {
            let index = x - FIRST_SLOT_COLUMN;
            if let Some(character) = self.characters.get(index) {
                return Ok(FrameAction::Push(FrameSpec::CharacterSplash {
                    character: character.clone(),
                }));
            }
        }
        Ok(FrameAction::None)
    }
}
