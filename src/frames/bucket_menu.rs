//! Bucket menu screen
//!
//! Lists every carried item of one equipment bucket on a 3-wide local
//! grid (reverse x-order, like the hardware layout reads); pressing an
//! item asks the service to equip it, pressing the right column goes
//! back. The corner echoes the bucket tile this menu was opened from.

use std::collections::HashMap;

use anyhow::anyhow;
use serde_json::json;

use crate::api::GameApi;
use crate::app::DeckContext;

use super::{icons, new_shared_grid, Frame, FrameAction, SharedGrid, SharedSnapshot, TileValue};

/// Route items are equipped through
const EQUIP_ROUTE: &str = "/platform/actions/items/equip/";

/// Local item grid is 3 columns wide, 3 rows tall
const LOCAL_COLUMNS: usize = 3;
const MAX_ITEMS: usize = 9;

pub struct BucketMenuFrame {
    grid: SharedGrid,
    bucket_hash: u32,
    bucket_index: usize,
    source_tile: TileValue,
    character_id: String,
    snapshot: SharedSnapshot,
    /// Item instance id behind each populated position
    selections: HashMap<(usize, usize), String>,
}

impl BucketMenuFrame {
    pub fn new(
        bucket_hash: u32,
        bucket_index: usize,
        source_tile: TileValue,
        character_id: String,
        snapshot: SharedSnapshot,
    ) -> Self {
        Self {
            grid: new_shared_grid(),
            bucket_hash,
            bucket_index,
            source_tile,
            character_id,
            snapshot,
            selections: HashMap::new(),
        }
    }
}

impl Frame for BucketMenuFrame {
    fn kind(&self) -> &'static str {
        "bucket-menu"
    }

    fn grid(&self) -> &SharedGrid {
        &self.grid
    }

    fn setup(&mut self, ctx: &DeckContext) -> anyhow::Result<()> {
        // Echo the bucket tile this menu was opened from
        self.grid.lock().set(4, 0, self.source_tile.clone());

        let Some(snapshot) = self.snapshot.lock().clone() else {
            log::warn!(
                "No inventory snapshot yet for bucket {} menu",
                self.bucket_hash
            );
            return Ok(());
        };

        let mut tiles = Vec::new();
        for (i, item) in snapshot
            .carried_in(self.bucket_hash)
            .into_iter()
            .take(MAX_ITEMS)
            .enumerate()
        {
            let local_x = i % LOCAL_COLUMNS;
            let local_y = (i - local_x) / LOCAL_COLUMNS;
            let x = LOCAL_COLUMNS - local_x;

            match icons::item_tile(ctx, &snapshot, item) {
                Ok(native) => {
                    self.selections
                        .insert((x, local_y), item.item_instance_id.clone());
                    tiles.push((x, local_y, TileValue::RenderedImage(native)));
                }
                Err(e) => {
                    log::warn!("Item {} tile unavailable: {:#}", item.item_hash, e);
                    tiles.push((x, local_y, TileValue::RenderedImage(icons::filler_tile(ctx))));
                }
            }
        }
        log::info!(
            "Bucket {} (slot {}) menu lists {} item(s)",
            self.bucket_hash,
            self.bucket_index,
            tiles.len()
        );

        let mut grid = self.grid.lock();
        for (x, y, tile) in tiles {
            grid.set(x, y, tile);
        }
        Ok(())
    }

    fn press(&mut self, ctx: &DeckContext, x: usize, y: usize) -> anyhow::Result<FrameAction> {
        if x == 4 {
            return Ok(FrameAction::Pop);
        }
        if (1..=LOCAL_COLUMNS).contains(&x) {
            if let Some(instance_id) = self.selections.get(&(x, y)) {
                let (_, membership_type) = ctx
                    .session
                    .membership()
                    .ok_or_else(|| anyhow!("no game membership in session"))?;

                let response = ctx.api.post(
                    EQUIP_ROUTE,
                    &json!({
                        "itemId": instance_id,
                        "characterId": self.character_id,
                        "membershipType": membership_type,
                    }),
                )?;
                log::info!("Equip response: {}", response);
                // The poller picks the equipment change up on its next
                // cycle and repaints the splash tiles
            }
        }
        Ok(FrameAction::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::HttpMethod;
    use crate::frames::testutil::{inventory_view, test_context, FakeApi};
    use crate::model::InventorySnapshot;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn snapshot_with(carried: &[(u32, u32, &str)]) -> SharedSnapshot {
        let view = inventory_view(&[], carried);
        Arc::new(Mutex::new(Some(
            InventorySnapshot::from_view(&view).unwrap(),
        )))
    }

    fn menu(snapshot: SharedSnapshot) -> BucketMenuFrame {
        BucketMenuFrame::new(
            1000,
            0,
            TileValue::RenderedImage(vec![9; 72 * 72 * 3]),
            "char-a".to_string(),
            snapshot,
        )
    }

    #[test]
    fn test_setup_lays_items_out_in_reverse_x_order() {
        let dir = TempDir::new().expect("tempdir");
        let (ctx, _deck) = test_context(dir.path(), Arc::new(FakeApi::new()));

        let snapshot = snapshot_with(&[
            (1000, 111, "i-1"),
            (1000, 222, "i-2"),
            // Different bucket, not listed
            (2000, 333, "i-3"),
        ]);
        let mut frame = menu(snapshot);
        frame.setup(&ctx).unwrap();

        // First item lands at x=3, second at x=2
        assert_eq!(frame.selections.get(&(3, 0)).unwrap(), "i-1");
        assert_eq!(frame.selections.get(&(2, 0)).unwrap(), "i-2");
        assert_eq!(frame.selections.len(), 2);

        let grid = frame.grid.lock().clone();
        assert!(matches!(grid.get(3, 0), TileValue::RenderedImage(_)));
        assert!(matches!(grid.get(2, 0), TileValue::RenderedImage(_)));
        assert!(matches!(grid.get(1, 0), TileValue::Empty));
        // Corner echoes the source tile
        assert!(matches!(grid.get(4, 0), TileValue::RenderedImage(b) if b[0] == 9));
    }

    #[test]
    fn test_setup_without_snapshot_only_sets_corner() {
        let dir = TempDir::new().expect("tempdir");
        let (ctx, _deck) = test_context(dir.path(), Arc::new(FakeApi::new()));

        let mut frame = menu(Arc::new(Mutex::new(None)));
        frame.setup(&ctx).unwrap();
        assert!(frame.selections.is_empty());
        assert!(matches!(frame.grid.lock().get(4, 0), TileValue::RenderedImage(_)));
    }

    #[test]
    fn test_back_column_pops() {
        let dir = TempDir::new().expect("tempdir");
        let (ctx, _deck) = test_context(dir.path(), Arc::new(FakeApi::new()));

        let mut frame = menu(snapshot_with(&[(1000, 111, "i-1")]));
        frame.setup(&ctx).unwrap();
        assert!(matches!(frame.press(&ctx, 4, 2).unwrap(), FrameAction::Pop));
    }

    #[test]
    fn test_pressing_an_item_equips_it() {
        let dir = TempDir::new().expect("tempdir");
        let api = Arc::new(FakeApi::new());
        api.respond(EQUIP_ROUTE, serde_json::json!({"equipStatus": 1}));
        let (ctx, _deck) = test_context(dir.path(), api.clone());

        let mut frame = menu(snapshot_with(&[(1000, 111, "i-1")]));
        frame.setup(&ctx).unwrap();

        let action = frame.press(&ctx, 3, 0).unwrap();
        assert!(matches!(action, FrameAction::None));

        let posts = api.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, EQUIP_ROUTE);
        assert_eq!(posts[0].1.get("itemId").unwrap(), "i-1");
        assert_eq!(posts[0].1.get("characterId").unwrap(), "char-a");
        assert_eq!(posts[0].1.get("membershipType").unwrap(), 2);

        // Only the Post went through the gateway
        assert!(api
            .calls()
            .iter()
            .all(|(route, method)| route != EQUIP_ROUTE || *method == HttpMethod::Post));
    }

    #[test]
    fn test_pressing_an_empty_position_does_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let api = Arc::new(FakeApi::new());
        let (ctx, _deck) = test_context(dir.path(), api.clone());

        let mut frame = menu(snapshot_with(&[(1000, 111, "i-1")]));
        frame.setup(&ctx).unwrap();

        assert!(matches!(frame.press(&ctx, 1, 2).unwrap(), FrameAction::None));
        assert!(api.posts().is_empty());
    }
}
