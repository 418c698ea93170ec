//! Character splash screen
//!
//! The right column tracks the character's three equipment buckets, kept
//! fresh by a background poller that owns this frame's grid writes.
//! Pressing a bucket tile opens its menu.

use anyhow::{anyhow, Context};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

use crate::app::DeckContext;
use crate::model::{Bucket, CharacterSummary};
use crate::poll::{InventoryWatcher, PollingHandle};

use super::{new_shared_grid, Frame, FrameAction, FrameSpec, SharedGrid, SharedSnapshot};

/// Definition table mapping equipment buckets to display slots
const BUCKET_TABLE: &str = "InventoryBucketDefinition";

/// Column holding the tracked bucket tiles
const BUCKET_COLUMN: usize = 4;

pub struct CharacterSplashFrame {
    grid: SharedGrid,
    character: CharacterSummary,
    snapshot: SharedSnapshot,
    buckets: Vec<Bucket>,
    poller: Option<PollingHandle>,
}

impl CharacterSplashFrame {
    pub fn new(character: CharacterSummary) -> Self {
        Self {
            grid: new_shared_grid(),
            character,
            snapshot: Arc::new(Mutex::new(None)),
            buckets: Vec::new(),
            poller: None,
        }
    }
}

impl Frame for CharacterSplashFrame {
    fn kind(&self) -> &'static str {
        "character-splash"
    }

    fn grid(&self) -> &SharedGrid {
        &self.grid
    }

    fn setup(&mut self, ctx: &DeckContext) -> anyhow::Result<()> {
        self.buckets = tracked_buckets(ctx).context("bucket index unavailable")?;
        log::info!(
            "Tracking {} buckets for character {}",
            self.buckets.len(),
            self.character.character_id
        );

        let (membership_id, membership_type) = ctx
            .session
            .membership()
            .ok_or_else(|| anyhow!("no game membership in session"))?;
        let route = format!(
            "/platform/profile/{}/{}/character/{}/?components=201,205,300",
            membership_type, membership_id, self.character.character_id
        );

        let mut watcher = InventoryWatcher::new(
            ctx.clone(),
            route,
            self.buckets.clone(),
            self.grid.clone(),
            self.snapshot.clone(),
        );
        self.poller = Some(PollingHandle::spawn(
            "inventory-poll",
            ctx.poll_interval,
            move || watcher.cycle(),
        )?);
        Ok(())
    }

    fn press(&mut self, _ctx: &DeckContext, x: usize, y: usize) -> anyhow::Result<FrameAction> {
        if x != BUCKET_COLUMN {
            return Ok(FrameAction::None);
        }
        let Some(bucket) = self.buckets.iter().find(|b| b.slot_index == y) else {
            return Ok(FrameAction::None);
        };

        let source_tile = self.grid.lock().get(BUCKET_COLUMN, y).clone();
        Ok(FrameAction::Push(FrameSpec::BucketMenu {
            bucket_hash: bucket.hash,
            bucket_index: bucket.slot_index,
            source_tile,
            character_id: self.character.character_id.clone(),
            snapshot: self.snapshot.clone(),
        }))
    }

    /// Joins the poller; after this returns nothing touches the grid
    fn destroy(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            poller.stop();
        }
    }
}

/// Derive the three tracked display slots from a full scan of the bucket
/// definition table. Done once per character session.
fn tracked_buckets(ctx: &DeckContext) -> anyhow::Result<Vec<Bucket>> {
    let mut buckets = Vec::new();
    for record in ctx.manifest.scan_all(BUCKET_TABLE)? {
        let index = record.json.get("index").and_then(Value::as_i64);
        let hash = record.json.get("hash").and_then(Value::as_u64);
        if let (Some(index), Some(hash)) = (index, hash) {
            if (0..=2).contains(&index) {
                buckets.push(Bucket {
                    hash: hash as u32,
                    slot_index: index as usize,
                });
            }
        }
    }
    buckets.sort_by_key(|b| b.slot_index);
    Ok(buckets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::testutil::{character, character_view_route, inventory_view, test_context, FakeApi};
    use crate::frames::TileValue;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_tracked_buckets_come_from_the_scan() {
        let dir = TempDir::new().expect("tempdir");
        let (ctx, _deck) = test_context(dir.path(), Arc::new(FakeApi::new()));

        let buckets = tracked_buckets(&ctx).unwrap();
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0], Bucket { hash: 1000, slot_index: 0 });
        assert_eq!(buckets[1], Bucket { hash: 2000, slot_index: 1 });
        // The seeded index-7 bucket is outside the tracked slots
        assert_eq!(buckets[2], Bucket { hash: 3000, slot_index: 2 });
    }

    #[test]
    fn test_poller_fills_bucket_tiles() {
        let dir = TempDir::new().expect("tempdir");
        let api = Arc::new(FakeApi::new());
        api.respond(
            &character_view_route("char-a"),
            inventory_view(&[(1000, 111, "i-1")], &[]),
        );
        let (ctx, _deck) = test_context(dir.path(), api);

        let mut frame = CharacterSplashFrame::new(character("char-a"));
        frame.setup(&ctx).unwrap();

        // First cycle runs immediately; give it a moment
        thread::sleep(Duration::from_millis(150));
        assert!(frame.snapshot.lock().is_some());
        assert!(matches!(
            frame.grid.lock().get(BUCKET_COLUMN, 0),
            TileValue::RenderedImage(_)
        ));

        frame.destroy();
    }

    #[test]
    fn test_destroy_joins_the_poller() {
        let dir = TempDir::new().expect("tempdir");
        let api = Arc::new(FakeApi::new());
        api.respond(
            &character_view_route("char-a"),
            inventory_view(&[(1000, 111, "i-1")], &[]),
        );
        let (ctx, _deck) = test_context(dir.path(), api.clone());

        let mut frame = CharacterSplashFrame::new(character("char-a"));
        frame.setup(&ctx).unwrap();
        thread::sleep(Duration::from_millis(60));

        frame.destroy();
        let calls_after_destroy = api.calls().len();

        // The loop has exited; no further fetch happens
        thread::sleep(Duration::from_millis(100));
        assert_eq!(api.calls().len(), calls_after_destroy);
        assert!(frame.poller.is_none());
    }

    #[test]
    fn test_press_on_bucket_opens_its_menu() {
        let dir = TempDir::new().expect("tempdir");
        let api = Arc::new(FakeApi::new());
        api.respond(
            &character_view_route("char-a"),
            inventory_view(&[(2000, 333, "i-3")], &[]),
        );
        let (ctx, _deck) = test_context(dir.path(), api);

        let mut frame = CharacterSplashFrame::new(character("char-a"));
        frame.setup(&ctx).unwrap();

        let action = frame.press(&ctx, BUCKET_COLUMN, 1).unwrap();
        match action {
            FrameAction::Push(FrameSpec::BucketMenu {
                bucket_hash,
                bucket_index,
                character_id,
                ..
            }) => {
                assert_eq!(bucket_hash, 2000);
                assert_eq!(bucket_index, 1);
                assert_eq!(character_id, "char-a");
            }
            other => panic!("expected bucket menu push, got {:?}", other),
        }

        // Presses off the bucket column are ignored
        assert!(matches!(frame.press(&ctx, 0, 0).unwrap(), FrameAction::None));

        frame.destroy();
    }
}
