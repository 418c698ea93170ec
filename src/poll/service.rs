//! Polling loop and inventory watcher
//!
//! `PollingHandle` owns the background thread and its cancel flag; the
//! cancel signal is checked at the top of every cycle and between sleep
//! slices, and `stop` joins the thread, so no cycle runs after it
//! returns. `InventoryWatcher` is the cycle body: fetch the character's
//! inventory view, hash it, and on change repaint exactly the bucket
//! slots whose backing item changed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use std::io;

use crate::api::GameApi;
use crate::app::DeckContext;
use crate::frames::stack::render_grid;
use crate::frames::{icons, SharedGrid, SharedSnapshot, TileValue};
use crate::model::{Bucket, InventorySnapshot};

/// Sleep granularity between cancel checks
const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// Handle to a background cycle loop
pub struct PollingHandle {
    cancel: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl PollingHandle {
    /// Run `cycle` immediately and then once per `interval` until
    /// stopped
    pub fn spawn<F>(name: &str, interval: Duration, mut cycle: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let flag = cancel.clone();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while !flag.load(Ordering::Relaxed) {
                    cycle();

                    let mut slept = Duration::ZERO;
                    while slept < interval {
                        if flag.load(Ordering::Relaxed) {
                            return;
                        }
                        let slice = SLEEP_SLICE.min(interval - slept);
                        thread::sleep(slice);
                        slept += slice;
                    }
                }
            })?;
        Ok(Self {
            cancel,
            join: Some(join),
        })
    }

    /// Signal cancellation and block until the loop exits. No state
    /// mutation from the loop happens after this returns.
    pub fn stop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("Polling thread panicked");
            }
        }
    }
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Change-detected inventory refresh for one character
pub struct InventoryWatcher {
    ctx: DeckContext,
    /// Character view route polled each cycle
    route: String,
    buckets: Vec<Bucket>,
    grid: SharedGrid,
    snapshot: SharedSnapshot,
    last_hash: Option<String>,
}

impl InventoryWatcher {
    pub fn new(
        ctx: DeckContext,
        route: String,
        buckets: Vec<Bucket>,
        grid: SharedGrid,
        snapshot: SharedSnapshot,
    ) -> Self {
        Self {
            ctx,
            route,
            buckets,
            grid,
            snapshot,
            last_hash: None,
        }
    }

    /// One poll cycle. Failures are transient: logged, and the loop
    /// moves on to the next interval.
    pub fn cycle(&mut self) {
        if let Err(e) = self.poll_once() {
            log::warn!("Inventory poll failed: {:#}", e);
        }
    }

    fn poll_once(&mut self) -> anyhow::Result<()> {
        let view = self.ctx.api.get(&self.route)?;
        let new = InventorySnapshot::from_view(&view)?;

        if self.last_hash.as_deref() == Some(new.content_hash.as_str()) {
            return Ok(());
        }
        log::debug!("Inventory changed for {}", self.route);

        let previous = self.snapshot.lock().clone();
        let changed = changed_slots(previous.as_ref(), &new, &self.buckets);

        // Compose replacement tiles before taking the grid lock; icon
        // fetches may hit the network
        let mut tiles: Vec<(usize, TileValue)> = Vec::new();
        for bucket in &changed {
            match new.equipped_in(bucket.hash) {
                Some(item) => match icons::item_tile(&self.ctx, &new, item) {
                    Ok(native) => tiles.push((bucket.slot_index, TileValue::RenderedImage(native))),
                    Err(e) => log::warn!("Tile for bucket {} not updated: {:#}", bucket.hash, e),
                },
                None => tiles.push((bucket.slot_index, TileValue::Empty)),
            }
        }

        self.last_hash = Some(new.content_hash.clone());
        *self.snapshot.lock() = Some(new);

        let state = {
            let mut grid = self.grid.lock();
            for (slot, tile) in tiles {
                grid.set(4, slot, tile);
            }
            grid.clone()
        };

        // Only the active frame repaints the device, and only the grid;
        // the stack itself is untouched
        if state.active {
            render_grid(&self.ctx, &state);
        }
        Ok(())
    }
}

/// Buckets whose equipped item or instance state differs between
/// snapshots
fn changed_slots(
    previous: Option<&InventorySnapshot>,
    new: &InventorySnapshot,
    buckets: &[Bucket],
) -> Vec<Bucket> {
    buckets
        .iter()
        .copied()
        .filter(|bucket| {
            let before = previous.and_then(|s| {
                s.equipped_in(bucket.hash)
                    .map(|i| (i.clone(), s.instance(i).cloned()))
            });
            let after = new
                .equipped_in(bucket.hash)
                .map(|i| (i.clone(), new.instance(i).cloned()));
            before != after
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::testutil::{character_view_route, inventory_view, test_context, FakeApi};
    use crate::frames::new_shared_grid;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    fn buckets() -> Vec<Bucket> {
        vec![
            Bucket { hash: 1000, slot_index: 0 },
            Bucket { hash: 2000, slot_index: 1 },
            Bucket { hash: 3000, slot_index: 2 },
        ]
    }

    fn watcher(dir: &std::path::Path, api: Arc<FakeApi>) -> (InventoryWatcher, SharedGrid, Arc<crate::device::VirtualDeck>) {
        let (ctx, deck) = test_context(dir, api);
        let grid = new_shared_grid();
        let snapshot: SharedSnapshot = Arc::new(Mutex::new(None));
        let watcher = InventoryWatcher::new(
            ctx,
            character_view_route("char-a"),
            buckets(),
            grid.clone(),
            snapshot,
        );
        (watcher, grid, deck)
    }

    #[test]
    fn test_polling_handle_cycles_and_stops() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let mut handle = PollingHandle::spawn("test-poll", Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(60));
        handle.stop();
        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop >= 2, "expected several cycles, got {}", after_stop);

        // Joined: no cycle runs after stop returns
        thread::sleep(Duration::from_millis(40));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn test_first_cycle_populates_changed_slots() {
        let dir = TempDir::new().expect("tempdir");
        let api = Arc::new(FakeApi::new());
        api.respond(
            &character_view_route("char-a"),
            inventory_view(&[(1000, 111, "i-1"), (2000, 333, "i-3")], &[]),
        );

        let (mut watcher, grid, _deck) = watcher(dir.path(), api);
        watcher.cycle();

        let state = grid.lock().clone();
        assert!(matches!(state.get(4, 0), TileValue::RenderedImage(_)));
        assert!(matches!(state.get(4, 1), TileValue::RenderedImage(_)));
        // Bucket 3000 has nothing equipped
        assert!(matches!(state.get(4, 2), TileValue::Empty));
        assert!(watcher.snapshot.lock().is_some());
    }

    #[test]
    fn test_unchanged_snapshot_renders_nothing() {
        let dir = TempDir::new().expect("tempdir");
        let api = Arc::new(FakeApi::new());
        api.respond(
            &character_view_route("char-a"),
            inventory_view(&[(1000, 111, "i-1")], &[]),
        );

        let (mut watcher, grid, deck) = watcher(dir.path(), api);
        grid.lock().active = true;

        watcher.cycle();
        let writes_after_first = deck.write_count();
        assert!(writes_after_first > 0);

        // Same content hash: zero renders on the second cycle
        watcher.cycle();
        assert_eq!(deck.write_count(), writes_after_first);
    }

    #[test]
    fn test_change_regenerates_only_affected_slots() {
        let dir = TempDir::new().expect("tempdir");
        let api = Arc::new(FakeApi::new());
        api.respond(
            &character_view_route("char-a"),
            inventory_view(&[(1000, 111, "i-1"), (2000, 333, "i-3")], &[]),
        );

        let (mut watcher, _grid, _deck) = watcher(dir.path(), api.clone());
        watcher.cycle();

        // Swap only the bucket-1000 item
        api.respond(
            &character_view_route("char-a"),
            inventory_view(&[(1000, 222, "i-2"), (2000, 333, "i-3")], &[]),
        );
        watcher.cycle();

        let fetched = api.fetched();
        // The unchanged bucket's icon was fetched exactly once, by the
        // first cycle
        assert_eq!(fetched.iter().filter(|r| *r == "/icons/item-333.png").count(), 1);
        // The swapped-in item was composed on the second cycle
        assert!(fetched.iter().any(|r| r == "/icons/item-222.png"));
    }

    #[test]
    fn test_inactive_grid_gets_tiles_but_no_render() {
        let dir = TempDir::new().expect("tempdir");
        let api = Arc::new(FakeApi::new());
        api.respond(
            &character_view_route("char-a"),
            inventory_view(&[(1000, 111, "i-1")], &[]),
        );

        let (mut watcher, grid, deck) = watcher(dir.path(), api);
        watcher.cycle();

        assert!(matches!(grid.lock().get(4, 0), TileValue::RenderedImage(_)));
        assert_eq!(deck.write_count(), 0);
    }

    #[test]
    fn test_failed_cycle_is_swallowed() {
        let dir = TempDir::new().expect("tempdir");
        // No response registered: every call 404s
        let (mut watcher, grid, _deck) = watcher(dir.path(), Arc::new(FakeApi::new()));
        watcher.cycle();
        assert!(watcher.snapshot.lock().is_none());
        assert!(matches!(grid.lock().get(4, 0), TileValue::Empty));
    }

    #[test]
    fn test_changed_slots_against_empty_previous() {
        let view = inventory_view(&[(1000, 111, "i-1")], &[]);
        let snapshot = InventorySnapshot::from_view(&view).unwrap();
        let changed = changed_slots(None, &snapshot, &buckets());
        // Bucket 1000 gains an item; the empty buckets match their
        // (empty) previous state
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].hash, 1000);
    }
}
