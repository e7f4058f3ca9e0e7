//! Bounded tile request scheduling.

use std::collections::VecDeque;

use relight_tiles::{NeededRange, Pyramid, TileBox, TileId};
use rustc_hash::FxHashSet;

use crate::error::FetchError;

/// A tile waiting for a request window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedTile {
    /// Tile id.
    pub tile: TileId,
    /// Flat index in the pyramid.
    pub index: usize,
}

/// Decides which tiles to request and in what order, and keeps at most
/// `max_requested` tiles in flight.
#[derive(Debug)]
pub struct FetchScheduler {
    max_requested: usize,
    requested: FxHashSet<usize>,
    queued: VecDeque<QueuedTile>,
    last_range: Option<(u32, TileBox)>,
}

impl FetchScheduler {
    /// Scheduler allowing `max_requested` tiles in flight (at least one).
    #[must_use]
    pub fn new(max_requested: usize) -> Self {
        Self {
            max_requested: max_requested.max(1),
            requested: FxHashSet::default(),
            queued: VecDeque::new(),
            last_range: None,
        }
    }

    /// Request window size.
    #[must_use]
    pub fn max_requested(&self) -> usize {
        self.max_requested
    }

    /// Tiles currently in flight.
    #[must_use]
    pub fn requested_count(&self) -> usize {
        self.requested.len()
    }

    /// Whether tile `index` is in flight.
    #[must_use]
    pub fn is_requested(&self, index: usize) -> bool {
        self.requested.contains(&index)
    }

    /// Tiles waiting, in request order.
    pub fn queued(&self) -> impl Iterator<Item = &QueuedTile> + '_ {
        self.queued.iter()
    }

    /// Whether another tile may be requested now.
    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.requested.len() < self.max_requested
    }

    /// Rebuild the queue for `needed`.
    ///
    /// Levels are visited from the coarsest down to `needed.min_level`; each
    /// level's tiles are ordered by Manhattan distance to the center of its
    /// box. Tiles for which `settled` holds (loaded or failed) and tiles in
    /// flight are skipped. Returns `false` without touching the queue when
    /// the finest level and its box match the previous call.
    pub fn prefetch(
        &mut self,
        pyramid: &Pyramid,
        needed: &NeededRange,
        settled: impl Fn(usize) -> bool,
    ) -> bool {
        let key = (needed.min_level, needed.finest());
        if self.last_range == Some(key) {
            return false;
        }
        self.last_range = Some(key);
        self.queued.clear();

        for level in (needed.min_level..pyramid.level_count()).rev() {
            let Some(&area) = needed.boxes.get(level as usize) else {
                continue;
            };
            let center = area.center();
            let mut tiles: Vec<(f64, QueuedTile)> = area
                .iter()
                .filter_map(|(x, y)| {
                    let tile = TileId::new(level, x, y);
                    let index = pyramid.tile_index(tile)?;
                    if settled(index) || self.requested.contains(&index) {
                        return None;
                    }
                    let distance =
                        (f64::from(x) - center.x).abs() + (f64::from(y) - center.y).abs();
                    Some((distance, QueuedTile { tile, index }))
                })
                .collect();
            tiles.sort_by(|a, b| a.0.total_cmp(&b.0));
            self.queued.extend(tiles.into_iter().map(|(_, queued)| queued));
        }
        true
    }

    /// Pop the next tile if the request window has room.
    pub fn next(&mut self) -> Option<QueuedTile> {
        if self.has_capacity() {
            self.queued.pop_front()
        } else {
            None
        }
    }

    /// Mark tile `index` as in flight.
    pub fn begin_request(&mut self, index: usize) -> Result<(), FetchError> {
        if self.requested.insert(index) {
            Ok(())
        } else {
            Err(FetchError::DuplicateRequest { index })
        }
    }

    /// Tile `index` finished (loaded or failed). Returns whether it was in
    /// flight.
    pub fn finish(&mut self, index: usize) -> bool {
        self.requested.remove(&index)
    }

    /// Forget requests, the queue and the previous range.
    pub fn flush(&mut self) {
        self.requested.clear();
        self.queued.clear();
        self.last_range = None;
    }
}
