//! Tile streaming: store, scheduler and buffer arena driven together.

use relight_tiles::{NeededRange, Pyramid, TileId};
use tracing::{debug, error, warn};

use crate::arena::SlotArena;
use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::request::{FetchCompletion, FetchRequest, RequestTag};
use crate::scheduler::{FetchScheduler, QueuedTile};
use crate::store::{Installed, TileStore};

/// What happened to a plane completion.
#[derive(Debug)]
pub enum PlaneOutcome<T> {
    /// Not a tile plane, or issued before the last flush; ignored.
    Stale,
    /// Plane stored, other planes of the tile are outstanding.
    Pending {
        /// Flat tile index.
        index: usize,
    },
    /// Last plane stored; the tile is drawable.
    Ready {
        /// Flat tile index.
        index: usize,
    },
    /// The tile failed. Textures it already held are handed back.
    Failed {
        /// Flat tile index.
        index: usize,
        /// Textures to release.
        released: Vec<T>,
    },
    /// The plane arrived for a tile that can no longer take it.
    Discarded {
        /// Flat tile index.
        index: usize,
        /// Texture to release.
        texture: T,
    },
}

/// Streams the tiles of one pyramid.
///
/// `T` is the texture handle type of the GPU surface.
#[derive(Debug)]
pub struct TileStreamer<T> {
    store: TileStore<T>,
    scheduler: FetchScheduler,
    arena: SlotArena,
    first_generation: u64,
    generation: u64,
}

impl<T> TileStreamer<T> {
    /// Streamer for `tile_count` tiles of `planes` images each, with at most
    /// `max_requested` tiles in flight.
    #[must_use]
    pub fn new(tile_count: usize, planes: usize, max_requested: usize) -> Self {
        let scheduler = FetchScheduler::new(max_requested);
        let planes = planes.max(1);
        Self {
            store: TileStore::new(tile_count, planes),
            arena: SlotArena::new(scheduler.max_requested() * planes),
            scheduler,
            first_generation: 0,
            generation: 0,
        }
    }

    /// Start counting generations at `generation`, so completions stamped
    /// by an earlier streamer over the same fetcher are stale here.
    #[must_use]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.first_generation = generation;
        self.generation = generation;
        self
    }

    /// Generation stamped into new requests; bumped by every flush.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Tile nodes.
    #[must_use]
    pub fn store(&self) -> &TileStore<T> {
        &self.store
    }

    /// Request scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &FetchScheduler {
        &self.scheduler
    }

    /// Fetch buffers.
    #[must_use]
    pub fn arena(&self) -> &SlotArena {
        &self.arena
    }

    /// Rebuild the queue for `needed` and issue what the window allows.
    /// Returns the number of tiles requested.
    pub fn prefetch(
        &mut self,
        pyramid: &Pyramid,
        needed: &NeededRange,
        fetcher: &mut dyn Fetcher,
        url: impl Fn(TileId, usize) -> String,
    ) -> usize {
        let store = &self.store;
        if self
            .scheduler
            .prefetch(pyramid, needed, |index| store.is_known(index))
        {
            self.drain_queue(fetcher, url)
        } else {
            0
        }
    }

    /// Issue queued tiles while the request window and the arena allow.
    /// Returns the number of tiles requested.
    pub fn drain_queue(
        &mut self,
        fetcher: &mut dyn Fetcher,
        url: impl Fn(TileId, usize) -> String,
    ) -> usize {
        let planes = self.store.planes();
        let mut issued = 0;
        while self.arena.free_count() >= planes {
            let Some(next) = self.scheduler.next() else {
                break;
            };
            match self.request(next, fetcher, &url) {
                Ok(()) => issued += 1,
                Err(e @ FetchError::DuplicateRequest { .. }) => {
                    error!(error = %e, "tile request skipped");
                }
                Err(e) => {
                    warn!(error = %e, tile = ?next.tile, "tile request failed");
                    break;
                }
            }
        }
        issued
    }

    fn request(
        &mut self,
        queued: QueuedTile,
        fetcher: &mut dyn Fetcher,
        url: &impl Fn(TileId, usize) -> String,
    ) -> Result<(), FetchError> {
        self.scheduler.begin_request(queued.index)?;
        self.store.begin(queued.index);
        for plane in 0..self.store.planes() {
            let slot = match self.arena.acquire() {
                Ok(slot) => slot,
                Err(e) => {
                    self.store.mark_failed(queued.index);
                    self.scheduler.finish(queued.index);
                    return Err(e);
                }
            };
            let tag = RequestTag::TilePlane {
                index: queued.index,
                plane,
                slot: slot.index,
                generation: self.generation,
            };
            fetcher.submit(FetchRequest {
                tag,
                url: url(queued.tile, plane),
                buffer: slot.buffer,
            });
        }
        debug!(index = queued.index, tile = ?queued.tile, "tile requested");
        Ok(())
    }

    /// Apply a plane completion. `upload` turns the fetched bytes into a
    /// texture; an error from it fails the tile like a fetch error.
    ///
    /// The completion's buffer goes back to the arena, unless it was issued
    /// by an earlier streamer and so belongs to another arena.
    pub fn on_plane_loaded(
        &mut self,
        completion: FetchCompletion,
        upload: impl FnOnce(&[u8]) -> Result<T, FetchError>,
    ) -> PlaneOutcome<T> {
        let RequestTag::TilePlane {
            index,
            plane,
            slot,
            generation,
        } = completion.tag
        else {
            return PlaneOutcome::Stale;
        };
        let FetchCompletion {
            url,
            buffer,
            result,
            ..
        } = completion;

        let uploaded = if generation != self.generation {
            None
        } else {
            Some(result.and_then(|()| upload(&buffer)))
        };
        if generation >= self.first_generation {
            self.arena.release(slot, buffer);
        }

        match uploaded {
            None => PlaneOutcome::Stale,
            Some(Ok(texture)) => match self.store.install(index, plane, texture) {
                Installed::Ready => {
                    self.scheduler.finish(index);
                    PlaneOutcome::Ready { index }
                }
                Installed::Pending => PlaneOutcome::Pending { index },
                Installed::Discarded(texture) => PlaneOutcome::Discarded { index, texture },
            },
            Some(Err(e)) => {
                warn!(error = %e, %url, index, "tile failed");
                self.on_plane_failed(index)
            }
        }
    }

    fn on_plane_failed(&mut self, index: usize) -> PlaneOutcome<T> {
        let released = self.store.mark_failed(index);
        self.scheduler.finish(index);
        PlaneOutcome::Failed { index, released }
    }

    /// Drop every tile and request. Completions already in flight are
    /// recognized as stale when they arrive. Returns the textures to release.
    pub fn flush(&mut self) -> Vec<T> {
        self.generation += 1;
        self.scheduler.flush();
        self.store.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::ExternalFetcher;
    use relight_tiles::{Position, Viewport, level_count_for};

    fn pyramid() -> Pyramid {
        Pyramid::new(1000, 600, 256, 0, level_count_for(1000, 600, 256)).unwrap()
    }

    fn needed(p: &Pyramid) -> NeededRange {
        p.needed_range(&Position::default(), Viewport::new(1000, 600), 0, 0.0)
    }

    fn url(tile: TileId, plane: usize) -> String {
        format!("{}/{}_{}/{plane}", tile.level, tile.x, tile.y)
    }

    fn ok_upload(bytes: &[u8]) -> Result<u32, FetchError> {
        Ok(bytes.len() as u32)
    }

    #[test]
    fn test_prefetch_respects_window() {
        let p = pyramid();
        let mut streamer = TileStreamer::<u32>::new(p.tile_count(), 2, 3);
        let mut fetcher = ExternalFetcher::new();

        assert_eq!(streamer.prefetch(&p, &needed(&p), &mut fetcher, url), 3);
        assert_eq!(fetcher.take_requests().len(), 6);
        assert_eq!(streamer.scheduler().requested_count(), 3);
        assert_eq!(streamer.arena().free_count(), 0);

        // Same view: nothing new.
        assert_eq!(streamer.prefetch(&p, &needed(&p), &mut fetcher, url), 0);
    }

    #[test]
    fn test_tile_ready_after_all_planes_then_queue_drains() {
        let p = pyramid();
        let mut streamer = TileStreamer::<u32>::new(p.tile_count(), 2, 1);
        let mut fetcher = ExternalFetcher::new();
        streamer.prefetch(&p, &needed(&p), &mut fetcher, url);

        let requests = fetcher.take_requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.url.starts_with("2/0_0/")));

        let mut outcomes = Vec::new();
        for request in requests {
            let completion = FetchCompletion::success(request, b"abc");
            outcomes.push(streamer.on_plane_loaded(completion, ok_upload));
        }
        assert!(matches!(outcomes[0], PlaneOutcome::Pending { index: 0 }));
        assert!(matches!(outcomes[1], PlaneOutcome::Ready { index: 0 }));
        assert!(streamer.store().is_complete(0));
        assert_eq!(streamer.arena().free_count(), 2);

        assert_eq!(streamer.drain_queue(&mut fetcher, url), 1);
        assert!(fetcher.take_requests().iter().all(|r| r.url.starts_with("1/")));
    }

    #[test]
    fn test_failure_is_local_and_not_retried() {
        let p = pyramid();
        let mut streamer = TileStreamer::<u32>::new(p.tile_count(), 1, 2);
        let mut fetcher = ExternalFetcher::new();
        streamer.prefetch(&p, &needed(&p), &mut fetcher, url);

        let mut requests = fetcher.take_requests().into_iter();
        let first = requests.next().unwrap();
        let second = requests.next().unwrap();
        let failure = FetchCompletion::failure(
            first,
            FetchError::Status {
                url: "x".into(),
                status: 404,
            },
        );
        assert!(matches!(
            streamer.on_plane_loaded(failure, ok_upload),
            PlaneOutcome::Failed { index: 0, .. }
        ));
        assert!(streamer.store().is_failed(0));

        let ok = FetchCompletion::success(second, b"z");
        assert!(matches!(
            streamer.on_plane_loaded(ok, ok_upload),
            PlaneOutcome::Ready { index: 1 }
        ));

        // A new view must not queue the failed tile again.
        let zoomed_out = Position::new(0.0, 0.0, 1.0, 0.0);
        let moved = p.needed_range(&zoomed_out, Viewport::new(1000, 600), 0, 0.0);
        streamer.prefetch(&p, &moved, &mut fetcher, url);
        assert!(streamer.scheduler().queued().all(|q| q.index != 0));
        assert!(!streamer.scheduler().is_requested(0));
    }

    #[test]
    fn test_decode_error_fails_tile() {
        let p = pyramid();
        let mut streamer = TileStreamer::<u32>::new(p.tile_count(), 1, 1);
        let mut fetcher = ExternalFetcher::new();
        streamer.prefetch(&p, &needed(&p), &mut fetcher, url);

        let request = fetcher.take_requests().pop().unwrap();
        let outcome = streamer.on_plane_loaded(FetchCompletion::success(request, b"junk"), |bytes| {
            crate::decode::decode_plane(bytes, "junk").map(|_| 0)
        });
        assert!(matches!(outcome, PlaneOutcome::Failed { index: 0, .. }));
        assert_eq!(streamer.scheduler().requested_count(), 0);
    }

    #[test]
    fn test_flush_makes_in_flight_completions_stale() {
        let p = pyramid();
        let mut streamer = TileStreamer::<u32>::new(p.tile_count(), 1, 1);
        let mut fetcher = ExternalFetcher::new();
        streamer.prefetch(&p, &needed(&p), &mut fetcher, url);
        let request = fetcher.take_requests().pop().unwrap();

        assert!(streamer.flush().is_empty());
        assert_eq!(streamer.scheduler().requested_count(), 0);
        assert_eq!(streamer.arena().free_count(), 0);

        let outcome = streamer.on_plane_loaded(FetchCompletion::success(request, b"late"), ok_upload);
        assert!(matches!(outcome, PlaneOutcome::Stale));
        assert!(!streamer.store().is_known(0));
        assert_eq!(streamer.arena().free_count(), 1);
    }

    #[test]
    fn test_completions_of_an_older_streamer_are_stale() {
        let p = pyramid();
        let mut fetcher = ExternalFetcher::new();
        let mut old = TileStreamer::<u32>::new(p.tile_count(), 1, 1);
        old.prefetch(&p, &needed(&p), &mut fetcher, url);
        let late = fetcher.take_requests().pop().unwrap();
        old.flush();

        let mut current =
            TileStreamer::<u32>::new(p.tile_count(), 1, 1).with_generation(old.generation() + 1);
        current.prefetch(&p, &needed(&p), &mut fetcher, url);
        assert_eq!(current.arena().free_count(), 0);

        let outcome = current.on_plane_loaded(FetchCompletion::success(late, b"old"), ok_upload);
        assert!(matches!(outcome, PlaneOutcome::Stale));
        assert!(!current.store().is_complete(0));
        assert_eq!(current.scheduler().requested_count(), 1);
        // The slot number belongs to the old arena.
        assert_eq!(current.arena().free_count(), 0);
    }

    #[test]
    fn test_late_plane_of_failed_tile_is_discarded() {
        let p = pyramid();
        let mut streamer = TileStreamer::<u32>::new(p.tile_count(), 2, 1);
        let mut fetcher = ExternalFetcher::new();
        streamer.prefetch(&p, &needed(&p), &mut fetcher, url);
        let mut requests = fetcher.take_requests().into_iter();
        let a = requests.next().unwrap();
        let b = requests.next().unwrap();

        streamer.on_plane_loaded(
            FetchCompletion::failure(
                a,
                FetchError::Transport {
                    url: "u".into(),
                    reason: "reset".into(),
                },
            ),
            ok_upload,
        );
        // Window is free again but the other plane still holds a buffer.
        assert_eq!(streamer.drain_queue(&mut fetcher, url), 0);

        let outcome = streamer.on_plane_loaded(FetchCompletion::success(b, b"xy"), ok_upload);
        assert!(matches!(outcome, PlaneOutcome::Discarded { index: 0, texture: 2 }));
        assert_eq!(streamer.drain_queue(&mut fetcher, url), 1);
    }
}
