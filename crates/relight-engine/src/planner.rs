//! Choice of the tiles drawn in one frame.

use std::collections::BTreeMap;

use relight_tiles::{NeededRange, Pyramid, TileId};
use rustc_hash::FxHashSet;

/// A tile to draw and its flat index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedTile {
    pub index: usize,
    pub tile: TileId,
}

/// Tiles covering the finest needed box, coarsest first.
///
/// Every position of the finest box is covered by the first ready tile
/// found walking up its ancestors. A tile that is not ready marks itself and
/// its siblings; with `skip_siblings` (translucent drawing) a marked tile is
/// not drawn, so a coarse fallback does not blend over finer tiles.
#[must_use]
pub fn plan_draw(
    pyramid: &Pyramid,
    needed: &NeededRange,
    ready: impl Fn(usize) -> bool,
    skip_siblings: bool,
) -> Vec<PlannedTile> {
    let levels = pyramid.level_count();
    let mut chosen: BTreeMap<usize, TileId> = BTreeMap::new();
    let mut siblings: FxHashSet<usize> = FxHashSet::default();

    for (x, y) in needed.finest().iter() {
        let finest = TileId::new(needed.min_level, x, y);
        for up in 0..levels.saturating_sub(needed.min_level) {
            let tile = finest.ancestor(up);
            let Some(index) = pyramid.tile_index(tile) else {
                continue;
            };
            if ready(index) {
                chosen.insert(index, tile);
                break;
            }
            siblings.extend(
                tile.siblings()
                    .into_iter()
                    .filter_map(|s| pyramid.tile_index(s)),
            );
        }
    }

    chosen
        .into_iter()
        .filter(|(index, _)| !(skip_siblings && siblings.contains(index)))
        .map(|(index, tile)| PlannedTile { index, tile })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use relight_tiles::{Position, Viewport, level_count_for};

    /// 1000x600 with 256 px tiles: 4x3, 2x2, 1x1.
    fn pyramid() -> Pyramid {
        Pyramid::new(1000, 600, 256, 0, level_count_for(1000, 600, 256)).unwrap()
    }

    fn full_view(p: &Pyramid) -> NeededRange {
        p.needed_range(&Position::default(), Viewport::new(1000, 600), 0, 0.0)
    }

    #[test]
    fn test_all_ready_draws_finest() {
        let p = pyramid();
        let needed = full_view(&p);
        assert_eq!(needed.min_level, 0);
        let plan = plan_draw(&p, &needed, |_| true, false);
        assert_eq!(plan.len(), 12);
        assert!(plan.iter().all(|t| t.tile.level == 0));
        assert!(plan.windows(2).all(|w| w[0].index < w[1].index));
    }

    #[test]
    fn test_falls_back_to_coarse_root() {
        let p = pyramid();
        let plan = plan_draw(&p, &full_view(&p), |i| i == 0, false);
        assert_eq!(
            plan,
            vec![PlannedTile {
                index: 0,
                tile: TileId::new(2, 0, 0)
            }]
        );
    }

    #[test]
    fn test_mixed_levels_ordered_coarse_first() {
        let p = pyramid();
        // Root ready, plus finest tile (0, 0).
        let finest = p.tile_index(TileId::new(0, 0, 0)).unwrap();
        let plan = plan_draw(&p, &full_view(&p), |i| i == 0 || i == finest, false);
        assert_eq!(plan.first().map(|t| t.index), Some(0));
        assert_eq!(plan.last().map(|t| t.index), Some(finest));
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn test_translucent_skips_marked_siblings() {
        let p = pyramid();
        // Level 1 tile (0,0) ready, its finest children not: the level 1
        // tile is drawn opaque, skipped when translucent only if marked.
        let mid = p.tile_index(TileId::new(1, 0, 0)).unwrap();
        let mid_sibling = p.tile_index(TileId::new(1, 1, 0)).unwrap();
        let ready = |i: usize| i == 0 || i == mid;
        let opaque = plan_draw(&p, &full_view(&p), ready, false);
        assert!(opaque.iter().any(|t| t.index == mid));
        // (1, 1, 0) is missing and marks (1, 0, 0) as its sibling.
        let translucent = plan_draw(&p, &full_view(&p), ready, true);
        assert!(!translucent.iter().any(|t| t.index == mid));
        assert!(!translucent.iter().any(|t| t.index == mid_sibling));
        assert!(translucent.iter().any(|t| t.index == 0));
    }

    #[test]
    fn test_flat_image() {
        let p = Pyramid::flat(0, 0);
        let needed = p.needed_range(&Position::default(), Viewport::new(10, 10), 1, 0.5);
        assert!(plan_draw(&p, &needed, |_| false, false).is_empty());
        let plan = plan_draw(&p, &needed, |_| true, true);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].tile, TileId::new(0, 0, 0));
    }
}
