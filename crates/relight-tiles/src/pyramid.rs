//! Resolution levels, tile ids and the per-level needed tile ranges.

use glam::DVec2;

use crate::error::TileError;
use crate::geometry::{Position, Viewport, image_box};

/// One tile of the pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    /// Resolution level, 0 = full resolution.
    pub level: u32,
    /// Column within the level.
    pub x: u32,
    /// Row within the level.
    pub y: u32,
}

impl TileId {
    /// Create a tile id.
    #[must_use]
    pub const fn new(level: u32, x: u32, y: u32) -> Self {
        Self { level, x, y }
    }

    /// Ancestor `up` levels coarser.
    #[must_use]
    pub fn ancestor(self, up: u32) -> Self {
        Self {
            level: self.level + up,
            x: self.x.checked_shr(up).unwrap_or(0),
            y: self.y.checked_shr(up).unwrap_or(0),
        }
    }

    /// The four tiles sharing this tile's parent, in the same level.
    #[must_use]
    pub fn siblings(self) -> [Self; 4] {
        let sx = self.x & !1;
        let sy = self.y & !1;
        [
            Self::new(self.level, sx, sy),
            Self::new(self.level, sx + 1, sy),
            Self::new(self.level, sx + 1, sy + 1),
            Self::new(self.level, sx, sy + 1),
        ]
    }
}

/// Half-open rectangle of tile coordinates `[x0, x1) × [y0, y1)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileBox {
    /// First column.
    pub x0: u32,
    /// First row.
    pub y0: u32,
    /// One past the last column.
    pub x1: u32,
    /// One past the last row.
    pub y1: u32,
}

impl TileBox {
    /// Create a box.
    #[must_use]
    pub const fn new(x0: u32, y0: u32, x1: u32, y1: u32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Whether the box contains no tile.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    /// `(x, y)` pairs in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        (self.y0..self.y1).flat_map(move |y| (self.x0..self.x1).map(move |x| (x, y)))
    }

    /// Center used to order fetches, `((x0+x1-1)/2, (y0+y1-1)/2)`.
    #[must_use]
    pub fn center(&self) -> DVec2 {
        DVec2::new(
            (f64::from(self.x0) + f64::from(self.x1) - 1.0) / 2.0,
            (f64::from(self.y0) + f64::from(self.y1) - 1.0) / 2.0,
        )
    }
}

/// Tile grid of one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelGrid {
    /// Tile columns.
    pub cols: u32,
    /// Tile rows.
    pub rows: u32,
}

impl LevelGrid {
    fn count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }
}

/// Tiles needed for a camera state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeededRange {
    /// Finest level to display.
    pub min_level: u32,
    /// Needed box per level; levels finer than `min_level` hold empty boxes.
    pub boxes: Vec<TileBox>,
}

impl NeededRange {
    /// Box of the finest displayed level.
    #[must_use]
    pub fn finest(&self) -> TileBox {
        self.boxes
            .get(self.min_level as usize)
            .copied()
            .unwrap_or_default()
    }
}

/// Number of levels of a power-of-two pyramid whose coarsest level fits in
/// one tile: `ceil(log2(max(w, h) / tile_size)) + 1`, at least 1.
#[must_use]
pub fn level_count_for(width: u32, height: u32, tile_size: u32) -> u32 {
    if tile_size == 0 {
        return 1;
    }
    let ratio = f64::from(width.max(height)) / f64::from(tile_size);
    if ratio <= 1.0 {
        return 1;
    }
    ratio.log2().ceil() as u32 + 1
}

/// Multi-resolution tile grid of one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Pyramid {
    width: u32,
    height: u32,
    tile_size: u32,
    overlap: u32,
    flat: bool,
    levels: Vec<LevelGrid>,
    offsets: Vec<usize>,
    total: usize,
}

impl Pyramid {
    /// Build the grid of a tiled pyramid.
    ///
    /// Level `L` holds `ceil((width >> L) / tile_size)` × `ceil((height >> L) /
    /// tile_size)` tiles, never fewer than one in each direction.
    pub fn new(
        width: u32,
        height: u32,
        tile_size: u32,
        overlap: u32,
        level_count: u32,
    ) -> Result<Self, TileError> {
        if tile_size == 0 {
            return Err(TileError::InvalidGeometry("tile size is zero".to_string()));
        }
        if width == 0 || height == 0 {
            return Err(TileError::InvalidGeometry(format!(
                "image size {width}x{height} is empty"
            )));
        }
        if level_count == 0 {
            return Err(TileError::InvalidGeometry("no resolution levels".to_string()));
        }

        let levels: Vec<LevelGrid> = (0..level_count)
            .map(|level| {
                let w = width.checked_shr(level).unwrap_or(0);
                let h = height.checked_shr(level).unwrap_or(0);
                LevelGrid {
                    cols: w.div_ceil(tile_size).max(1),
                    rows: h.div_ceil(tile_size).max(1),
                }
            })
            .collect();

        // Coarser levels come first in the flat index space.
        let mut offsets = vec![0; levels.len()];
        let mut total = 0;
        for level in (0..levels.len()).rev() {
            offsets[level] = total;
            total += levels[level].count();
        }

        Ok(Self {
            width,
            height,
            tile_size,
            overlap,
            flat: false,
            levels,
            offsets,
            total,
        })
    }

    /// A single untiled image: one level with one tile.
    #[must_use]
    pub fn flat(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tile_size: 0,
            overlap: 0,
            flat: true,
            levels: vec![LevelGrid { cols: 1, rows: 1 }],
            offsets: vec![0],
            total: 1,
        }
    }

    /// Full-resolution width.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Full-resolution height.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Image size as a vector.
    #[must_use]
    pub fn image_extent(&self) -> DVec2 {
        DVec2::new(f64::from(self.width), f64::from(self.height))
    }

    /// Update the size of a flat image once it has been decoded.
    pub fn set_flat_size(&mut self, width: u32, height: u32) {
        if self.flat {
            self.width = width;
            self.height = height;
        }
    }

    /// Tile side in pixels of its own level (0 for a flat image).
    #[must_use]
    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Overlap halo in pixels on interior tile edges.
    #[must_use]
    pub fn overlap(&self) -> u32 {
        self.overlap
    }

    /// Whether this is a single untiled image.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.flat
    }

    /// Number of levels.
    #[must_use]
    pub fn level_count(&self) -> u32 {
        self.levels.len() as u32
    }

    /// Grid of one level.
    #[must_use]
    pub fn grid(&self, level: u32) -> Option<LevelGrid> {
        self.levels.get(level as usize).copied()
    }

    /// Total number of tiles over all levels.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.total
    }

    /// Whether the tile lies inside its level's grid.
    #[must_use]
    pub fn contains(&self, tile: TileId) -> bool {
        self.grid(tile.level)
            .is_some_and(|g| tile.x < g.cols && tile.y < g.rows)
    }

    /// Flat index of a tile: all coarser levels first, then row-major.
    #[must_use]
    pub fn tile_index(&self, tile: TileId) -> Option<usize> {
        if !self.contains(tile) {
            return None;
        }
        let grid = self.levels[tile.level as usize];
        Some(
            self.offsets[tile.level as usize]
                + tile.y as usize * grid.cols as usize
                + tile.x as usize,
        )
    }

    /// Inverse of [`tile_index`](Self::tile_index).
    #[must_use]
    pub fn tile_at(&self, index: usize) -> Option<TileId> {
        if index >= self.total {
            return None;
        }
        let level = (0..self.levels.len())
            .find(|&l| index >= self.offsets[l] && index < self.offsets[l] + self.levels[l].count())?;
        let local = index - self.offsets[level];
        let cols = self.levels[level].cols as usize;
        Some(TileId::new(
            level as u32,
            (local % cols) as u32,
            (local / cols) as u32,
        ))
    }

    /// Tiles needed to cover the viewport at `pos`, grown by `border` tiles.
    ///
    /// The finest level is `floor(z + mipmap_bias)` clamped to the pyramid;
    /// every coarser level gets its own box.
    #[must_use]
    pub fn needed_range(
        &self,
        pos: &Position,
        viewport: Viewport,
        border: u32,
        mipmap_bias: f64,
    ) -> NeededRange {
        if self.flat {
            return NeededRange {
                min_level: 0,
                boxes: vec![TileBox::new(0, 0, 1, 1)],
            };
        }
        let last = self.level_count() - 1;
        let min_level = (pos.z + mipmap_bias).floor().clamp(0.0, f64::from(last)) as u32;
        let bounds = image_box(pos, self.image_extent(), viewport);
        let border = i64::from(border);

        let mut boxes = vec![TileBox::default(); self.levels.len()];
        for level in min_level..=last {
            let grid = self.levels[level as usize];
            let side = f64::from(self.tile_size) * f64::from(level).exp2();
            let quantize = |v: f64| v.floor() as i64;
            let clamp = |v: i64, max: u32| v.clamp(0, i64::from(max)) as u32;
            boxes[level as usize] = TileBox {
                x0: clamp(quantize(bounds.min.x / side) - border, grid.cols),
                y0: clamp(quantize(bounds.min.y / side) - border, grid.rows),
                x1: clamp(quantize((bounds.max.x - 1.0) / side) + 1 + border, grid.cols),
                y1: clamp(quantize((bounds.max.y - 1.0) / side) + 1 + border, grid.rows),
            };
        }
        NeededRange { min_level, boxes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pyramid() -> Pyramid {
        // 1000x600, 256 px tiles: levels 4x3, 2x2, 1x1
        Pyramid::new(1000, 600, 256, 0, level_count_for(1000, 600, 256)).unwrap()
    }

    #[test]
    fn test_level_count() {
        assert_eq!(level_count_for(1000, 600, 256), 3);
        assert_eq!(level_count_for(256, 256, 256), 1);
        assert_eq!(level_count_for(100, 50, 256), 1);
        assert_eq!(level_count_for(257, 10, 256), 2);
        assert_eq!(level_count_for(4096, 4096, 256), 5);
    }

    #[test]
    fn test_level_grids() {
        let p = pyramid();
        assert_eq!(p.grid(0), Some(LevelGrid { cols: 4, rows: 3 }));
        assert_eq!(p.grid(1), Some(LevelGrid { cols: 2, rows: 2 }));
        assert_eq!(p.grid(2), Some(LevelGrid { cols: 1, rows: 1 }));
        assert_eq!(p.grid(3), None);
        assert_eq!(p.tile_count(), 12 + 4 + 1);
    }

    #[test]
    fn test_coarsest_tile_is_index_zero() {
        let p = pyramid();
        assert_eq!(p.tile_index(TileId::new(2, 0, 0)), Some(0));
        assert_eq!(p.tile_index(TileId::new(1, 0, 0)), Some(1));
        assert_eq!(p.tile_index(TileId::new(1, 1, 1)), Some(4));
        assert_eq!(p.tile_index(TileId::new(0, 0, 0)), Some(5));
        assert_eq!(p.tile_index(TileId::new(0, 3, 2)), Some(16));
    }

    #[test]
    fn test_tile_index_is_a_bijection() {
        let p = pyramid();
        let mut seen = vec![false; p.tile_count()];
        for level in 0..p.level_count() {
            let g = p.grid(level).unwrap();
            for y in 0..g.rows {
                for x in 0..g.cols {
                    let tile = TileId::new(level, x, y);
                    let index = p.tile_index(tile).unwrap();
                    assert!(!seen[index], "index {index} assigned twice");
                    seen[index] = true;
                    assert_eq!(p.tile_at(index), Some(tile));
                }
            }
        }
        assert!(seen.iter().all(|s| *s));
        assert_eq!(p.tile_at(p.tile_count()), None);
    }

    #[test]
    fn test_out_of_grid_tiles_have_no_index() {
        let p = pyramid();
        assert_eq!(p.tile_index(TileId::new(0, 4, 0)), None);
        assert_eq!(p.tile_index(TileId::new(3, 0, 0)), None);
    }

    #[test]
    fn test_tiny_image_still_has_a_tile() {
        let p = Pyramid::new(3, 1, 256, 0, 4).unwrap();
        for level in 0..4 {
            assert_eq!(p.grid(level), Some(LevelGrid { cols: 1, rows: 1 }));
        }
    }

    #[test]
    fn test_invalid_geometry() {
        assert!(Pyramid::new(0, 10, 256, 0, 1).is_err());
        assert!(Pyramid::new(10, 10, 0, 0, 1).is_err());
        assert!(Pyramid::new(10, 10, 256, 0, 0).is_err());
    }

    #[test]
    fn test_needed_range_full_view() {
        let p = pyramid();
        // Zoom 0 with a viewport larger than the image: everything at level 0.
        let pos = Position::default();
        let needed = p.needed_range(&pos, Viewport::new(2000, 2000), 0, 0.5);
        assert_eq!(needed.min_level, 0);
        assert_eq!(needed.boxes[0], TileBox::new(0, 0, 4, 3));
        assert_eq!(needed.boxes[1], TileBox::new(0, 0, 2, 2));
        assert_eq!(needed.boxes[2], TileBox::new(0, 0, 1, 1));
    }

    #[test]
    fn test_needed_range_picks_level_from_zoom() {
        let p = pyramid();
        let pos = Position::new(0.0, 0.0, 1.0, 0.0);
        let needed = p.needed_range(&pos, Viewport::new(100, 100), 0, 0.5);
        assert_eq!(needed.min_level, 1);
        assert!(needed.boxes[0].is_empty());

        let far = Position::new(0.0, 0.0, 10.0, 0.0);
        assert_eq!(p.needed_range(&far, Viewport::new(100, 100), 0, 0.5).min_level, 2);

        let near = Position::new(0.0, 0.0, -3.0, 0.0);
        assert_eq!(p.needed_range(&near, Viewport::new(100, 100), 0, 0.5).min_level, 0);
    }

    #[test]
    fn test_needed_range_center_crop_and_border() {
        let p = pyramid();
        // 100x100 viewport at native zoom around the center (500, 300):
        // image pixels 450..550 x 250..350 -> columns 1..3, rows 0..2
        let pos = Position::default();
        let needed = p.needed_range(&pos, Viewport::new(100, 100), 0, 0.5);
        assert_eq!(needed.finest(), TileBox::new(1, 0, 3, 2));

        let grown = p.needed_range(&pos, Viewport::new(100, 100), 1, 0.5);
        assert_eq!(grown.finest(), TileBox::new(0, 0, 4, 3));
    }

    #[test]
    fn test_needed_range_is_clamped_off_image() {
        let p = pyramid();
        let pos = Position::new(100_000.0, 100_000.0, 0.0, 0.0);
        let needed = p.needed_range(&pos, Viewport::new(100, 100), 1, 0.5);
        for b in &needed.boxes {
            assert!(b.is_empty());
            assert!(b.x1 <= 4 && b.y1 <= 3);
        }
    }

    #[test]
    fn test_flat_image_needs_single_tile() {
        let p = Pyramid::flat(640, 480);
        let needed = p.needed_range(&Position::new(0.0, 0.0, 5.0, 10.0), Viewport::new(10, 10), 1, 0.5);
        assert_eq!(needed.min_level, 0);
        assert_eq!(needed.boxes, vec![TileBox::new(0, 0, 1, 1)]);
        assert_eq!(p.tile_index(TileId::new(0, 0, 0)), Some(0));
    }

    #[test]
    fn test_siblings_and_ancestor() {
        let t = TileId::new(0, 5, 2);
        assert_eq!(t.ancestor(1), TileId::new(1, 2, 1));
        assert_eq!(t.ancestor(2), TileId::new(2, 1, 0));
        let s = t.siblings();
        assert!(s.contains(&TileId::new(0, 4, 2)));
        assert!(s.contains(&TileId::new(0, 5, 3)));
        assert!(s.contains(&t));
    }

    #[test]
    fn test_box_iteration_and_center() {
        let b = TileBox::new(1, 2, 3, 4);
        let tiles: Vec<_> = b.iter().collect();
        assert_eq!(tiles, vec![(1, 2), (2, 2), (1, 3), (2, 3)]);
        assert_eq!(b.center(), DVec2::new(1.5, 2.5));
    }
}
