//! Clip-space quad of a tile.

use glam::DVec2;

use crate::geometry::{Position, Viewport, rot};
use crate::pyramid::{Pyramid, TileId};

/// Triangle indices of a [`TileQuad`].
pub const QUAD_INDICES: [u16; 6] = [3, 2, 1, 3, 1, 0];

/// Unit-square corners shared by positions and texture coordinates.
const CORNERS: [[f64; 2]; 4] = [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]];

/// Four corners of a tile in clip space with their texture coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileQuad {
    /// Clip-space positions (z is always 0).
    pub positions: [[f32; 3]; 4],
    /// Texture coordinates, `(0, 0)` at the tile's top-left texel.
    pub texcoords: [[f32; 2]; 4],
}

impl TileQuad {
    /// Quad of `tile` as seen from `pos`.
    ///
    /// When `clip_to_image` is set, tiles on the right and bottom edge are
    /// shrunk to the image size (their images are smaller than a full tile).
    /// Overlap halos are trimmed from the texture coordinates on interior
    /// edges only.
    #[must_use]
    pub fn for_tile(
        pyramid: &Pyramid,
        tile: TileId,
        clip_to_image: bool,
        pos: &Position,
        viewport: Viewport,
    ) -> Self {
        let image = pyramid.image_extent();
        let mut texcoords = CORNERS.map(|[u, v]| [u as f32, v as f32]);

        if pyramid.is_flat() {
            let positions = CORNERS.map(|[cx, cy]| {
                let local = DVec2::new(cx * image.x - image.x / 2.0, -cy * image.y + image.y / 2.0);
                to_clip(local, pos, viewport)
            });
            return Self {
                positions,
                texcoords,
            };
        }

        let scale = f64::from(tile.level).exp2();
        let side = f64::from(pyramid.tile_size()) * scale;
        let (x, y) = (f64::from(tile.x), f64::from(tile.y));
        let mut tx = side;
        let mut ty = side;
        if clip_to_image {
            if side * (x + 1.0) > image.x {
                tx = image.x - side * x;
            }
            if side * (y + 1.0) > image.y {
                ty = image.y - side * y;
            }
        }

        let over = f64::from(pyramid.overlap());
        if over > 0.0
            && let Some(grid) = pyramid.grid(tile.level)
        {
            let first_x = tile.x == 0;
            let first_y = tile.y == 0;
            let last_x = tile.x + 1 >= grid.cols;
            let last_y = tile.y + 1 >= grid.rows;
            let halo = |first: bool, last: bool| {
                (if first { 0.0 } else { over }) + (if last { 0.0 } else { over })
            };
            let dtx = (over / (tx / scale + halo(first_x, last_x))) as f32;
            let dty = (over / (ty / scale + halo(first_y, last_y))) as f32;

            let u0 = if first_x { 0.0 } else { dtx };
            let u1 = if last_x { 1.0 } else { 1.0 - dtx };
            let v0 = if first_y { 0.0 } else { dty };
            let v1 = if last_y { 1.0 } else { 1.0 - dty };
            texcoords = [[u0, v0], [u0, v1], [u1, v1], [u1, v0]];
        }

        let positions = CORNERS.map(|[cx, cy]| {
            let local = DVec2::new(
                cx * tx + side * x - image.x / 2.0,
                -cy * ty - side * y + image.y / 2.0,
            );
            to_clip(local, pos, viewport)
        });
        Self {
            positions,
            texcoords,
        }
    }
}

/// Centered image coordinates (y up) to clip space.
///
/// Flipping y mirrors the rotation, so the angle is negated to stay
/// consistent with [`project`](crate::geometry::project).
fn to_clip(local: DVec2, pos: &Position, viewport: Viewport) -> [f32; 3] {
    let r = rot(local, -pos.a);
    let z = pos.scale();
    let sx = 2.0 / f64::from(viewport.width.max(1));
    let sy = 2.0 / f64::from(viewport.height.max(1));
    [
        ((r.x - pos.x) * sx / z) as f32,
        ((r.y + pos.y) * sy / z) as f32,
        0.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pyramid::level_count_for;

    fn assert_close(a: [f32; 3], b: [f32; 2]) {
        assert!(
            (a[0] - b[0]).abs() < 1e-5 && (a[1] - b[1]).abs() < 1e-5,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn test_flat_image_fills_matching_viewport() {
        let p = Pyramid::flat(200, 100);
        let q = TileQuad::for_tile(
            &p,
            TileId::new(0, 0, 0),
            true,
            &Position::default(),
            Viewport::new(200, 100),
        );
        assert_close(q.positions[0], [-1.0, 1.0]);
        assert_close(q.positions[2], [1.0, -1.0]);
        assert_eq!(q.texcoords[2], [1.0, 1.0]);
    }

    #[test]
    fn test_single_tile_quad() {
        let p = Pyramid::new(256, 256, 256, 0, 1).unwrap();
        let q = TileQuad::for_tile(
            &p,
            TileId::new(0, 0, 0),
            true,
            &Position::default(),
            Viewport::new(512, 512),
        );
        assert_close(q.positions[0], [-0.5, 0.5]);
        assert_close(q.positions[1], [-0.5, -0.5]);
        assert_close(q.positions[2], [0.5, -0.5]);
        assert_close(q.positions[3], [0.5, 0.5]);
    }

    #[test]
    fn test_border_tile_is_clipped_unless_google() {
        let p = Pyramid::new(300, 256, 256, 0, level_count_for(300, 256, 256)).unwrap();
        let view = Viewport::new(300, 256);
        let pos = Position::default();
        let clipped = TileQuad::for_tile(&p, TileId::new(0, 1, 0), true, &pos, view);
        // Right edge of the image is at clip x = 1.
        assert_close(clipped.positions[2], [1.0, -1.0]);

        let unclipped = TileQuad::for_tile(&p, TileId::new(0, 1, 0), false, &pos, view);
        let right = (256.0 * 2.0 - 150.0) * 2.0 / 300.0;
        assert!((unclipped.positions[2][0] - right as f32).abs() < 1e-5);
    }

    #[test]
    fn test_overlap_trims_interior_edges_only() {
        // Two columns, one row, 1px overlap.
        let p = Pyramid::new(500, 200, 256, 1, 1).unwrap();
        let view = Viewport::new(500, 200);
        let pos = Position::default();

        let left = TileQuad::for_tile(&p, TileId::new(0, 0, 0), true, &pos, view);
        assert_eq!(left.texcoords[0], [0.0, 0.0]);
        let dtx = 1.0 / (256.0 + 1.0);
        assert!((left.texcoords[2][0] - (1.0 - dtx as f32)).abs() < 1e-6);
        assert_eq!(left.texcoords[2][1], 1.0);

        let right = TileQuad::for_tile(&p, TileId::new(0, 1, 0), true, &pos, view);
        let dtx = 1.0 / (244.0 + 1.0);
        assert!((right.texcoords[0][0] - dtx as f32).abs() < 1e-6);
        assert_eq!(right.texcoords[2][0], 1.0);
    }

    #[test]
    fn test_zoom_and_pan_shift_quad() {
        let p = Pyramid::new(256, 256, 256, 0, 1).unwrap();
        let pos = Position::new(128.0, 0.0, 1.0, 0.0);
        let q = TileQuad::for_tile(&p, TileId::new(0, 0, 0), true, &pos, Viewport::new(256, 256));
        // Left image edge (-128) minus the pan (128), halved by the zoom.
        assert_close(q.positions[0], [-1.0, 0.5]);
    }

    #[test]
    fn test_rotated_quad_matches_projection() {
        use crate::geometry::project;

        let p = Pyramid::new(1000, 600, 256, 0, level_count_for(1000, 600, 256)).unwrap();
        let pos = Position::new(30.0, -20.0, 0.5, 37.0);
        let viewport = Viewport::new(400, 300);
        let q = TileQuad::for_tile(&p, TileId::new(0, 1, 1), true, &pos, viewport);
        // Corner 0 is the tile's top-left image pixel.
        let canvas = project(&pos, p.image_extent(), DVec2::new(256.0, 256.0));
        let expected = [
            (canvas.x * 2.0 / 400.0) as f32,
            (-canvas.y * 2.0 / 300.0) as f32,
        ];
        assert_close(q.positions[0], expected);
    }
}
