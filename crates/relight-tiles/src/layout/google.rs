//! Google Maps style `{level}/{y}/{x}` tiles.

use super::{ImageGeometry, LayoutKind, LayoutSource, TileLayout, inverse_level, join, prefix};
use crate::pyramid::{Pyramid, TileId};

/// Fixed 256 px tiles without overlap; border tiles are full size.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoogleLayout;

/// Tile side of the Google layout.
pub const GOOGLE_TILE_SIZE: u32 = 256;

impl TileLayout for GoogleLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Google
    }

    fn prepare(&self, geometry: &mut ImageGeometry) {
        geometry.tile_size = GOOGLE_TILE_SIZE;
        geometry.overlap = 0;
        geometry.derive_level_count();
    }

    fn clips_border_tiles(&self) -> bool {
        false
    }

    fn tile_url(
        &self,
        source: &LayoutSource,
        geometry: &ImageGeometry,
        pyramid: &Pyramid,
        name: &str,
        tile: TileId,
    ) -> String {
        let base = join(&source.url, prefix(name));
        format!(
            "{base}/{}/{}/{}{}",
            inverse_level(pyramid, tile),
            tile.y,
            tile.x,
            geometry.suffix
        )
    }
}
