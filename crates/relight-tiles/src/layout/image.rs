//! A single untiled image per component.

use super::{ImageGeometry, LayoutKind, LayoutSource, TileLayout, join};
use crate::error::TileError;
use crate::pyramid::{Pyramid, TileId};

/// Whole-image layout: one quad, no levels.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageLayout;

impl TileLayout for ImageLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Image
    }

    fn pyramid(&self, geometry: &ImageGeometry) -> Result<Pyramid, TileError> {
        Ok(Pyramid::flat(geometry.width, geometry.height))
    }

    fn tile_url(
        &self,
        source: &LayoutSource,
        _geometry: &ImageGeometry,
        _pyramid: &Pyramid,
        name: &str,
        _tile: TileId,
    ) -> String {
        join(&source.url, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_url() {
        let geometry = ImageGeometry::new(0, 0, ".jpg");
        let pyramid = ImageLayout.pyramid(&geometry).unwrap();
        assert!(pyramid.is_flat());
        let tile = TileId::new(0, 0, 0);

        let source = LayoutSource::new("https://example.org/coin");
        let url = ImageLayout.tile_url(&source, &geometry, &pyramid, "plane_1.jpg", tile);
        assert_eq!(url, "https://example.org/coin/plane_1.jpg");

        let bare = LayoutSource::new("");
        let url = ImageLayout.tile_url(&bare, &geometry, &pyramid, "photo.png", tile);
        assert_eq!(url, "photo.png");
    }

    #[test]
    fn test_image_has_no_metadata() {
        let geometry = ImageGeometry::new(10, 10, ".jpg");
        assert_eq!(ImageLayout.metadata_url(&LayoutSource::new("u"), &geometry), None);
    }
}
