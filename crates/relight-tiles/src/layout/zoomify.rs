//! Zoomify pyramids described by `ImageProperties.xml`.

use super::{
    ImageGeometry, LayoutKind, LayoutSource, TileLayout, inverse_level, join, metadata_error,
    numeric_attribute, prefix,
};
use crate::error::TileError;
use crate::pyramid::{Pyramid, TileId};

/// Tiles per Zoomify `TileGroup` directory.
const TILES_PER_GROUP: usize = 256;

/// Zoomify layout: `TileGroup{n}/{level}-{x}-{y}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZoomifyLayout;

impl TileLayout for ZoomifyLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Zoomify
    }

    fn prepare(&self, geometry: &mut ImageGeometry) {
        geometry.overlap = 0;
    }

    fn metadata_url(&self, source: &LayoutSource, _geometry: &ImageGeometry) -> Option<String> {
        Some(join(&source.url, &format!("{}/ImageProperties.xml", source.img)))
    }

    fn parse_metadata(&self, text: &str, geometry: &mut ImageGeometry) -> Result<(), TileError> {
        let kind = self.kind();
        geometry.tile_size = numeric_attribute(kind, text, "TILESIZE")?;
        if geometry.tile_size == 0 {
            return Err(metadata_error(kind, "`TILESIZE` is zero"));
        }
        if geometry.width == 0 {
            geometry.width = numeric_attribute(kind, text, "WIDTH")?;
        }
        if geometry.height == 0 {
            geometry.height = numeric_attribute(kind, text, "HEIGHT")?;
        }
        geometry.derive_level_count();
        Ok(())
    }

    fn tile_url(
        &self,
        source: &LayoutSource,
        geometry: &ImageGeometry,
        pyramid: &Pyramid,
        name: &str,
        tile: TileId,
    ) -> String {
        let group = pyramid.tile_index(tile).unwrap_or(0) / TILES_PER_GROUP;
        let base = join(&source.url, prefix(name));
        format!(
            "{base}/TileGroup{group}/{}-{}-{}{}",
            inverse_level(pyramid, tile),
            tile.x,
            tile.y,
            geometry.suffix
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROPERTIES: &str =
        r#"<IMAGE_PROPERTIES WIDTH="5000" HEIGHT="3000" NUMTILES="341" NUMIMAGES="1" VERSION="1.8" TILESIZE="256" />"#;

    #[test]
    fn test_zoomify_metadata() {
        let source = LayoutSource::new("http://h/rti");
        let mut geometry = ImageGeometry::new(0, 0, ".jpg");
        ZoomifyLayout.prepare(&mut geometry);
        assert_eq!(
            ZoomifyLayout.metadata_url(&source, &geometry).as_deref(),
            Some("http://h/rti/plane_0/ImageProperties.xml")
        );
        ZoomifyLayout.parse_metadata(PROPERTIES, &mut geometry).unwrap();
        assert_eq!(geometry.tile_size, 256);
        assert_eq!((geometry.width, geometry.height), (5000, 3000));
        assert_eq!(geometry.overlap, 0);
        assert_eq!(geometry.level_count, 6);
    }

    #[test]
    fn test_zoomify_tile_groups() {
        let source = LayoutSource::new("http://h/rti");
        let mut geometry = ImageGeometry::new(0, 0, ".jpg");
        ZoomifyLayout.parse_metadata(PROPERTIES, &mut geometry).unwrap();
        let pyramid = ZoomifyLayout.pyramid(&geometry).unwrap();

        let coarse = ZoomifyLayout.tile_url(&source, &geometry, &pyramid, "plane_0.jpg", TileId::new(5, 0, 0));
        assert_eq!(coarse, "http://h/rti/plane_0/TileGroup0/0-0-0.jpg");

        // Full resolution is 20x12 tiles behind 84 coarser tiles.
        let tile = TileId::new(0, 19, 11);
        assert_eq!(pyramid.tile_index(tile), Some(323));
        let fine = ZoomifyLayout.tile_url(&source, &geometry, &pyramid, "plane_0.jpg", tile);
        assert_eq!(fine, "http://h/rti/plane_0/TileGroup1/5-19-11.jpg");

        // 300 >> 8 == 1, while 255 is the last tile of group 0.
        let tile = TileId::new(0, 16, 10);
        assert_eq!(pyramid.tile_index(tile), Some(300));
        let url = ZoomifyLayout.tile_url(&source, &geometry, &pyramid, "plane_0.jpg", tile);
        assert_eq!(url, "http://h/rti/plane_0/TileGroup1/5-16-10.jpg");
        let tile = TileId::new(0, 11, 8);
        assert_eq!(pyramid.tile_index(tile), Some(255));
        let url = ZoomifyLayout.tile_url(&source, &geometry, &pyramid, "plane_0.jpg", tile);
        assert_eq!(url, "http://h/rti/plane_0/TileGroup0/5-11-8.jpg");
    }

    #[test]
    fn test_zoomify_missing_tilesize() {
        let mut geometry = ImageGeometry::new(10, 10, ".jpg");
        assert!(ZoomifyLayout.parse_metadata("<IMAGE_PROPERTIES WIDTH=\"10\"/>", &mut geometry).is_err());
    }
}
