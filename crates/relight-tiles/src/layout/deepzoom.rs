//! Microsoft DeepZoom pyramids described by a `.dzi` file.

use super::{
    ImageGeometry, LayoutKind, LayoutSource, TileLayout, attribute, inverse_level, join,
    metadata_error, numeric_attribute, prefix,
};
use crate::error::TileError;
use crate::pyramid::{Pyramid, TileId};

/// DeepZoom layout: `{name}_files/{level}/{x}_{y}.{format}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeepZoomLayout;

impl TileLayout for DeepZoomLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::DeepZoom
    }

    fn metadata_url(&self, source: &LayoutSource, _geometry: &ImageGeometry) -> Option<String> {
        Some(join(&source.url, &format!("{}.dzi", source.img)))
    }

    fn parse_metadata(&self, text: &str, geometry: &mut ImageGeometry) -> Result<(), TileError> {
        let kind = self.kind();
        let format = attribute(text, "Format")
            .filter(|f| !f.is_empty() && f.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
            .ok_or_else(|| metadata_error(kind, "missing `Format` attribute"))?;
        geometry.suffix = format!(".{format}");
        geometry.tile_size = numeric_attribute(kind, text, "TileSize")?;
        geometry.overlap = numeric_attribute(kind, text, "Overlap")?;
        if geometry.width == 0 {
            geometry.width = numeric_attribute(kind, text, "Width")?;
        }
        if geometry.height == 0 {
            geometry.height = numeric_attribute(kind, text, "Height")?;
        }
        if geometry.tile_size == 0 {
            return Err(metadata_error(kind, "`TileSize` is zero"));
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
        let base = join(&source.url, &format!("{}_files", prefix(name)));
        format!(
            "{base}/{}/{}_{}{}",
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

    const DZI: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Image xmlns="http://schemas.microsoft.com/deepzoom/2008"
  Format="jpg" Overlap="1" TileSize="254">
  <Size Width="2000" Height="1000"/>
</Image>"#;

    #[test]
    fn test_deepzoom_metadata() {
        let source = LayoutSource::new("http://h/rti");
        let mut geometry = ImageGeometry::new(0, 0, ".png");
        assert_eq!(
            DeepZoomLayout.metadata_url(&source, &geometry).as_deref(),
            Some("http://h/rti/plane_0.dzi")
        );
        DeepZoomLayout.parse_metadata(DZI, &mut geometry).unwrap();
        assert_eq!(geometry.suffix, ".jpg");
        assert_eq!(geometry.tile_size, 254);
        assert_eq!(geometry.overlap, 1);
        assert_eq!((geometry.width, geometry.height), (2000, 1000));
        // ceil(log2(2000 / 254)) + 1
        assert_eq!(geometry.level_count, 4);
    }

    #[test]
    fn test_deepzoom_keeps_known_size() {
        let mut geometry = ImageGeometry::new(1500, 900, ".jpg");
        DeepZoomLayout.parse_metadata(DZI, &mut geometry).unwrap();
        assert_eq!((geometry.width, geometry.height), (1500, 900));
    }

    #[test]
    fn test_deepzoom_tile_url() {
        let source = LayoutSource::new("http://h/rti");
        let mut geometry = ImageGeometry::new(0, 0, ".jpg");
        DeepZoomLayout.parse_metadata(DZI, &mut geometry).unwrap();
        let pyramid = DeepZoomLayout.pyramid(&geometry).unwrap();
        let url = DeepZoomLayout.tile_url(&source, &geometry, &pyramid, "plane_3.jpg", TileId::new(1, 2, 0));
        assert_eq!(url, "http://h/rti/plane_3_files/2/2_0.jpg");
    }

    #[test]
    fn test_deepzoom_missing_tile_size() {
        let mut geometry = ImageGeometry::new(0, 0, ".jpg");
        let err = DeepZoomLayout
            .parse_metadata(r#"<Image Format="jpg" Overlap="0"/>"#, &mut geometry)
            .unwrap_err();
        assert!(matches!(err, TileError::Metadata { layout: LayoutKind::DeepZoom, .. }));
    }
}
