//! IIP image server protocol.

use super::{
    ImageGeometry, LayoutKind, LayoutSource, TileLayout, inverse_level, leading_u32,
    metadata_error, prefix,
};
use crate::error::TileError;
use crate::pyramid::{Pyramid, TileId};

/// IIP layout: tiles addressed by `JTL={level},{index}` on a pyramidal TIFF.
#[derive(Debug, Clone, Copy, Default)]
pub struct IipLayout;

impl IipLayout {
    /// Text following `key` in an IIP object response.
    fn field<'a>(text: &'a str, key: &str) -> Result<&'a str, TileError> {
        text.split_once(key)
            .map(|(_, rest)| rest)
            .ok_or_else(|| metadata_error(LayoutKind::Iip, format!("missing `{key}`")))
    }

    fn number(text: &str, key: &str) -> Result<u32, TileError> {
        leading_u32(text)
            .ok_or_else(|| metadata_error(LayoutKind::Iip, format!("`{key}` is not a number")))
    }
}

impl TileLayout for IipLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Iip
    }

    fn validate(&self, source: &LayoutSource) -> Result<(), TileError> {
        if source.server.is_none() {
            return Err(TileError::MissingOption {
                layout: self.kind(),
                option: "server",
            });
        }
        if source.path.is_none() {
            return Err(TileError::MissingOption {
                layout: self.kind(),
                option: "path",
            });
        }
        Ok(())
    }

    fn prepare(&self, geometry: &mut ImageGeometry) {
        geometry.suffix = ".tif".to_string();
        geometry.overlap = 0;
    }

    fn metadata_url(&self, source: &LayoutSource, geometry: &ImageGeometry) -> Option<String> {
        Some(format!(
            "{}?FIF={}/{}{}&obj=IIP,1.0&obj=Max-size&obj=Tile-size&obj=Resolution-number",
            source.server(),
            source.path(),
            source.img,
            geometry.suffix
        ))
    }

    fn parse_metadata(&self, text: &str, geometry: &mut ImageGeometry) -> Result<(), TileError> {
        let tile_size = Self::field(text, "Tile-size:")?;
        geometry.tile_size = Self::number(tile_size, "Tile-size")?;

        let max_size = Self::field(text, "Max-size:")?;
        let first_line = max_size.lines().next().unwrap_or_default();
        let mut dims = first_line.split(' ');
        geometry.width = Self::number(dims.next().unwrap_or_default(), "Max-size")?;
        geometry.height = Self::number(dims.next().unwrap_or_default(), "Max-size")?;

        let levels = Self::field(text, "Resolution-number:")?;
        geometry.level_count = Self::number(levels, "Resolution-number")?;
        if geometry.tile_size == 0 || geometry.level_count == 0 {
            return Err(metadata_error(self.kind(), "zero tile size or level count"));
        }
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
        let cols = pyramid.grid(tile.level).map_or(0, |g| g.cols);
        let index = tile.y * cols + tile.x;
        format!(
            "{}?FIF={}/{}{}&JTL={},{index}",
            source.server(),
            source.path(),
            prefix(name),
            geometry.suffix,
            inverse_level(pyramid, tile)
        )
    }
}
