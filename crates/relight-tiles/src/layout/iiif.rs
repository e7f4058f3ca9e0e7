//! IIIF image API.

use serde_json::Value;

use super::{ImageGeometry, LayoutKind, LayoutSource, TileLayout, metadata_error, prefix};
use crate::error::TileError;
use crate::pyramid::{Pyramid, TileId};

/// IIIF layout: tiles are region/size requests against the full image.
#[derive(Debug, Clone, Copy, Default)]
pub struct IiifLayout;

impl IiifLayout {
    fn integer(info: &Value, pointer: &str) -> Result<u32, TileError> {
        info.pointer(pointer)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| metadata_error(LayoutKind::Iiif, format!("missing integer `{pointer}`")))
    }
}

impl TileLayout for IiifLayout {
    fn kind(&self) -> LayoutKind {
        LayoutKind::Iiif
    }

    fn validate(&self, source: &LayoutSource) -> Result<(), TileError> {
        for (option, value) in [("server", &source.server), ("path", &source.path)] {
            if value.is_none() {
                return Err(TileError::MissingOption {
                    layout: self.kind(),
                    option,
                });
            }
        }
        Ok(())
    }

    fn metadata_url(&self, source: &LayoutSource, _geometry: &ImageGeometry) -> Option<String> {
        Some(format!(
            "{}?IIIF={}/{}/info.json",
            source.server(),
            source.path(),
            source.img
        ))
    }

    fn parse_metadata(&self, text: &str, geometry: &mut ImageGeometry) -> Result<(), TileError> {
        let info: Value = serde_json::from_str(text)
            .map_err(|e| metadata_error(self.kind(), e.to_string()))?;
        geometry.width = Self::integer(&info, "/width")?;
        geometry.height = Self::integer(&info, "/height")?;
        geometry.tile_size = Self::integer(&info, "/tiles/0/width")?;
        geometry.level_count = info
            .pointer("/tiles/0/scaleFactors")
            .and_then(Value::as_array)
            .map(|factors| factors.len() as u32)
            .filter(|n| *n > 0)
            .ok_or_else(|| metadata_error(self.kind(), "missing `tiles[0].scaleFactors`"))?;
        if geometry.tile_size == 0 {
            return Err(metadata_error(self.kind(), "tile width is zero"));
        }
        Ok(())
    }

    fn tile_url(
        &self,
        source: &LayoutSource,
        _geometry: &ImageGeometry,
        pyramid: &Pyramid,
        name: &str,
        tile: TileId,
    ) -> String {
        let tw = i64::from(pyramid.tile_size());
        let s = 1i64 << tile.level.min(62);
        let width = i64::from(pyramid.width());
        let height = i64::from(pyramid.height());

        let xr = i64::from(tile.x) * tw * s;
        let yr = i64::from(tile.y) * tw * s;
        let wr = (tw * s).min(width - xr);
        let hr = (tw * s).min(height - yr);

        // Edge tiles are scaled down with a real division, printed like a JS number.
        let shrink = |full: i64, offset: i64| {
            if offset + tw * s > full {
                (full - offset + s - 1) as f64 / s as f64
            } else {
                tw as f64
            }
        };
        let ws = shrink(width, xr);
        let hs = shrink(height, yr);

        format!(
            "{}?IIIF={}/{}/{xr},{yr},{wr},{hr}/{ws},{hs}/0/default.jpg",
            source.server(),
            source.path(),
            prefix(name)
        )
    }
}
