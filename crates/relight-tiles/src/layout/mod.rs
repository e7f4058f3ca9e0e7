//! Tile pyramid layout conventions.
//!
//! Each [`LayoutKind`] maps to one [`TileLayout`] implementation that knows
//! its defaults, where its metadata lives, how to read it, and how to build
//! a tile URL.

mod deepzoom;
mod google;
mod iiif;
mod iip;
mod image;
mod zoomify;

use std::fmt;
use std::str::FromStr;

use crate::error::TileError;
use crate::pyramid::{Pyramid, TileId, level_count_for};

pub use deepzoom::DeepZoomLayout;
pub use google::GoogleLayout;
pub use iiif::IiifLayout;
pub use iip::IipLayout;
pub use image::ImageLayout;
pub use zoomify::ZoomifyLayout;

/// Supported pyramid layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutKind {
    /// One untiled image per component.
    Image,
    /// `{z}/{y}/{x}` tiles, 256 px, no overlap.
    Google,
    /// Microsoft DeepZoom (`.dzi` descriptor).
    DeepZoom,
    /// Zoomify (`ImageProperties.xml`, tile groups of 256).
    Zoomify,
    /// IIP image server protocol.
    Iip,
    /// IIIF image API.
    Iiif,
}

impl LayoutKind {
    /// All layouts.
    pub const ALL: [Self; 6] = [
        Self::Image,
        Self::Google,
        Self::DeepZoom,
        Self::Zoomify,
        Self::Iip,
        Self::Iiif,
    ];

    /// Name used in configuration.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Google => "google",
            Self::DeepZoom => "deepzoom",
            Self::Zoomify => "zoomify",
            Self::Iip => "iip",
            Self::Iiif => "iiif",
        }
    }

    /// The strategy implementing this layout.
    #[must_use]
    pub fn strategy(self) -> &'static dyn TileLayout {
        match self {
            Self::Image => &ImageLayout,
            Self::Google => &GoogleLayout,
            Self::DeepZoom => &DeepZoomLayout,
            Self::Zoomify => &ZoomifyLayout,
            Self::Iip => &IipLayout,
            Self::Iiif => &IiifLayout,
        }
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LayoutKind {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| TileError::UnknownLayout(s.to_string()))
    }
}

/// Where the pyramid lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutSource {
    /// Base URL of the dataset, without trailing slash. May be empty for a
    /// bare image name.
    pub url: String,
    /// Image server endpoint (`iip`, `iiif`).
    pub server: Option<String>,
    /// Dataset path on the image server.
    pub path: Option<String>,
    /// Name of the first component, used for metadata lookups.
    pub img: String,
}

impl LayoutSource {
    /// Source rooted at `url`; a trailing slash is dropped.
    #[must_use]
    pub fn new(url: &str) -> Self {
        Self {
            url: url.strip_suffix('/').unwrap_or(url).to_string(),
            img: "plane_0".to_string(),
            ..Self::default()
        }
    }

    fn server(&self) -> &str {
        self.server.as_deref().unwrap_or_default()
    }

    fn path(&self) -> &str {
        self.path.as_deref().unwrap_or_default()
    }
}

/// Pyramid parameters gathered from defaults, dataset info and layout metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageGeometry {
    /// Full-resolution width (0 until known).
    pub width: u32,
    /// Full-resolution height (0 until known).
    pub height: u32,
    /// Tile side in pixels.
    pub tile_size: u32,
    /// Overlap halo in pixels.
    pub overlap: u32,
    /// Number of resolution levels.
    pub level_count: u32,
    /// Tile file suffix including the dot.
    pub suffix: String,
}

impl ImageGeometry {
    /// Geometry with a known (or zero) image size and no tiling yet.
    #[must_use]
    pub fn new(width: u32, height: u32, suffix: &str) -> Self {
        Self {
            width,
            height,
            tile_size: 0,
            overlap: 0,
            level_count: 1,
            suffix: suffix.to_string(),
        }
    }

    /// Recompute the level count from size and tile size.
    pub fn derive_level_count(&mut self) {
        self.level_count = level_count_for(self.width, self.height, self.tile_size);
    }
}

/// One pyramid layout convention.
pub trait TileLayout: Send + Sync {
    /// Which layout this is.
    fn kind(&self) -> LayoutKind;

    /// Check that the source carries every option this layout needs.
    fn validate(&self, _source: &LayoutSource) -> Result<(), TileError> {
        Ok(())
    }

    /// Apply layout defaults before metadata is read.
    fn prepare(&self, _geometry: &mut ImageGeometry) {}

    /// URL of the layout metadata document, if the layout has one.
    fn metadata_url(&self, _source: &LayoutSource, _geometry: &ImageGeometry) -> Option<String> {
        None
    }

    /// Fill `geometry` from the metadata document.
    fn parse_metadata(&self, _text: &str, _geometry: &mut ImageGeometry) -> Result<(), TileError> {
        Ok(())
    }

    /// Whether right/bottom border tiles are smaller than a full tile.
    fn clips_border_tiles(&self) -> bool {
        true
    }

    /// Build the pyramid once the geometry is complete.
    fn pyramid(&self, geometry: &ImageGeometry) -> Result<Pyramid, TileError> {
        Pyramid::new(
            geometry.width,
            geometry.height,
            geometry.tile_size,
            geometry.overlap,
            geometry.level_count,
        )
    }

    /// URL of component `name` of `tile`.
    fn tile_url(
        &self,
        source: &LayoutSource,
        geometry: &ImageGeometry,
        pyramid: &Pyramid,
        name: &str,
        tile: TileId,
    ) -> String;
}

/// Component name without its extension. Names without a dot are kept whole.
#[must_use]
pub fn prefix(name: &str) -> &str {
    name.rfind('.').map_or(name, |dot| &name[..dot])
}

/// Level number counted from the coarsest level, as used in tile paths.
fn inverse_level(pyramid: &Pyramid, tile: TileId) -> u32 {
    pyramid.level_count().saturating_sub(1 + tile.level)
}

/// `{url}/{rest}`, or just `rest` when the url is empty.
fn join(url: &str, rest: &str) -> String {
    if url.is_empty() {
        rest.to_string()
    } else {
        format!("{url}/{rest}")
    }
}

/// Value of `name="..."` in an XML-ish document.
///
/// The attribute name must not be the tail of a longer identifier.
fn attribute<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("{name}=\"");
    let mut from = 0;
    while let Some(found) = text[from..].find(&needle) {
        let start = from + found;
        let standalone = text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_ascii_alphanumeric() && c != '_');
        let value_start = start + needle.len();
        if standalone {
            let len = text[value_start..].find('"')?;
            return Some(&text[value_start..value_start + len]);
        }
        from = value_start;
    }
    None
}

/// Leading decimal digits of `text` (after whitespace) as a number.
fn leading_u32(text: &str) -> Option<u32> {
    let trimmed = text.trim_start();
    let end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().ok()
}

fn metadata_error(layout: LayoutKind, reason: impl Into<String>) -> TileError {
    TileError::Metadata {
        layout,
        reason: reason.into(),
    }
}

/// Required numeric attribute.
fn numeric_attribute(layout: LayoutKind, text: &str, name: &str) -> Result<u32, TileError> {
    attribute(text, name)
        .and_then(leading_u32)
        .ok_or_else(|| metadata_error(layout, format!("missing numeric `{name}` attribute")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_names_roundtrip() {
        for kind in LayoutKind::ALL {
            assert_eq!(kind.name().parse::<LayoutKind>().unwrap(), kind);
            assert_eq!(kind.strategy().kind(), kind);
        }
    }

    #[test]
    fn test_unknown_layout_is_configuration_error() {
        match "tms".parse::<LayoutKind>() {
            Err(TileError::UnknownLayout(name)) => assert_eq!(name, "tms"),
            other => panic!("expected UnknownLayout, got {other:?}"),
        }
    }

    #[test]
    fn test_prefix() {
        assert_eq!(prefix("plane_0.jpg"), "plane_0");
        assert_eq!(prefix("a.b.png"), "a.b");
        assert_eq!(prefix("plane_0"), "plane_0");
    }

    #[test]
    fn test_source_strips_trailing_slash() {
        assert_eq!(LayoutSource::new("http://h/rti/").url, "http://h/rti");
        assert_eq!(LayoutSource::new("http://h/rti").url, "http://h/rti");
    }

    #[test]
    fn test_attribute_lookup() {
        let xml = r#"<Image TileSize="254" Overlap="1" Format="jpg"><Size Width="100" Height="50"/></Image>"#;
        assert_eq!(attribute(xml, "TileSize"), Some("254"));
        assert_eq!(attribute(xml, "Width"), Some("100"));
        assert_eq!(attribute(xml, "Size"), None);
        assert_eq!(attribute(xml, "Missing"), None);
    }

    #[test]
    fn test_leading_u32() {
        assert_eq!(leading_u32("256 256"), Some(256));
        assert_eq!(leading_u32(" 6\n"), Some(6));
        assert_eq!(leading_u32("x6"), None);
    }
}
