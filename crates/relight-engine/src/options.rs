//! Engine options and their derivation from the viewer config.

use glam::Vec3;
use relight_config::Config;
use relight_shader::NormalsMode;
use relight_tiles::{LayoutKind, LayoutSource};

use crate::error::EngineError;

/// What is being shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// An RTI dataset described by `{url}/info.json`.
    Dataset,
    /// A plain image; the name of its single component.
    Image(String),
    /// An elevation map; the name of its single component.
    Dem(String),
}

/// Options of one [`RelightEngine`](crate::RelightEngine).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub source: SourceKind,
    /// Dataset base URL or directory.
    pub url: String,
    pub layout: LayoutKind,
    /// Image server endpoint (`iip`, `iiif`).
    pub server: Option<String>,
    /// Dataset path on the image server.
    pub path: Option<String>,
    /// Tile file suffix including the dot.
    pub suffix: String,
    /// Initial light direction; normalized on use.
    pub light: Vec3,
    pub normals: NormalsMode,
    /// Output alpha in `[0, 1]`.
    pub opacity: f32,
    /// Hidden engines neither draw nor prefetch.
    pub visible: bool,
    /// Clear color.
    pub background: [f32; 4],
    /// Extra tiles prefetched around the visible range.
    pub border: u32,
    /// Added to the zoom before choosing the finest level.
    pub mipmap_bias: f64,
    /// Tiles in flight at once.
    pub max_requested: usize,
    /// Fit the image to the viewport once loaded.
    pub fit: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            source: SourceKind::Dataset,
            url: String::new(),
            layout: LayoutKind::Image,
            server: None,
            path: None,
            suffix: ".jpg".to_string(),
            light: Vec3::Z,
            normals: NormalsMode::Off,
            opacity: 1.0,
            visible: true,
            background: [0.0; 4],
            border: 1,
            mipmap_bias: 0.5,
            max_requested: 4,
            fit: true,
        }
    }
}

impl EngineOptions {
    /// Options for the viewer config. An unknown layout name is an error.
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        config.validate()?;
        let source = &config.source;
        let kind = match (&source.img, &source.dem) {
            (Some(img), _) => SourceKind::Image(img.clone()),
            (None, Some(dem)) => SourceKind::Dem(dem.clone()),
            (None, None) => SourceKind::Dataset,
        };
        Ok(Self {
            source: kind,
            url: source.url.clone(),
            layout: source.layout.parse()?,
            server: source.server.clone(),
            path: source.path.clone(),
            suffix: source.suffix.clone(),
            light: Vec3::from_array(config.view.light),
            normals: NormalsMode::from_code(config.view.normals),
            opacity: config.view.opacity,
            visible: true,
            background: config.viewer.background,
            border: config.fetch.border,
            mipmap_bias: config.fetch.mipmap_bias,
            max_requested: config.fetch.max_requested,
            fit: config.view.fit,
        })
    }

    /// Check the options that do not depend on fetched data.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_requested == 0 {
            return Err(EngineError::InvalidOption {
                option: "max_requested",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.light.length_squared() == 0.0 {
            return Err(EngineError::InvalidOption {
                option: "light",
                reason: "light direction must be non-zero".to_string(),
            });
        }
        if self.source == SourceKind::Dataset && self.url.is_empty() {
            return Err(EngineError::InvalidOption {
                option: "url",
                reason: "a dataset needs a url".to_string(),
            });
        }
        self.layout.strategy().validate(&self.layout_source())?;
        Ok(())
    }

    /// Where the layout finds the pyramid.
    #[must_use]
    pub fn layout_source(&self) -> LayoutSource {
        let mut source = LayoutSource::new(&self.url);
        source.server = self.server.clone();
        source.path = self.path.clone();
        if let SourceKind::Image(name) | SourceKind::Dem(name) = &self.source {
            source.img = name.clone();
        }
        source
    }

    /// File name of component image `plane`.
    #[must_use]
    pub fn component_name(&self, plane: usize) -> String {
        match &self.source {
            SourceKind::Dataset => format!("plane_{plane}.jpg"),
            SourceKind::Image(name) | SourceKind::Dem(name) => name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    #[test]
    fn test_from_default_config() {
        let mut config = Config::default();
        config.source.url = "https://example.org/coin".to_string();
        let options = EngineOptions::from_config(&config).unwrap();
        assert_eq!(options.layout, LayoutKind::Image);
        assert_eq!(options.source, SourceKind::Dataset);
        assert_eq!(options.max_requested, 4);
        assert_eq!(options.light, Vec3::Z);
        options.validate().unwrap();
    }

    #[test]
    fn test_unknown_layout_is_configuration_error() {
        let mut config = Config::default();
        config.source.layout = "tms".to_string();
        let err = EngineOptions::from_config(&config).unwrap_err();
        assert_eq!(err.kind(), ErrorClass::Configuration);
    }

    #[test]
    fn test_iip_requires_server() {
        let options = EngineOptions {
            url: "coin".to_string(),
            layout: LayoutKind::Iip,
            ..EngineOptions::default()
        };
        let err = options.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorClass::Configuration);
    }

    #[test]
    fn test_plain_image_names() {
        let options = EngineOptions {
            source: SourceKind::Image("photo.png".to_string()),
            ..EngineOptions::default()
        };
        options.validate().unwrap();
        assert_eq!(options.component_name(0), "photo.png");
        assert_eq!(options.layout_source().img, "photo.png");

        let dataset = EngineOptions {
            url: "coin/".to_string(),
            ..EngineOptions::default()
        };
        assert_eq!(dataset.component_name(2), "plane_2.jpg");
        assert_eq!(dataset.layout_source().url, "coin");
        assert_eq!(dataset.layout_source().img, "plane_0");
    }

    #[test]
    fn test_dataset_needs_url() {
        let err = EngineOptions::default().validate().unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidOption { option: "url", .. }
        ));
    }
}
