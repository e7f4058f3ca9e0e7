//! Configuration structs with viewer defaults and RON persistence.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level viewer configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Window settings.
    pub viewer: ViewerConfig,
    /// Where the relightable image comes from.
    pub source: SourceConfig,
    /// Initial light, shading mode and navigation steps.
    pub view: ViewConfig,
    /// Tile streaming settings.
    pub fetch: FetchConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Window configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewerConfig {
    /// Window width in logical pixels.
    pub width: u32,
    /// Window height in logical pixels.
    pub height: u32,
    /// Enable vsync (PresentMode::Fifo).
    pub vsync: bool,
    /// Window title.
    pub title: String,
    /// Clear color behind the image, RGBA in `[0, 1]`.
    pub background: [f32; 4],
}

/// Image source configuration.
///
/// `url` points at the directory holding `info.json` and the tile pyramid.
/// `server` and `path` are only used by the `iip` and `iiif` layouts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL or local directory of the dataset.
    pub url: String,
    /// Tile pyramid layout: `image`, `google`, `deepzoom`, `zoomify`, `iip` or `iiif`.
    pub layout: String,
    /// Image server endpoint for `iip` / `iiif`.
    pub server: Option<String>,
    /// Dataset path on the image server.
    pub path: Option<String>,
    /// Plain image to show instead of an RTI dataset.
    pub img: Option<String>,
    /// Elevation map to show instead of an RTI dataset.
    pub dem: Option<String>,
    /// Tile file suffix. Layouts with fixed formats override it.
    pub suffix: String,
}

/// Initial view state and navigation steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewConfig {
    /// Initial light direction (normalized at load).
    pub light: [f32; 3],
    /// Normal preview mode: 0 off, 1 tangent-space colors, 2 lit.
    pub normals: u8,
    /// Image opacity in `[0, 1]`.
    pub opacity: f32,
    /// Fit the image to the window once loaded.
    pub fit: bool,
    /// Log2 zoom change applied per wheel notch.
    pub zoom_step: f64,
    /// Animation length of zoom steps in milliseconds.
    pub zoom_delay_ms: f64,
    /// Animation length of pans and rotations in milliseconds.
    pub pan_delay_ms: f64,
    /// Rotation applied per key press, in degrees.
    pub rotate_step: f64,
}

/// Tile streaming configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum number of tiles in flight at once.
    pub max_requested: usize,
    /// Extra ring of tiles fetched around the visible range.
    pub border: u32,
    /// Offset added to the zoom before choosing the finest level.
    pub mipmap_bias: f64,
    /// Fetch worker threads (0 = one per CPU, capped at `max_requested`).
    pub worker_threads: usize,
    /// HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Log per-frame tile statistics at debug level.
    pub trace_frames: bool,
}

// --- Default implementations ---

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            vsync: true,
            title: "Relight".to_string(),
            background: [0.0, 0.0, 0.0, 0.0],
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            layout: "image".to_string(),
            server: None,
            path: None,
            img: None,
            dem: None,
            suffix: ".jpg".to_string(),
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            light: [0.0, 0.0, 1.0],
            normals: 0,
            opacity: 1.0,
            fit: true,
            zoom_step: 0.25,
            zoom_delay_ms: 200.0,
            pan_delay_ms: 0.0,
            rotate_step: 15.0,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_requested: 4,
            border: 1,
            mipmap_bias: 0.5,
            worker_threads: 0,
            timeout_seconds: 30,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            trace_frames: false,
        }
    }
}

// --- Validation ---

impl Config {
    /// Reject settings that would stall or break the viewer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.max_requested == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch.max_requested",
                reason: "at least one request must be allowed in flight".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.view.opacity) {
            return Err(ConfigError::InvalidValue {
                field: "view.opacity",
                reason: format!("{} is outside [0, 1]", self.view.opacity),
            });
        }
        if self.view.normals > 2 {
            return Err(ConfigError::InvalidValue {
                field: "view.normals",
                reason: format!("{} is not 0, 1 or 2", self.view.normals),
            });
        }
        if self.view.light.iter().all(|c| *c == 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "view.light",
                reason: "light direction must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Returns `Some(new_config)` if the file on disk differs from `self`.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}
