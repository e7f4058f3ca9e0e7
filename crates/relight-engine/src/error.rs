//! Engine errors and their classification.

use relight_basis::BasisError;
use relight_config::ConfigError;
use relight_fetch::FetchError;
use relight_render::RenderError;
use relight_shader::ShaderError;
use relight_tiles::TileError;

/// Broad class of an [`EngineError`], for hosts that react per class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Bad option; returned before anything is loaded.
    Configuration,
    /// Dataset or layout metadata cannot be used; the load stops.
    MetadataParse,
    /// A resource could not be fetched or decoded.
    TileFetch,
    /// A tile was requested twice. Indicates a scheduling defect.
    DuplicateRequest,
    /// The generated program is invalid.
    ShaderCompile,
    /// The GPU surface failed.
    Surface,
}

/// Errors raised by [`RelightEngine`](crate::RelightEngine).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Tile(#[from] TileError),

    #[error(transparent)]
    Basis(#[from] BasisError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error(transparent)]
    Render(#[from] RenderError),

    /// An engine option is missing or out of range.
    #[error("invalid option `{option}`: {reason}")]
    InvalidOption {
        option: &'static str,
        reason: String,
    },
}

impl EngineError {
    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorClass {
        match self {
            Self::Config(_) | Self::InvalidOption { .. } => ErrorClass::Configuration,
            Self::Tile(TileError::UnknownLayout(_) | TileError::MissingOption { .. }) => {
                ErrorClass::Configuration
            }
            Self::Tile(_) | Self::Basis(_) => ErrorClass::MetadataParse,
            Self::Fetch(FetchError::DuplicateRequest { .. }) => ErrorClass::DuplicateRequest,
            Self::Fetch(_) => ErrorClass::TileFetch,
            Self::Shader(_) => ErrorClass::ShaderCompile,
            Self::Render(_) => ErrorClass::Surface,
        }
    }
}
