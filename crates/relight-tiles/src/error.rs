//! Tile addressing errors.

use crate::layout::LayoutKind;

/// Errors raised while configuring a layout or reading its metadata.
#[derive(Debug, thiserror::Error)]
pub enum TileError {
    /// The layout name is not one of the supported pyramid conventions.
    #[error("unknown tile layout `{0}`")]
    UnknownLayout(String),

    /// The layout needs an option that was not provided.
    #[error("layout `{layout}` requires the `{option}` option")]
    MissingOption {
        /// Layout being configured.
        layout: LayoutKind,
        /// Name of the missing option.
        option: &'static str,
    },

    /// The layout metadata document could not be interpreted.
    #[error("cannot parse {layout} metadata: {reason}")]
    Metadata {
        /// Layout whose metadata was parsed.
        layout: LayoutKind,
        /// What was missing or malformed.
        reason: String,
    },

    /// The image size or tile size cannot form a pyramid.
    #[error("invalid pyramid geometry: {0}")]
    InvalidGeometry(String),
}
