//! Tile pyramid addressing for multi-resolution relightable images.
//!
//! Maps a continuous camera state (pan, log2 zoom, rotation) to the set of
//! tiles needed at each resolution level, assigns every tile a stable flat
//! index, builds tile URLs for the supported pyramid layouts, and computes
//! the clip-space quad of each tile.
//!
//! Level 0 is full resolution; the last level is a single coarse tile that
//! owns flat index 0.

mod error;
pub mod geometry;
pub mod layout;
mod pyramid;
mod quad;

pub use error::TileError;
pub use geometry::{Bounds, Position, Viewport};
pub use layout::{ImageGeometry, LayoutKind, LayoutSource, TileLayout};
pub use pyramid::{LevelGrid, NeededRange, Pyramid, TileBox, TileId, level_count_for};
pub use quad::{QUAD_INDICES, TileQuad};
