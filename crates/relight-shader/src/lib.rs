//! Fragment program generation for relightable tiles.
//!
//! A [`ProgramSpec`] describes how coefficient planes are packed into the
//! component images of a dataset. [`build_program`] turns it into a WGSL
//! module, validates it with naga and resolves the layout of its uniform
//! block so light weights can be packed with [`UniformLayout::pack`].

mod error;
mod layout;
mod normals;
mod program;
mod wgsl;

pub use error::ShaderError;
pub use layout::{ArrayLayout, UniformInputs, UniformLayout};
pub use normals::NormalsMode;
pub use program::{ProgramSpec, ShaderProgram, build_program, validate_wgsl};

/// Entry point of the vertex stage.
pub const VERTEX_ENTRY: &str = "vs_main";

/// Entry point of the fragment stage.
pub const FRAGMENT_ENTRY: &str = "fs_main";
