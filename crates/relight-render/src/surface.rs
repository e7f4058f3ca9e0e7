//! The drawing capability consumed by the engine.

use image::RgbaImage;
use relight_shader::ShaderProgram;
use relight_tiles::{TileQuad, Viewport};

use crate::error::RenderError;

/// Handle of an uploaded texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// Something tiles can be drawn on.
///
/// A frame is `begin_frame`, any number of `draw_tile`, then `end_frame`.
/// Uniforms written during a frame apply to the whole frame.
pub trait GpuSurface {
    /// Compile `program` and make it current. Replaces the previous one.
    fn load_program(&mut self, program: &ShaderProgram) -> Result<(), RenderError>;

    /// Upload an RGBA8 image.
    fn upload_texture(&mut self, image: &RgbaImage) -> TextureId;

    /// Free a texture. Unknown ids are ignored.
    fn release_texture(&mut self, id: TextureId);

    /// Replace the uniform block of the current program.
    fn write_uniforms(&mut self, values: &[f32]);

    /// Start a frame cleared to `background` (RGBA, 0..1).
    fn begin_frame(&mut self, viewport: Viewport, background: [f32; 4]) -> Result<(), RenderError>;

    /// Draw one tile with its component textures in binding order.
    fn draw_tile(&mut self, quad: &TileQuad, textures: &[TextureId]) -> Result<(), RenderError>;

    /// Finish and present the frame.
    fn end_frame(&mut self) -> Result<(), RenderError>;
}
