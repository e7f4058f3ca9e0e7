//! A [`GpuSurface`] that only records what it was asked to do.

use std::collections::BTreeSet;

use image::RgbaImage;
use relight_shader::ShaderProgram;
use relight_tiles::{TileQuad, Viewport};

use crate::error::RenderError;
use crate::surface::{GpuSurface, TextureId};

/// One recorded surface call.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    LoadProgram { label: String, textures: usize },
    Upload { id: TextureId, width: u32, height: u32 },
    Release(TextureId),
    Uniforms(Vec<f32>),
    BeginFrame { viewport: Viewport, background: [f32; 4] },
    Draw { quad: TileQuad, textures: Vec<TextureId> },
    EndFrame,
}

/// Headless surface with the same validation as the GPU one.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    calls: Vec<SurfaceCall>,
    live: BTreeSet<TextureId>,
    next_texture: u64,
    program_textures: Option<usize>,
    in_frame: bool,
    out_of_memory: bool,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far.
    pub fn calls(&self) -> &[SurfaceCall] {
        &self.calls
    }

    /// Make program loads fail with [`RenderError::OutOfMemory`].
    pub fn set_out_of_memory(&mut self, out_of_memory: bool) {
        self.out_of_memory = out_of_memory;
    }

    /// Forget recorded calls but keep textures and program.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of completed frames.
    pub fn frames(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, SurfaceCall::EndFrame))
            .count()
    }

    /// Draw calls of the last completed frame.
    pub fn last_frame_draws(&self) -> Vec<(TileQuad, Vec<TextureId>)> {
        let Some(end) = self
            .calls
            .iter()
            .rposition(|c| matches!(c, SurfaceCall::EndFrame))
        else {
            return Vec::new();
        };
        let start = self.calls[..end]
            .iter()
            .rposition(|c| matches!(c, SurfaceCall::BeginFrame { .. }))
            .unwrap_or(0);
        self.calls[start..end]
            .iter()
            .filter_map(|c| match c {
                SurfaceCall::Draw { quad, textures } => Some((*quad, textures.clone())),
                _ => None,
            })
            .collect()
    }

    /// Textures uploaded and not yet released.
    pub fn live_textures(&self) -> &BTreeSet<TextureId> {
        &self.live
    }

    /// Most recent uniform block.
    pub fn last_uniforms(&self) -> Option<&[f32]> {
        self.calls.iter().rev().find_map(|c| match c {
            SurfaceCall::Uniforms(values) => Some(values.as_slice()),
            _ => None,
        })
    }

    /// Labels of every program loaded, in order.
    pub fn programs(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                SurfaceCall::LoadProgram { label, .. } => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl GpuSurface for RecordingSurface {
    fn load_program(&mut self, program: &ShaderProgram) -> Result<(), RenderError> {
        if self.out_of_memory {
            return Err(RenderError::OutOfMemory);
        }
        self.program_textures = Some(program.texture_count());
        self.calls.push(SurfaceCall::LoadProgram {
            label: program.label(),
            textures: program.texture_count(),
        });
        Ok(())
    }

    fn upload_texture(&mut self, image: &RgbaImage) -> TextureId {
        self.next_texture += 1;
        let id = TextureId(self.next_texture);
        self.live.insert(id);
        self.calls.push(SurfaceCall::Upload {
            id,
            width: image.width(),
            height: image.height(),
        });
        id
    }

    fn release_texture(&mut self, id: TextureId) {
        if self.live.remove(&id) {
            self.calls.push(SurfaceCall::Release(id));
        }
    }

    fn write_uniforms(&mut self, values: &[f32]) {
        self.calls.push(SurfaceCall::Uniforms(values.to_vec()));
    }

    fn begin_frame(&mut self, viewport: Viewport, background: [f32; 4]) -> Result<(), RenderError> {
        self.in_frame = true;
        self.calls.push(SurfaceCall::BeginFrame {
            viewport,
            background,
        });
        Ok(())
    }

    fn draw_tile(&mut self, quad: &TileQuad, textures: &[TextureId]) -> Result<(), RenderError> {
        let expected = self.program_textures.ok_or(RenderError::NoProgram)?;
        if !self.in_frame {
            return Err(RenderError::NoFrame);
        }
        if textures.len() != expected {
            return Err(RenderError::TextureCount {
                expected,
                actual: textures.len(),
            });
        }
        if let Some(missing) = textures.iter().find(|id| !self.live.contains(id)) {
            return Err(RenderError::UnknownTexture(*missing));
        }
        self.calls.push(SurfaceCall::Draw {
            quad: *quad,
            textures: textures.to_vec(),
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        if !self.in_frame {
            return Err(RenderError::NoFrame);
        }
        self.in_frame = false;
        self.calls.push(SurfaceCall::EndFrame);
        Ok(())
    }
}
