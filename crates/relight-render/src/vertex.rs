//! Tile vertex format.

use bytemuck::{Pod, Zeroable};
use relight_tiles::{QUAD_INDICES, TileQuad};

/// Clip-space position and texture coordinate.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TileVertex {
    pub position: [f32; 3],
    pub texcoord: [f32; 2],
}

static_assertions::assert_eq_size!(TileVertex, [u8; 20]);

impl TileVertex {
    /// Vertex buffer layout matching `vs_main`.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        use wgpu::{VertexAttribute, VertexFormat};

        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TileVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: VertexFormat::Float32x3,
                },
                VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: VertexFormat::Float32x2,
                },
            ],
        }
    }

    /// The six vertices (two triangles) of a tile quad.
    #[must_use]
    pub fn triangles(quad: &TileQuad) -> [Self; 6] {
        QUAD_INDICES.map(|i| Self {
            position: quad.positions[i as usize],
            texcoord: quad.texcoords[i as usize],
        })
    }
}
