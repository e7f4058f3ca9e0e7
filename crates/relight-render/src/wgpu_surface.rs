//! [`GpuSurface`] backed by wgpu.

use std::collections::HashMap;

use image::RgbaImage;
use relight_shader::{FRAGMENT_ENTRY, ShaderProgram, VERTEX_ENTRY};
use relight_tiles::{TileQuad, Viewport};
use wgpu::util::DeviceExt;

use crate::error::RenderError;
use crate::gpu::RenderContext;
use crate::surface::{GpuSurface, TextureId};
use crate::vertex::TileVertex;

struct PlaneTexture {
    // Kept alive for the view.
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

/// Pipeline and bindings of the current program.
struct ProgramState {
    label: String,
    pipeline: wgpu::RenderPipeline,
    uniforms: wgpu::Buffer,
    uniform_size: u64,
    shared: wgpu::BindGroup,
    planes_layout: wgpu::BindGroupLayout,
    texture_count: usize,
}

struct Frame {
    viewport: Viewport,
    background: [f32; 4],
    vertices: Vec<TileVertex>,
    draws: Vec<Vec<TextureId>>,
}

/// Draws tiles with wgpu into a window or an offscreen texture.
pub struct WgpuSurface {
    ctx: RenderContext,
    offscreen: Option<wgpu::Texture>,
    sampler: wgpu::Sampler,
    textures: HashMap<TextureId, PlaneTexture>,
    next_texture: u64,
    program: Option<ProgramState>,
    frame: Option<Frame>,
    frames: u64,
}

impl WgpuSurface {
    /// Wrap an initialized context. Headless contexts get an offscreen
    /// target of the configured size.
    pub fn new(ctx: RenderContext) -> Self {
        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("plane-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });
        let offscreen = ctx
            .surface
            .is_none()
            .then(|| create_offscreen(&ctx.device, ctx.surface_format, ctx.size()));
        Self {
            ctx,
            offscreen,
            sampler,
            textures: HashMap::new(),
            next_texture: 1,
            program: None,
            frame: None,
            frames: 0,
        }
    }

    /// Offscreen surface, for tools and tests.
    pub fn headless(width: u32, height: u32) -> Result<Self, RenderError> {
        let ctx = pollster::block_on(RenderContext::headless(width, height))?;
        Ok(Self::new(ctx))
    }

    /// The underlying context.
    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    /// Number of live textures.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Frames presented so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Resize the target. Zero sizes clamp to 1.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
        if self.offscreen.is_some() {
            self.offscreen = Some(create_offscreen(
                &self.ctx.device,
                self.ctx.surface_format,
                self.ctx.size(),
            ));
        }
    }

    fn build_state(&self, program: &ShaderProgram) -> ProgramState {
        let device = &self.ctx.device;
        let label = program.label();
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&label),
            source: wgpu::ShaderSource::Wgsl(program.source.as_str().into()),
        });

        let shared_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("relight-shared-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let plane_entries: Vec<_> = (0..program.texture_count())
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding: binding as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            })
            .collect();
        let planes_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("relight-planes-layout"),
            entries: &plane_entries,
        });

        let uniform_size = program.layout.byte_size();
        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("relight-uniforms"),
            contents: &vec![0u8; uniform_size as usize],
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let shared = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("relight-shared"),
            layout: &shared_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("relight-pipeline-layout"),
            bind_group_layouts: &[&shared_layout, &planes_layout],
            immediate_size: 0,
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some(VERTEX_ENTRY),
                buffers: &[TileVertex::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some(FRAGMENT_ENTRY),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.ctx.surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview_mask: None,
            cache: None,
        });

        ProgramState {
            label,
            pipeline,
            uniforms,
            uniform_size,
            shared,
            planes_layout,
            texture_count: program.texture_count(),
        }
    }

    fn record(&self, frame: &Frame, target: &wgpu::TextureView) -> wgpu::CommandBuffer {
        let device = &self.ctx.device;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("relight-frame"),
        });

        let vertex_buffer = (!frame.vertices.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("relight-tiles"),
                contents: bytemuck::cast_slice(&frame.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });
        let plane_groups: Vec<wgpu::BindGroup> = match &self.program {
            Some(program) => frame
                .draws
                .iter()
                .map(|ids| self.plane_group(program, ids))
                .collect(),
            None => Vec::new(),
        };

        let [r, g, b, a] = frame.background.map(f64::from);
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("relight-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            if let (Some(program), Some(buffer)) = (&self.program, &vertex_buffer) {
                let (width, height) = self.ctx.size();
                pass.set_viewport(
                    0.0,
                    0.0,
                    frame.viewport.width.clamp(1, width) as f32,
                    frame.viewport.height.clamp(1, height) as f32,
                    0.0,
                    1.0,
                );
                pass.set_pipeline(&program.pipeline);
                pass.set_bind_group(0, &program.shared, &[]);
                pass.set_vertex_buffer(0, buffer.slice(..));
                for (i, group) in plane_groups.iter().enumerate() {
                    let first = (i * 6) as u32;
                    pass.set_bind_group(1, group, &[]);
                    pass.draw(first..first + 6, 0..1);
                }
            }
        }
        encoder.finish()
    }

    fn plane_group(&self, program: &ProgramState, ids: &[TextureId]) -> wgpu::BindGroup {
        let entries: Vec<_> = ids
            .iter()
            .enumerate()
            .filter_map(|(binding, id)| {
                self.textures.get(id).map(|plane| wgpu::BindGroupEntry {
                    binding: binding as u32,
                    resource: wgpu::BindingResource::TextureView(&plane.view),
                })
            })
            .collect();
        self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("relight-planes"),
            layout: &program.planes_layout,
            entries: &entries,
        })
    }
}

impl GpuSurface for WgpuSurface {
    fn load_program(&mut self, program: &ShaderProgram) -> Result<(), RenderError> {
        let state = self.build_state(program);
        log::debug!(
            "Loaded program '{}' ({} textures, {} uniform bytes)",
            state.label,
            state.texture_count,
            state.uniform_size
        );
        self.program = Some(state);
        Ok(())
    }

    fn upload_texture(&mut self, image: &RgbaImage) -> TextureId {
        let (width, height) = (image.width().max(1), image.height().max(1));
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = self.ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("relight-plane"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        if image.width() > 0 && image.height() > 0 {
            self.ctx.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                image.as_raw(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * width),
                    rows_per_image: None,
                },
                size,
            );
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(
            id,
            PlaneTexture {
                _texture: texture,
                view,
            },
        );
        id
    }

    fn release_texture(&mut self, id: TextureId) {
        self.textures.remove(&id);
    }

    fn write_uniforms(&mut self, values: &[f32]) {
        let Some(program) = &self.program else {
            log::warn!("Uniforms written with no program loaded");
            return;
        };
        let bytes: &[u8] = bytemuck::cast_slice(values);
        let len = bytes.len().min(program.uniform_size as usize);
        if len > 0 {
            self.ctx
                .queue
                .write_buffer(&program.uniforms, 0, &bytes[..len]);
        }
    }

    fn begin_frame(&mut self, viewport: Viewport, background: [f32; 4]) -> Result<(), RenderError> {
        if self.ctx.size() != (viewport.width.max(1), viewport.height.max(1)) {
            self.resize(viewport.width, viewport.height);
        }
        self.frame = Some(Frame {
            viewport,
            background,
            vertices: Vec::new(),
            draws: Vec::new(),
        });
        Ok(())
    }

    fn draw_tile(&mut self, quad: &TileQuad, textures: &[TextureId]) -> Result<(), RenderError> {
        let program = self.program.as_ref().ok_or(RenderError::NoProgram)?;
        if textures.len() != program.texture_count {
            return Err(RenderError::TextureCount {
                expected: program.texture_count,
                actual: textures.len(),
            });
        }
        if let Some(missing) = textures.iter().find(|id| !self.textures.contains_key(id)) {
            return Err(RenderError::UnknownTexture(*missing));
        }
        let frame = self.frame.as_mut().ok_or(RenderError::NoFrame)?;
        frame.vertices.extend(TileVertex::triangles(quad));
        frame.draws.push(textures.to_vec());
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        let frame = self.frame.take().ok_or(RenderError::NoFrame)?;
        match &self.offscreen {
            Some(texture) => {
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                let commands = self.record(&frame, &view);
                self.ctx.queue.submit(std::iter::once(commands));
            }
            None => {
                let output = self.ctx.get_current_texture()?;
                let view = output
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                let commands = self.record(&frame, &view);
                self.ctx.queue.submit(std::iter::once(commands));
                output.present();
            }
        }
        self.frames += 1;
        Ok(())
    }
}

fn create_offscreen(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    (width, height): (u32, u32),
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("relight-offscreen"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use relight_basis::Colorspace;
    use relight_shader::{NormalsMode, ProgramSpec, build_program};

    fn surface() -> Option<WgpuSurface> {
        WgpuSurface::headless(64, 64).ok()
    }

    fn program(colorspace: Colorspace, njpegs: usize) -> ShaderProgram {
        build_program(&ProgramSpec {
            colorspace,
            njpegs,
            nplanes: njpegs * 3,
            normals: NormalsMode::Off,
            yccplanes: [0; 3],
        })
        .unwrap()
    }

    fn quad() -> TileQuad {
        TileQuad {
            positions: [
                [-1.0, 1.0, 0.0],
                [-1.0, -1.0, 0.0],
                [1.0, -1.0, 0.0],
                [1.0, 1.0, 0.0],
            ],
            texcoords: [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]],
        }
    }

    #[test]
    fn test_draw_without_program_fails() {
        let Some(mut surface) = surface() else {
            return;
        };
        surface
            .begin_frame(Viewport::new(64, 64), [0.0, 0.0, 0.0, 1.0])
            .unwrap();
        let id = surface.upload_texture(&RgbaImage::new(4, 4));
        assert!(matches!(
            surface.draw_tile(&quad(), &[id]),
            Err(RenderError::NoProgram)
        ));
        surface.end_frame().unwrap();
    }

    #[test]
    fn test_draw_relit_tile() {
        let Some(mut surface) = surface() else {
            return;
        };
        let program = program(Colorspace::Rgb, 2);
        surface.load_program(&program).unwrap();
        surface.write_uniforms(&vec![0.5; program.layout.size]);
        let ids: Vec<_> = (0..2)
            .map(|_| surface.upload_texture(&RgbaImage::from_pixel(8, 8, image::Rgba([128; 4]))))
            .collect();
        surface
            .begin_frame(Viewport::new(64, 64), [0.0, 0.0, 0.0, 0.0])
            .unwrap();
        surface.draw_tile(&quad(), &ids).unwrap();
        surface.end_frame().unwrap();
        assert_eq!(surface.frames(), 1);
    }

    #[test]
    fn test_draw_checks_bindings() {
        let Some(mut surface) = surface() else {
            return;
        };
        surface.load_program(&program(Colorspace::Rgb, 2)).unwrap();
        let id = surface.upload_texture(&RgbaImage::new(4, 4));
        surface
            .begin_frame(Viewport::new(64, 64), [0.0; 4])
            .unwrap();
        assert!(matches!(
            surface.draw_tile(&quad(), &[id]),
            Err(RenderError::TextureCount {
                expected: 2,
                actual: 1
            })
        ));
        surface.release_texture(id);
        assert!(matches!(
            surface.draw_tile(&quad(), &[id, id]),
            Err(RenderError::UnknownTexture(_))
        ));
        surface.end_frame().unwrap();
    }

    #[test]
    fn test_begin_frame_resizes_offscreen_target() {
        let Some(mut surface) = surface() else {
            return;
        };
        surface
            .begin_frame(Viewport::new(32, 16), [0.0; 4])
            .unwrap();
        assert_eq!(surface.context().size(), (32, 16));
        surface.end_frame().unwrap();
        assert!(matches!(surface.end_frame(), Err(RenderError::NoFrame)));
    }
}
