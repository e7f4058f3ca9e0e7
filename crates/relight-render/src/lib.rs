//! GPU surface abstraction for the relighting engine.
//!
//! The engine only talks to a [`GpuSurface`]. [`WgpuSurface`] draws through
//! wgpu into a window or an offscreen target; [`RecordingSurface`] keeps a
//! log of calls for headless use and tests.

mod error;
pub mod gpu;
mod recording;
mod surface;
mod vertex;
mod wgpu_surface;

pub use error::RenderError;
pub use gpu::{RenderContext, init_render_context_blocking};
pub use recording::{RecordingSurface, SurfaceCall};
pub use surface::{GpuSurface, TextureId};
pub use vertex::TileVertex;
pub use wgpu_surface::WgpuSurface;
