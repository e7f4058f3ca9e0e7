use crate::surface::TextureId;

/// Errors raised by GPU surfaces.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// No compatible GPU adapter found.
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    /// Failed to request GPU device.
    #[error("failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// Failed to create surface.
    #[error("failed to create surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),

    /// Surface was lost and could not be recovered.
    #[error("surface lost")]
    SurfaceLost,

    /// GPU ran out of memory.
    #[error("out of memory")]
    OutOfMemory,

    /// Acquiring the next frame timed out (skip the frame).
    #[error("timeout")]
    Timeout,

    /// Drawing was attempted before a program was loaded.
    #[error("no program loaded")]
    NoProgram,

    /// A draw referenced a released or unknown texture.
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),

    /// A draw bound the wrong number of textures for the program.
    #[error("program expects {expected} textures, got {actual}")]
    TextureCount {
        /// Bindings declared by the program.
        expected: usize,
        /// Textures passed to the draw.
        actual: usize,
    },

    /// A draw or frame end happened outside `begin_frame`/`end_frame`.
    #[error("no frame in progress")]
    NoFrame,
}
