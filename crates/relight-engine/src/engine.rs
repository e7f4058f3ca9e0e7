//! The relighting engine: load lifecycle, camera, light and drawing.

use glam::{DVec2, Vec3};
use relight_basis::{BasisKind, BasisModel, RtiInfo, rotate_light};
use relight_fetch::{
    FetchCompletion, FetchRequest, Fetcher, PlaneOutcome, RequestTag, TileStreamer, decode_plane,
};
use relight_render::{GpuSurface, TextureId};
use relight_shader::{NormalsMode, ProgramSpec, ShaderProgram, UniformInputs, build_program};
use relight_tiles::geometry::canvas_box;
use relight_tiles::{
    ImageGeometry, LayoutKind, LayoutSource, Position, Pyramid, TileId, TileQuad, Viewport,
};
use tracing::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::EngineError;
use crate::events::Listeners;
use crate::options::{EngineOptions, SourceKind};
use crate::planner::plan_draw;

/// Where an engine is in its load lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// `load` has not been called.
    Idle,
    /// Metadata requests are outstanding.
    Loading,
    /// Everything needed to draw is known.
    Ready,
    /// The load stopped; see [`RelightEngine::load_error`].
    Failed,
}

/// Pyramid addressing of a loaded source.
struct Addressing {
    layout: LayoutKind,
    source: LayoutSource,
    geometry: ImageGeometry,
    pyramid: Pyramid,
    names: Vec<String>,
}

impl Addressing {
    fn url(&self, tile: TileId, plane: usize) -> String {
        let name = self.names.get(plane).map_or("", String::as_str);
        self.layout
            .strategy()
            .tile_url(&self.source, &self.geometry, &self.pyramid, name, tile)
    }
}

struct Tiling {
    addressing: Addressing,
    streamer: TileStreamer<TextureId>,
}

/// One relightable image drawn on a [`GpuSurface`], streaming its tiles
/// through a [`Fetcher`].
///
/// All state changes happen on the caller's thread: in the setters, in
/// [`pump`](Self::pump) (which applies fetch completions) and in
/// [`draw`](Self::draw).
pub struct RelightEngine<S, F> {
    options: EngineOptions,
    source: LayoutSource,
    surface: S,
    fetcher: F,
    clock: Box<dyn Clock>,

    state: LoadState,
    load_epoch: u64,
    next_generation: u64,
    waiting: u32,
    load_error: Option<EngineError>,
    model: Option<BasisModel>,
    program: Option<ShaderProgram>,
    pending_geometry: Option<ImageGeometry>,
    tiling: Option<Tiling>,

    viewport: Viewport,
    pos: Position,
    previous: Position,
    light: Vec3,
    normals: NormalsMode,
    uniforms: Vec<f32>,
    redraw: bool,
    listeners: Listeners,
}

impl<S: GpuSurface, F: Fetcher> RelightEngine<S, F> {
    /// Engine for `options`. Option errors are reported here, before any
    /// request is made.
    pub fn new(options: EngineOptions, surface: S, fetcher: F) -> Result<Self, EngineError> {
        options.validate()?;
        let light = options.light.normalize();
        let normals = options.normals;
        Ok(Self {
            source: options.layout_source(),
            options,
            surface,
            fetcher,
            clock: Box::new(SystemClock::new()),
            state: LoadState::Idle,
            load_epoch: 0,
            next_generation: 0,
            waiting: 0,
            load_error: None,
            model: None,
            program: None,
            pending_geometry: None,
            tiling: None,
            viewport: Viewport::new(1, 1),
            pos: Position::default(),
            previous: Position::default(),
            light,
            normals,
            uniforms: Vec::new(),
            redraw: false,
            listeners: Listeners::default(),
        })
    }

    /// Replace the time source used for transitions.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    // --- Accessors ---

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Why the load failed, once in [`LoadState::Failed`].
    pub fn load_error(&self) -> Option<&EngineError> {
        self.load_error.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn fetcher_mut(&mut self) -> &mut F {
        &mut self.fetcher
    }

    pub fn model(&self) -> Option<&BasisModel> {
        self.model.as_ref()
    }

    pub fn program(&self) -> Option<&ShaderProgram> {
        self.program.as_ref()
    }

    pub fn pyramid(&self) -> Option<&Pyramid> {
        self.tiling.as_ref().map(|t| &t.addressing.pyramid)
    }

    pub fn streamer(&self) -> Option<&TileStreamer<TextureId>> {
        self.tiling.as_ref().map(|t| &t.streamer)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Normalized light direction in screen space.
    pub fn light(&self) -> Vec3 {
        self.light
    }

    pub fn normals(&self) -> NormalsMode {
        self.normals
    }

    /// Whether a frame has been requested since the last draw.
    pub fn needs_redraw(&self) -> bool {
        self.redraw
    }

    /// Request a frame. Requests coalesce until the next draw.
    pub fn request_redraw(&mut self) {
        self.redraw = true;
    }

    // --- Events ---

    pub fn on_ready(&mut self, f: impl FnMut() + 'static) {
        self.listeners.on_ready(f);
    }

    pub fn on_position_change(&mut self, f: impl FnMut(&Position) + 'static) {
        self.listeners.on_position_change(f);
    }

    pub fn on_light_change(&mut self, f: impl FnMut(&Vec3) + 'static) {
        self.listeners.on_light_change(f);
    }

    // --- Load lifecycle ---

    /// Start loading the source. Plain images are ready to stream at once;
    /// datasets wait for `info.json`.
    pub fn load(&mut self) {
        self.flush();
        // Tile completions of this load must not match an earlier streamer.
        if let Some(tiling) = &self.tiling {
            self.next_generation = self.next_generation.max(tiling.streamer.generation() + 1);
        }
        self.load_epoch += 1;
        self.state = LoadState::Loading;
        self.waiting = 0;
        self.load_error = None;
        self.model = None;
        self.program = None;
        self.pending_geometry = None;
        self.tiling = None;

        let step = match &self.options.source {
            SourceKind::Dataset => {
                let url = join(&self.source.url, "info.json");
                info!(%url, "loading dataset");
                self.waiting += 1;
                let tag = RequestTag::Info {
                    load: self.load_epoch,
                };
                self.fetcher.submit(FetchRequest::new(tag, url));
                Ok(())
            }
            SourceKind::Image(name) => {
                info!(%name, "loading image");
                self.apply_info(&RtiInfo::plain(BasisKind::Image))
            }
            SourceKind::Dem(name) => {
                info!(%name, "loading elevation map");
                self.apply_info(&RtiInfo::plain(BasisKind::Dem))
            }
        };
        self.settle(step);
    }

    /// Apply every completion the fetcher has ready. Returns how many.
    pub fn pump(&mut self) -> usize {
        let completions = self.fetcher.drain();
        let count = completions.len();
        for completion in completions {
            self.on_completion(completion);
        }
        count
    }

    fn on_completion(&mut self, completion: FetchCompletion) {
        let load = match completion.tag {
            RequestTag::TilePlane { .. } => {
                self.on_tile_plane(completion);
                return;
            }
            RequestTag::Info { load }
            | RequestTag::LayoutMetadata { load }
            | RequestTag::BasisBlob { load } => load,
        };
        if load != self.load_epoch || self.state != LoadState::Loading {
            debug!(url = %completion.url, load, "ignoring metadata of a finished load");
            return;
        }
        self.waiting = self.waiting.saturating_sub(1);
        let FetchCompletion {
            tag,
            url,
            buffer,
            result,
        } = completion;
        let step = result.map_err(EngineError::from).and_then(|()| match tag {
            RequestTag::Info { .. } => {
                debug!(%url, bytes = buffer.len(), "info received");
                let info = RtiInfo::from_json(&buffer)?;
                self.apply_info(&info)
            }
            RequestTag::LayoutMetadata { .. } => {
                debug!(%url, bytes = buffer.len(), "layout metadata received");
                self.apply_layout_metadata(&String::from_utf8_lossy(&buffer))
            }
            RequestTag::BasisBlob { .. } => {
                debug!(%url, bytes = buffer.len(), "basis received");
                match self.model.as_mut() {
                    Some(model) => model.load_basis(&buffer).map_err(EngineError::from),
                    None => Ok(()),
                }
            }
            RequestTag::TilePlane { .. } => Ok(()),
        });
        self.settle(step);
    }

    /// Build model and program, then the pyramid or its metadata request.
    fn apply_info(&mut self, info: &RtiInfo) -> Result<(), EngineError> {
        let model = BasisModel::from_info(info)?;
        let program = build_program(&ProgramSpec::from_model(&model, self.normals))?;
        self.surface.load_program(&program)?;
        info!(
            kind = %model.kind(),
            colorspace = %model.colorspace(),
            width = model.width(),
            height = model.height(),
            planes = model.nplanes(),
            program = %program.label(),
            "dataset described"
        );

        let strategy = self.options.layout.strategy();
        let mut geometry = ImageGeometry::new(model.width(), model.height(), &self.options.suffix);
        strategy.prepare(&mut geometry);
        let metadata_url = strategy.metadata_url(&self.source, &geometry);

        if model.needs_basis_blob() {
            let url = join(&self.source.url, "materials.bin");
            self.waiting += 1;
            let tag = RequestTag::BasisBlob {
                load: self.load_epoch,
            };
            self.fetcher.submit(FetchRequest::new(tag, url));
        }
        self.model = Some(model);
        self.program = Some(program);

        match metadata_url {
            Some(url) => {
                self.waiting += 1;
                self.pending_geometry = Some(geometry);
                let tag = RequestTag::LayoutMetadata {
                    load: self.load_epoch,
                };
                self.fetcher.submit(FetchRequest::new(tag, url));
                Ok(())
            }
            None => self.init_tiling(geometry),
        }
    }

    fn apply_layout_metadata(&mut self, text: &str) -> Result<(), EngineError> {
        let Some(mut geometry) = self.pending_geometry.take() else {
            return Ok(());
        };
        self.options
            .layout
            .strategy()
            .parse_metadata(text, &mut geometry)?;
        self.init_tiling(geometry)
    }

    fn init_tiling(&mut self, geometry: ImageGeometry) -> Result<(), EngineError> {
        let layout = self.options.layout;
        let pyramid = layout.strategy().pyramid(&geometry)?;
        let planes = self.program.as_ref().map_or(1, ShaderProgram::texture_count);
        info!(
            %layout,
            levels = pyramid.level_count(),
            tiles = pyramid.tile_count(),
            tile_size = pyramid.tile_size(),
            "pyramid ready"
        );
        let streamer = TileStreamer::new(pyramid.tile_count(), planes, self.options.max_requested)
            .with_generation(self.next_generation);
        self.tiling = Some(Tiling {
            streamer,
            addressing: Addressing {
                layout,
                source: self.source.clone(),
                geometry,
                pyramid,
                names: (0..planes).map(|p| self.options.component_name(p)).collect(),
            },
        });
        Ok(())
    }

    /// Fail on error, otherwise become ready once nothing is outstanding.
    fn settle(&mut self, step: Result<(), EngineError>) {
        if let Err(e) = step {
            error!(error = %e, class = ?e.kind(), "load failed");
            self.state = LoadState::Failed;
            self.load_error = Some(e);
            return;
        }
        if self.state != LoadState::Loading || self.waiting > 0 {
            return;
        }
        if self.tiling.is_none() {
            self.settle(Err(EngineError::InvalidOption {
                option: "layout",
                reason: "no pyramid after metadata".to_string(),
            }));
            return;
        }
        self.state = LoadState::Ready;
        info!("ready");
        if self.options.fit {
            self.center_and_scale(0.0);
        }
        self.compute_light_weights();
        self.listeners.ready();
        self.prefetch();
        self.request_redraw();
    }

    fn on_tile_plane(&mut self, completion: FetchCompletion) {
        let Some(tiling) = self.tiling.as_mut() else {
            return;
        };
        let surface = &mut self.surface;
        let mut decoded = None;
        let outcome = tiling.streamer.on_plane_loaded(completion, |bytes| {
            let image = decode_plane(bytes, "tile plane")?;
            decoded = Some(image.dimensions());
            Ok(surface.upload_texture(&image))
        });

        let settled = match outcome {
            PlaneOutcome::Stale | PlaneOutcome::Pending { .. } => false,
            PlaneOutcome::Ready { index } => {
                debug!(index, "tile ready");
                self.redraw = true;
                true
            }
            PlaneOutcome::Failed { released, .. } => {
                for texture in released {
                    self.surface.release_texture(texture);
                }
                true
            }
            PlaneOutcome::Discarded { texture, .. } => {
                self.surface.release_texture(texture);
                false
            }
        };
        if settled {
            let Tiling {
                addressing,
                streamer,
            } = tiling;
            streamer.drain_queue(&mut self.fetcher, |tile, plane| addressing.url(tile, plane));
        }

        if let Some((width, height)) = decoded {
            self.learn_flat_size(width, height);
        }
    }

    /// An untiled image only knows its size once decoded.
    fn learn_flat_size(&mut self, width: u32, height: u32) {
        let Some(tiling) = self.tiling.as_mut() else {
            return;
        };
        let pyramid = &mut tiling.addressing.pyramid;
        if !pyramid.is_flat() || (pyramid.width(), pyramid.height()) == (width, height) {
            return;
        }
        let first = pyramid.width() == 0;
        pyramid.set_flat_size(width, height);
        tiling.addressing.geometry.width = width;
        tiling.addressing.geometry.height = height;
        debug!(width, height, "image size known");
        if first && self.options.fit {
            self.center_and_scale(0.0);
        }
        self.redraw = true;
    }

    // --- Tiles ---

    /// Queue the tiles needed for the target position and issue what the
    /// request window allows. Returns the number of tiles requested.
    pub fn prefetch(&mut self) -> usize {
        if self.state != LoadState::Ready || !self.options.visible {
            return 0;
        }
        let Some(tiling) = self.tiling.as_mut() else {
            return 0;
        };
        let Tiling {
            addressing,
            streamer,
        } = tiling;
        let needed = addressing.pyramid.needed_range(
            &self.pos,
            self.viewport,
            self.options.border,
            self.options.mipmap_bias,
        );
        streamer.prefetch(&addressing.pyramid, &needed, &mut self.fetcher, |tile, plane| {
            addressing.url(tile, plane)
        })
    }

    /// Release every texture and forget all requests. Tiles are fetched
    /// again on the next prefetch.
    pub fn flush(&mut self) {
        let Some(tiling) = self.tiling.as_mut() else {
            return;
        };
        let released = tiling.streamer.flush();
        debug!(textures = released.len(), "flushed");
        for texture in released {
            self.surface.release_texture(texture);
        }
    }

    // --- Camera ---

    /// Target position.
    pub fn position(&self) -> Position {
        self.pos
    }

    /// Position at `time` (ms, same clock as transitions).
    pub fn current_position(&self, time: f64) -> Position {
        self.pos.interpolate(&self.previous, time)
    }

    /// Move to `(x, y, z, a)` over `dt` milliseconds.
    pub fn set_position(&mut self, dt: f64, x: f64, y: f64, z: f64, a: f64) {
        let now = self.clock.now_ms();
        let current = self.current_position(now);
        let target = Position {
            x,
            y,
            z,
            a,
            t: now + dt.max(0.0),
        };
        if target.same_view(&current) {
            return;
        }
        self.previous = current;
        self.pos = target;
        if target.a != current.a {
            self.compute_light_weights();
        }
        self.prefetch();
        self.request_redraw();
        self.listeners.position_changed(&target);
    }

    /// Change the log2 zoom by `dz`.
    pub fn zoom(&mut self, dz: f64, dt: f64) {
        let p = self.pos;
        self.set_position(dt, p.x, p.y, p.z + dz, p.a);
    }

    /// Move the image by `(dx, dy)` canvas pixels.
    pub fn pan(&mut self, dt: f64, dx: f64, dy: f64) {
        let p = self.pos;
        let scale = p.scale();
        self.set_position(dt, p.x - dx * scale, p.y - dy * scale, p.z, p.a);
    }

    /// Rotate by `angle` degrees counterclockwise, keeping the result in
    /// `[0, 360]`.
    pub fn rotate(&mut self, dt: f64, angle: f64) {
        let p = self.pos;
        let mut a = p.a + angle;
        while a > 360.0 {
            a -= 360.0;
        }
        while a < 0.0 {
            a += 360.0;
        }
        self.set_position(dt, p.x, p.y, p.z, a);
    }

    /// Center the image, keeping zoom and rotation.
    pub fn center(&mut self, dt: f64) {
        let p = self.pos;
        self.set_position(dt, 0.0, 0.0, p.z, p.a);
    }

    /// Center the image and zoom so it fits the viewport.
    pub fn center_and_scale(&mut self, dt: f64) {
        let Some(pyramid) = self.pyramid() else {
            return;
        };
        let image = pyramid.image_extent();
        if image.x <= 0.0 || image.y <= 0.0 {
            return;
        }
        let a = self.pos.a;
        let bounds = canvas_box(&Position::new(0.0, 0.0, 0.0, a), image);
        let size = bounds.size() / self.viewport.extent();
        let z = size.x.max(size.y).log2();
        self.set_position(dt, 0.0, 0.0, z, a);
    }

    /// Resize the drawing area.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = Viewport::new(width.max(1), height.max(1));
        self.prefetch();
        self.request_redraw();
    }

    // --- Light and shading ---

    /// Set the light direction; it is normalized. A zero vector is ignored.
    pub fn set_light(&mut self, x: f32, y: f32, z: f32) {
        let light = Vec3::new(x, y, z);
        if light.length_squared() == 0.0 {
            warn!("ignoring zero light direction");
            return;
        }
        self.light = light.normalize();
        self.compute_light_weights();
        self.request_redraw();
        self.listeners.light_changed(&self.light);
    }

    /// Set the normals preview mode, or cycle it with `None`.
    /// On error the previous mode and program stay in use.
    pub fn set_normals(&mut self, mode: Option<NormalsMode>) -> Result<(), EngineError> {
        let normals = mode.unwrap_or_else(|| self.normals.cycle());
        if let Some(model) = &self.model {
            let program = build_program(&ProgramSpec::from_model(model, normals))?;
            self.surface.load_program(&program)?;
            debug!(program = %program.label(), "program rebuilt");
            self.program = Some(program);
        }
        self.normals = normals;
        self.compute_light_weights();
        self.request_redraw();
        Ok(())
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.options.opacity = opacity.clamp(0.0, 1.0);
        self.compute_light_weights();
        self.request_redraw();
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.options.visible = visible;
        self.prefetch();
        self.request_redraw();
    }

    pub fn set_background(&mut self, background: [f32; 4]) {
        self.options.background = background;
        self.request_redraw();
    }

    /// Recompute the uniform block for the current light, rotation and
    /// opacity.
    fn compute_light_weights(&mut self) {
        if self.state != LoadState::Ready {
            return;
        }
        let (Some(model), Some(program)) = (&self.model, &self.program) else {
            return;
        };
        let light = rotate_light(self.light, self.pos.a as f32);
        let weights = match model.weights(light) {
            Ok(weights) => weights,
            Err(e) => {
                warn!(error = %e, "cannot compute light weights");
                return;
            }
        };
        let calibration = if program.spec.effective_normals().is_enabled() {
            match model.calibration_weights() {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!(error = %e, "cannot compute normal calibration weights");
                    None
                }
            }
        } else {
            None
        };
        self.uniforms = program.layout.pack(&UniformInputs {
            weights: &weights,
            calibration: calibration.as_ref(),
            scale: model.scale(0),
            bias: model.bias(0),
            light,
            opacity: self.options.opacity,
        });
    }

    /// Uniform block written on the next draw.
    pub fn uniforms(&self) -> &[f32] {
        &self.uniforms
    }

    // --- Drawing ---

    /// Draw the frame at `time` and clear the redraw request. While a
    /// transition runs another redraw is requested. Returns the number of
    /// tiles drawn.
    pub fn draw(&mut self, time: f64) -> Result<usize, EngineError> {
        self.redraw = false;
        let pos = self.current_position(time);
        if time < self.pos.t {
            self.redraw = true;
        }
        self.surface.begin_frame(self.viewport, self.options.background)?;
        let drawn = if self.state == LoadState::Ready && self.options.visible {
            self.draw_tiles(&pos)?
        } else {
            0
        };
        self.surface.end_frame()?;
        Ok(drawn)
    }

    fn draw_tiles(&mut self, pos: &Position) -> Result<usize, EngineError> {
        let Some(tiling) = &self.tiling else {
            return Ok(0);
        };
        let pyramid = &tiling.addressing.pyramid;
        let store = tiling.streamer.store();
        let needed = pyramid.needed_range(pos, self.viewport, 0, self.options.mipmap_bias);
        let plan = plan_draw(
            pyramid,
            &needed,
            |index| store.is_complete(index),
            self.options.opacity < 1.0,
        );
        if plan.is_empty() {
            return Ok(0);
        }

        self.surface.write_uniforms(&self.uniforms);
        let clip = tiling.addressing.layout.strategy().clips_border_tiles();
        let mut textures = Vec::with_capacity(store.planes());
        for planned in &plan {
            textures.clear();
            if let Some(iter) = store.textures(planned.index) {
                textures.extend(iter.copied());
            }
            let quad = TileQuad::for_tile(pyramid, planned.tile, clip, pos, self.viewport);
            self.surface.draw_tile(&quad, &textures)?;
        }
        debug!(
            tiles = plan.len(),
            min_level = needed.min_level,
            "frame drawn"
        );
        Ok(plan.len())
    }

    /// Image coordinates of a canvas point at the target position.
    pub fn image_point(&self, canvas: DVec2) -> Option<DVec2> {
        let pyramid = self.pyramid()?;
        Some(relight_tiles::geometry::unproject(
            &self.pos,
            pyramid.image_extent(),
            canvas,
        ))
    }
}

/// `{base}/{name}`, or `name` when `base` is empty.
fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}
