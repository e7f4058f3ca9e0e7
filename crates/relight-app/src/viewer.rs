//! The viewer window: winit event handling around a [`RelightEngine`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::DVec2;
use relight_config::Config;
use relight_engine::{Clock, EngineError, EngineOptions, LoadState, RelightEngine, SystemClock};
use relight_fetch::{AutoTransport, FetchError, Fetcher, ThreadedFetcher};
use relight_render::{RenderError, WgpuSurface, init_render_context_blocking};
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowAttributes, WindowId};

use crate::controls::{Command, Controls, Steps};

/// Fetch queue slots per tile in flight.
const QUEUE_SLOTS_PER_TILE: usize = 16;

/// Poll interval while fetches are outstanding.
const FETCH_POLL: Duration = Duration::from_millis(16);

/// Pixels of a touchpad scroll that count as one wheel line.
const PIXELS_PER_LINE: f64 = 40.0;

type Engine = RelightEngine<WgpuSurface, ThreadedFetcher>;

/// Errors that end the viewer.
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("event loop failed: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("cannot create window: {0}")]
    Window(#[from] winit::error::OsError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Window attributes for the viewer section of the config.
pub fn window_attributes(config: &Config) -> WindowAttributes {
    WindowAttributes::default()
        .with_title(config.viewer.title.clone())
        .with_inner_size(LogicalSize::new(
            f64::from(config.viewer.width),
            f64::from(config.viewer.height),
        ))
}

/// Application state handed to winit.
pub struct Viewer {
    config: Config,
    clock: SystemClock,
    window: Option<Arc<Window>>,
    engine: Option<Engine>,
    controls: Controls,
    failure: Option<ViewerError>,
    reported_failure: bool,
}

impl Viewer {
    pub fn new(config: Config) -> Self {
        let controls = Controls::new(Steps {
            zoom: config.view.zoom_step,
            rotate: config.view.rotate_step,
        });
        Self {
            config,
            clock: SystemClock::new(),
            window: None,
            engine: None,
            controls,
            failure: None,
            reported_failure: false,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), ViewerError> {
        let window = Arc::new(event_loop.create_window(window_attributes(&self.config))?);
        let ctx = init_render_context_blocking(Arc::clone(&window))?;
        info!(
            adapter = %ctx.adapter.get_info().name,
            format = ?ctx.surface_format,
            "GPU ready"
        );

        let fetch = &self.config.fetch;
        let transport = Arc::new(AutoTransport::new(Duration::from_secs(
            fetch.timeout_seconds,
        )));
        let fetcher = ThreadedFetcher::new(
            transport,
            fetch.worker_threads,
            fetch.max_requested * QUEUE_SLOTS_PER_TILE,
        )?;

        let options = EngineOptions::from_config(&self.config)?;
        let mut engine = RelightEngine::new(options, WgpuSurface::new(ctx), fetcher)?
            .with_clock(self.clock);
        let size = window.inner_size();
        engine.resize(size.width, size.height);
        engine.on_position_change(|pos| {
            debug!(x = pos.x, y = pos.y, z = pos.z, a = pos.a, "view moved");
        });
        engine.load();

        self.window = Some(window);
        self.engine = Some(engine);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, e: ViewerError) {
        error!(error = %e, "viewer stopped");
        self.failure = Some(e);
        event_loop.exit();
    }

    fn apply(&mut self, command: Command, event_loop: &ActiveEventLoop) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let view = &self.config.view;
        match command {
            Command::Pan { dx, dy } => engine.pan(view.pan_delay_ms, dx, dy),
            Command::Light(light) => engine.set_light(light.x, light.y, light.z),
            Command::Zoom(dz) => engine.zoom(dz, view.zoom_delay_ms),
            Command::Rotate(angle) => engine.rotate(view.zoom_delay_ms, angle),
            Command::Center => engine.center(view.zoom_delay_ms),
            Command::Home => engine.center_and_scale(view.zoom_delay_ms),
            Command::CycleNormals => {
                if let Err(e) = engine.set_normals(None) {
                    warn!(error = %e, "cannot switch normals mode");
                } else {
                    info!(mode = %engine.normals(), "normals mode");
                }
            }
            Command::Quit => event_loop.exit(),
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        match engine.draw(self.clock.now_ms()) {
            Ok(tiles) => {
                if self.config.debug.trace_frames {
                    debug!(tiles, "frame");
                }
            }
            Err(EngineError::Render(RenderError::SurfaceLost | RenderError::Timeout)) => {
                warn!("frame skipped");
                engine.request_redraw();
            }
            Err(e) => self.fail(event_loop, e.into()),
        }
    }

    /// Consume the viewer, returning the error that stopped it.
    pub fn into_result(self) -> Result<(), ViewerError> {
        self.failure.map_or(Ok(()), Err)
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(engine) = self.engine.as_mut() {
                    engine.resize(size.width, size.height);
                }
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                let state = modifiers.state();
                self.controls
                    .set_modifiers(state.shift_key(), state.control_key());
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(command) = self.controls.moved(DVec2::new(position.x, position.y)) {
                    self.apply(command, event_loop);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => {
                    let light = self
                        .engine
                        .as_ref()
                        .map_or(glam::Vec3::Z, RelightEngine::light);
                    self.controls.press(button, light);
                }
                ElementState::Released => self.controls.release(),
            },
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => f64::from(y),
                    MouseScrollDelta::PixelDelta(p) => p.y / PIXELS_PER_LINE,
                };
                if let Some(command) = self.controls.wheel(lines) {
                    self.apply(command, event_loop);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                if let Some(command) = self.controls.key(key) {
                    self.apply(command, event_loop);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(engine), Some(window)) = (self.engine.as_mut(), &self.window) else {
            return;
        };
        engine.pump();
        if engine.state() == LoadState::Failed && !self.reported_failure {
            self.reported_failure = true;
            if let Some(e) = engine.load_error() {
                error!(error = %e, class = ?e.kind(), "dataset could not be loaded");
            }
        }
        if engine.needs_redraw() {
            window.request_redraw();
        }
        if engine.fetcher().in_flight() > 0 {
            event_loop.set_control_flow(ControlFlow::WaitUntil(Instant::now() + FETCH_POLL));
        } else {
            event_loop.set_control_flow(ControlFlow::Wait);
        }
    }
}

/// Open the viewer window and run until it is closed.
pub fn run(config: Config) -> Result<(), ViewerError> {
    let event_loop = EventLoop::new()?;
    let mut viewer = Viewer::new(config);
    event_loop.run_app(&mut viewer)?;
    viewer.into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::Size;

    #[test]
    fn test_window_attributes_from_config() {
        let mut config = Config::default();
        config.viewer.title = "Coin".to_string();
        config.viewer.width = 640;
        config.viewer.height = 480;
        let attrs = window_attributes(&config);
        assert_eq!(attrs.title, "Coin");
        assert_eq!(
            attrs.inner_size,
            Some(Size::from(LogicalSize::new(640.0, 480.0)))
        );
    }

    #[test]
    fn test_viewer_starts_without_failure() {
        let viewer = Viewer::new(Config::default());
        assert!(viewer.engine.is_none());
        assert!(viewer.into_result().is_ok());
    }
}
