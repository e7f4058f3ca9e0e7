//! Mouse and keyboard mapping to viewer commands.

use glam::{DVec2, Vec3};
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

/// Canvas pixels of drag that move the light by one unit.
pub const LIGHT_DRAG_SIZE: f64 = 200.0;

/// What an input asks the viewer to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Move the image by canvas pixels.
    Pan { dx: f64, dy: f64 },
    /// Set the light direction.
    Light(Vec3),
    /// Change the log2 zoom.
    Zoom(f64),
    /// Rotate by degrees.
    Rotate(f64),
    /// Center the image keeping the zoom.
    Center,
    /// Center and fit the image.
    Home,
    /// Next normals preview mode.
    CycleNormals,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragKind {
    Pan,
    Light,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    kind: DragKind,
    origin: DVec2,
    light: Vec3,
}

/// Step sizes of the discrete controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Steps {
    /// Log2 zoom change per wheel notch or key press.
    pub zoom: f64,
    /// Degrees per rotate key press.
    pub rotate: f64,
}

/// Pointer and keyboard state.
///
/// A left drag pans; any other button, or a left drag with shift or ctrl
/// held, or any drag while lighting mode is on, moves the light.
#[derive(Debug)]
pub struct Controls {
    steps: Steps,
    cursor: DVec2,
    drag: Option<Drag>,
    lighting: bool,
    shift: bool,
    ctrl: bool,
}

impl Controls {
    pub fn new(steps: Steps) -> Self {
        Self {
            steps,
            cursor: DVec2::ZERO,
            drag: None,
            lighting: false,
            shift: false,
            ctrl: false,
        }
    }

    /// Whether drags move the light.
    pub fn lighting(&self) -> bool {
        self.lighting
    }

    pub fn set_modifiers(&mut self, shift: bool, ctrl: bool) {
        self.shift = shift;
        self.ctrl = ctrl;
    }

    /// A button went down; `light` is the engine's current light.
    pub fn press(&mut self, button: MouseButton, light: Vec3) {
        let kind = if self.lighting || self.shift || self.ctrl || button != MouseButton::Left {
            DragKind::Light
        } else {
            DragKind::Pan
        };
        self.drag = Some(Drag {
            kind,
            origin: self.cursor,
            light,
        });
    }

    pub fn release(&mut self) {
        self.drag = None;
    }

    /// The cursor moved to `position` (physical pixels).
    pub fn moved(&mut self, position: DVec2) -> Option<Command> {
        let step = position - self.cursor;
        self.cursor = position;
        let drag = self.drag?;
        match drag.kind {
            DragKind::Pan => Some(Command::Pan {
                dx: step.x,
                dy: step.y,
            }),
            DragKind::Light => Some(Command::Light(light_from_drag(
                drag.light,
                position - drag.origin,
            ))),
        }
    }

    /// Wheel scrolled by `lines`, positive away from the user.
    pub fn wheel(&self, lines: f64) -> Option<Command> {
        if lines == 0.0 {
            return None;
        }
        let dz = if lines < 0.0 {
            -self.steps.zoom
        } else {
            self.steps.zoom
        };
        Some(Command::Zoom(dz))
    }

    /// A key was pressed.
    pub fn key(&mut self, key: KeyCode) -> Option<Command> {
        let Steps { zoom, rotate } = self.steps;
        match key {
            KeyCode::Equal | KeyCode::NumpadAdd => Some(Command::Zoom(-zoom)),
            KeyCode::Minus | KeyCode::NumpadSubtract => Some(Command::Zoom(zoom)),
            KeyCode::KeyR if self.shift => Some(Command::Rotate(-rotate)),
            KeyCode::KeyR => Some(Command::Rotate(rotate)),
            KeyCode::KeyC => Some(Command::Center),
            KeyCode::Home | KeyCode::KeyH => Some(Command::Home),
            KeyCode::KeyN => Some(Command::CycleNormals),
            KeyCode::KeyL => {
                self.lighting = !self.lighting;
                None
            }
            KeyCode::Escape | KeyCode::KeyQ => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Light after dragging by `delta` pixels from `start`.
///
/// The horizontal component follows the drag mirrored, the vertical one
/// directly; the result is kept on the upper hemisphere.
pub fn light_from_drag(start: Vec3, delta: DVec2) -> Vec3 {
    let mut x = f64::from(start.x) - delta.x / LIGHT_DRAG_SIZE;
    let mut y = f64::from(start.y) + delta.y / LIGHT_DRAG_SIZE;
    let mut r = x.hypot(y);
    if r > 1.0 {
        x /= r;
        y /= r;
        r = 1.0;
    }
    let z = (1.0 - r).sqrt();
    Vec3::new(x as f32, y as f32, z as f32)
}
