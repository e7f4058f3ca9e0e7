//! Camera state and the image/canvas coordinate transforms.
//!
//! Canvas coordinates are centered on the viewport with y pointing down.
//! Image coordinates are pixels of the full-resolution image with the origin
//! at the top-left corner.

use glam::DVec2;

/// Camera state.
///
/// `x, y` offset the view center in image units, `z` is the log2 zoom
/// (0 = native, larger = zoomed out), `a` is the counterclockwise rotation in
/// degrees and `t` the timestamp in milliseconds at which this state is (or
/// will be) reached.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    /// Horizontal offset.
    pub x: f64,
    /// Vertical offset.
    pub y: f64,
    /// Log2 zoom.
    pub z: f64,
    /// Rotation in degrees.
    pub a: f64,
    /// Target timestamp in milliseconds.
    pub t: f64,
}

impl Position {
    /// Position at time zero.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64, a: f64) -> Self {
        Self { x, y, z, a, t: 0.0 }
    }

    /// Whether two positions describe the same view, ignoring time.
    #[must_use]
    pub fn same_view(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y && self.z == other.z && self.a == other.a
    }

    /// State at `time` of a transition from `previous` to `self`.
    ///
    /// Transitions shorter than 1 ms snap to the target. Rotation is blended
    /// linearly, so 350° → 10° spins the long way round.
    #[must_use]
    pub fn interpolate(&self, previous: &Self, time: f64) -> Self {
        let duration = self.t - previous.t;
        if time >= self.t || duration < 1.0 {
            return Self { t: time, ..*self };
        }
        let ft = (1.0 - (self.t - time) / duration).clamp(0.0, 1.0);
        let blend = |from: f64, to: f64| from + (to - from) * ft;
        Self {
            x: blend(previous.x, self.x),
            y: blend(previous.y, self.y),
            z: blend(previous.z, self.z),
            a: blend(previous.a, self.a),
            t: time,
        }
    }

    /// Linear scale factor `2^z`.
    #[must_use]
    pub fn scale(&self) -> f64 {
        self.z.exp2()
    }
}

/// Size of the drawing surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Viewport {
    /// Create a viewport.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Size as a vector.
    #[must_use]
    pub fn extent(&self) -> DVec2 {
        DVec2::new(f64::from(self.width), f64::from(self.height))
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum corner.
    pub min: DVec2,
    /// Maximum corner.
    pub max: DVec2,
}

impl Bounds {
    /// Bounds of a set of points.
    fn enclosing(points: impl IntoIterator<Item = DVec2>) -> Self {
        points.into_iter().fold(
            Self {
                min: DVec2::splat(f64::INFINITY),
                max: DVec2::splat(f64::NEG_INFINITY),
            },
            |b, p| Self {
                min: b.min.min(p),
                max: b.max.max(p),
            },
        )
    }

    /// Extent of the box.
    #[must_use]
    pub fn size(&self) -> DVec2 {
        self.max - self.min
    }
}

/// Rotate `v` clockwise by `a` degrees (y down, so counterclockwise on screen).
#[must_use]
pub fn rot(v: DVec2, a: f64) -> DVec2 {
    DVec2::from_angle(-a.to_radians()).rotate(v)
}

/// Image coordinates to canvas coordinates.
#[must_use]
pub fn project(pos: &Position, image: DVec2, p: DVec2) -> DVec2 {
    let r = rot(p - image / 2.0, pos.a);
    (r - DVec2::new(pos.x, pos.y)) / pos.scale()
}

/// Canvas coordinates to image coordinates.
#[must_use]
pub fn unproject(pos: &Position, image: DVec2, p: DVec2) -> DVec2 {
    rot(p * pos.scale() + DVec2::new(pos.x, pos.y), -pos.a) + image / 2.0
}

/// Bounds of the whole image in canvas coordinates.
#[must_use]
pub fn canvas_box(pos: &Position, image: DVec2) -> Bounds {
    let corners = [
        DVec2::ZERO,
        DVec2::new(0.0, image.y),
        image,
        DVec2::new(image.x, 0.0),
    ];
    Bounds::enclosing(corners.map(|c| project(pos, image, c)))
}

/// Bounds of the visible canvas in image coordinates.
#[must_use]
pub fn image_box(pos: &Position, image: DVec2, viewport: Viewport) -> Bounds {
    let half = viewport.extent() / 2.0;
    let corners = [
        DVec2::new(-half.x, -half.y),
        DVec2::new(-half.x, half.y),
        half,
        DVec2::new(half.x, -half.y),
    ];
    Bounds::enclosing(corners.map(|c| unproject(pos, image, c)))
}
