//! Light-direction to weight-vector functions, one per basis.
//!
//! All functions take a light direction already expressed in image space
//! (see [`rotate_light`]).

use glam::{Vec2, Vec3};

/// π as used by the HSH fitter that produced the datasets.
///
/// The coefficients were fitted with this truncated constant, so using the
/// exact value shifts the reconstruction slightly.
pub const HSH_PI: f32 = 3.1415;

/// Weights below this fraction are dropped from the RBF blend.
pub const RBF_CUTOFF: f32 = 0.001;

/// Rotate a screen-space light into image space for a view rotated by
/// `angle_deg` degrees counterclockwise. The z component is kept.
#[must_use]
pub fn rotate_light(light: Vec3, angle_deg: f32) -> Vec3 {
    let xy = Vec2::from_angle(angle_deg.to_radians()).rotate(light.truncate());
    xy.extend(light.z)
}

/// PTM weights `[1, x, y, x², xy, y²]`, zero-padded or truncated to `nplanes`.
#[must_use]
pub fn ptm(light: Vec3, nplanes: usize) -> Vec<f32> {
    let (x, y) = (light.x, light.y);
    let w = [1.0, x, y, x * x, x * y, y * y, 0.0, 0.0, 0.0];
    let mut out = vec![0.0; nplanes];
    for (dst, src) in out.iter_mut().zip(w) {
        *dst = src;
    }
    out
}

/// The nine real hemispherical harmonics up to band 2.
#[must_use]
pub fn hsh(light: Vec3) -> [f32; 9] {
    let mut phi = light.y.atan2(light.x);
    if phi < 0.0 {
        phi += 2.0 * HSH_PI;
    }
    let theta = light.z.clamp(-1.0, 1.0).acos().min(HSH_PI / 2.0 - 0.5);

    let cos_p = phi.cos();
    let sin_p = phi.sin();
    let cos_t = theta.cos();
    let cos_t2 = cos_t * cos_t;
    let root = (cos_t - cos_t2).sqrt();

    [
        1.0 / (2.0 * HSH_PI).sqrt(),
        (6.0 / HSH_PI).sqrt() * cos_p * root,
        (3.0 / (2.0 * HSH_PI)).sqrt() * (-1.0 + 2.0 * cos_t),
        (6.0 / HSH_PI).sqrt() * root * sin_p,
        (30.0 / HSH_PI).sqrt() * (2.0 * phi).cos() * (-cos_t + cos_t2),
        (30.0 / HSH_PI).sqrt() * cos_p * (-1.0 + 2.0 * cos_t) * root,
        (5.0 / (2.0 * HSH_PI)).sqrt() * (1.0 - 6.0 * cos_t + 6.0 * cos_t2),
        (30.0 / HSH_PI).sqrt() * (-1.0 + 2.0 * cos_t) * root * sin_p,
        (30.0 / HSH_PI).sqrt() * (-cos_t + cos_t2) * (2.0 * phi).sin(),
    ]
}

/// Normalized RBF kernel weights of every calibration light.
///
/// Returns `(light index, weight)` for the lights that survive the
/// [`RBF_CUTOFF`], renormalized to sum to one.
#[must_use]
pub fn rbf_kernel(lights: &[Vec3], sigma: f32, light: Vec3) -> Vec<(usize, f32)> {
    let radius = 1.0 / (sigma * sigma);
    let raw: Vec<f32> = lights
        .iter()
        .map(|l| (-radius * l.distance_squared(light)).exp())
        .collect();
    let total: f32 = raw.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return Vec::new();
    }

    let mut kept: Vec<(usize, f32)> = raw
        .iter()
        .enumerate()
        .map(|(i, w)| (i, w / total))
        .filter(|(_, w)| *w > RBF_CUTOFF)
        .collect();
    let kept_total: f32 = kept.iter().map(|(_, w)| w).sum();
    for (_, w) in &mut kept {
        *w /= kept_total;
    }
    kept
}

/// Grid cell and bilinear weights of a light on the octahedral map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OctaSample {
    /// Lower-left grid column.
    pub x: usize,
    /// Lower-left grid row.
    pub y: usize,
    /// Weights of `(x, y)`, `(x+1, y)`, `(x, y+1)`, `(x+1, y+1)`.
    pub weights: [f32; 4],
}

/// Locate a light on a `resolution × resolution` octahedral grid.
///
/// `resolution` must be at least 2.
#[must_use]
pub fn octa_sample(light: Vec3, resolution: usize) -> OctaSample {
    let s = light.x.abs() + light.y.abs() + light.z.abs();
    // 45 degree rotation of the octahedral projection.
    let x = (light.x + light.y) / s;
    let y = (light.y - light.x) / s;
    let span = resolution as f32 - 1.0;
    let x = (x + 1.0) / 2.0 * span;
    let y = (y + 1.0) / 2.0 * span;

    let max_cell = resolution.saturating_sub(2) as f32;
    let sx = x.floor().clamp(0.0, max_cell);
    let sy = y.floor().clamp(0.0, max_cell);
    let dx = x - sx;
    let dy = y - sy;

    OctaSample {
        x: sx as usize,
        y: sy as usize,
        weights: [
            (1.0 - dx) * (1.0 - dy),
            dx * (1.0 - dy),
            (1.0 - dx) * dy,
            dx * dy,
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_rotate_light_keeps_z() {
        let l = rotate_light(Vec3::new(1.0, 0.0, 0.5), 90.0);
        assert!(approx(l.x, 0.0));
        assert!(approx(l.y, 1.0));
        assert_eq!(l.z, 0.5);
    }

    #[test]
    fn test_rotate_light_zero_is_identity() {
        let l = Vec3::new(0.3, -0.4, 0.86);
        assert_eq!(rotate_light(l, 0.0), l);
    }

    #[test]
    fn test_ptm_overhead_light() {
        assert_eq!(ptm(Vec3::Z, 6), vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_ptm_pads_and_truncates() {
        let w = ptm(Vec3::new(0.5, 0.25, 0.8), 18);
        assert_eq!(w.len(), 18);
        assert_eq!(&w[..6], &[1.0, 0.5, 0.25, 0.25, 0.125, 0.0625]);
        assert!(w[6..].iter().all(|v| *v == 0.0));
        assert_eq!(ptm(Vec3::Z, 3), vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_hsh_constant_term() {
        let w = hsh(Vec3::new(0.2, 0.1, 0.97));
        assert!(approx(w[0], 1.0 / (2.0 * HSH_PI).sqrt()));
    }

    #[test]
    fn test_hsh_theta_is_clamped() {
        // Grazing lights are pulled up to the same elevation, so the result
        // only depends on the azimuth.
        let a = hsh(Vec3::new(1.0, 0.0, 0.0));
        let b = hsh(Vec3::new(0.9, 0.0, 0.1).normalize());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!(approx(*x, *y));
        }
    }

    #[test]
    fn test_hsh_negative_azimuth_wraps() {
        let w = hsh(Vec3::new(0.0, -0.5, 0.866));
        // phi = 3π/2: cos ≈ 0, sin ≈ -1.
        assert!(w[1].abs() < 1e-3);
        assert!(w[3] < 0.0);
    }

    #[test]
    fn test_rbf_single_light_gets_all_weight() {
        let w = rbf_kernel(&[Vec3::Z], 0.5, Vec3::new(0.3, 0.0, 0.95));
        assert_eq!(w, vec![(0, 1.0)]);
    }

    #[test]
    fn test_rbf_drops_far_lights_and_renormalizes() {
        let lights = [Vec3::Z, Vec3::X, Vec3::new(0.0, 0.1, 0.995).normalize()];
        let w = rbf_kernel(&lights, 0.1, Vec3::Z);
        assert!(w.iter().all(|(i, _)| *i != 1));
        let total: f32 = w.iter().map(|(_, v)| v).sum();
        assert!(approx(total, 1.0));
        assert!(w[0].1 > w[1].1);
    }

    #[test]
    fn test_octa_overhead_hits_grid_center() {
        let s = octa_sample(Vec3::Z, 3);
        assert_eq!((s.x, s.y), (1, 1));
        assert_eq!(s.weights, [1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_octa_weights_sum_to_one() {
        let s = octa_sample(Vec3::new(0.4, -0.3, 0.866), 8);
        let total: f32 = s.weights.iter().sum();
        assert!(approx(total, 1.0));
        assert!(s.x <= 6 && s.y <= 6);
    }

    /// Upper-hemisphere light landing on grid coordinates `(gx, gy)`.
    fn light_at(gx: f32, gy: f32, resolution: usize) -> Vec3 {
        let span = resolution as f32 - 1.0;
        let ox = gx / span * 2.0 - 1.0;
        let oy = gy / span * 2.0 - 1.0;
        let lx = (ox - oy) / 2.0;
        let ly = (ox + oy) / 2.0;
        Vec3::new(lx, ly, 1.0 - lx.abs() - ly.abs())
    }

    /// Weight of every grid sample, row-major.
    fn dense(sample: OctaSample, resolution: usize) -> Vec<f32> {
        let mut grid = vec![0.0; resolution * resolution];
        let corners = [(0, 0), (1, 0), (0, 1), (1, 1)];
        for ((cx, cy), w) in corners.into_iter().zip(sample.weights) {
            grid[(sample.y + cy) * resolution + sample.x + cx] += w;
        }
        grid
    }

    fn max_difference(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(a, b)| (a - b).abs()).fold(0.0, f32::max)
    }

    #[test]
    fn test_octa_weights_continuous_across_cells() {
        const RES: usize = 5;
        const EPS: f32 = 1e-3;
        for (gx, gy, along_x) in [(2.0, 1.3, true), (1.3, 2.0, false)] {
            let step = |d: f32| {
                if along_x {
                    light_at(gx + d, gy, RES)
                } else {
                    light_at(gx, gy + d, RES)
                }
            };
            let below = octa_sample(step(-EPS), RES);
            let above = octa_sample(step(EPS), RES);
            assert_ne!((below.x, below.y), (above.x, above.y));

            let on = dense(octa_sample(step(0.0), RES), RES);
            let below = dense(below, RES);
            let above = dense(above, RES);
            assert!(max_difference(&below, &on) < 5e-3);
            assert!(max_difference(&above, &on) < 5e-3);
            assert!(max_difference(&below, &above) < 1e-2);
        }
    }
}
