//! Layout of the fragment uniform block.
//!
//! Every member is an array of `vec4<f32>` so the block has no padding
//! surprises: scalar arrays are packed four to a vector, vec3 arrays use
//! one vector per element. Offsets below are in floats.

use glam::Vec3;
use relight_basis::LightWeights;

/// One array member of the uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayLayout {
    /// Float offset of the first element.
    pub offset: usize,
    /// Number of elements.
    pub len: usize,
    /// Elements are vec3 (one vec4 each) rather than packed scalars.
    pub vector: bool,
}

impl ArrayLayout {
    fn new(offset: usize, len: usize, vector: bool) -> Self {
        Self {
            offset,
            len,
            vector,
        }
    }

    /// Number of `vec4` slots.
    #[must_use]
    pub fn slots(&self) -> usize {
        if self.vector {
            self.len.max(1)
        } else {
            self.len.div_ceil(4).max(1)
        }
    }

    /// Floats occupied, including padding.
    #[must_use]
    pub fn floats(&self) -> usize {
        self.slots() * 4
    }

    fn end(&self) -> usize {
        self.offset + self.floats()
    }

    /// Copy `values` in. For vector arrays they are RGB triples.
    fn write(&self, block: &mut [f32], values: &[f32]) {
        if self.vector {
            for (i, rgb) in values.chunks_exact(3).take(self.len).enumerate() {
                let at = self.offset + i * 4;
                block[at..at + 3].copy_from_slice(rgb);
            }
        } else {
            let n = values.len().min(self.len);
            block[self.offset..self.offset + n].copy_from_slice(&values[..n]);
        }
    }
}

/// Resolved uniform block of one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    /// `vec4` holding the light direction in `xyz`.
    pub light: usize,
    /// Opacity, the `w` of the light vector.
    pub opacity: usize,
    /// Weights of the current light.
    pub base: ArrayLayout,
    /// Weights of the three normal calibration lights, in normals mode.
    pub calibration: Option<[ArrayLayout; 3]>,
    /// Per-plane scale, slot 0 unused.
    pub scale: ArrayLayout,
    /// Per-plane bias, slot 0 unused.
    pub bias: ArrayLayout,
    /// Total floats.
    pub size: usize,
}

/// Values to pack into a [`UniformLayout`].
#[derive(Debug, Clone, Copy)]
pub struct UniformInputs<'a> {
    /// Weights of the current light.
    pub weights: &'a LightWeights,
    /// Weights of the calibration lights.
    pub calibration: Option<&'a [LightWeights; 3]>,
    /// Scale array of the first material.
    pub scale: &'a [f32],
    /// Bias array of the first material.
    pub bias: &'a [f32],
    /// Light direction in image space.
    pub light: Vec3,
    /// Output alpha.
    pub opacity: f32,
}

impl UniformLayout {
    /// Layout for `planes + 1` coefficients.
    #[must_use]
    pub fn new(planes: usize, vector_basis: bool, normals: bool) -> Self {
        let np1 = planes + 1;
        let base = ArrayLayout::new(4, np1, vector_basis);
        let mut end = base.end();
        let calibration = normals.then(|| {
            [0, 1, 2].map(|_| {
                let array = ArrayLayout::new(end, np1, vector_basis);
                end = array.end();
                array
            })
        });
        let scale = ArrayLayout::new(end, np1, false);
        let bias = ArrayLayout::new(scale.end(), np1, false);
        Self {
            light: 0,
            opacity: 3,
            base,
            calibration,
            scale,
            bias,
            size: bias.end(),
        }
    }

    /// Size of the block in bytes.
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        (self.size * std::mem::size_of::<f32>()) as u64
    }

    /// Fill a block. Only the first material's weights are used.
    #[must_use]
    pub fn pack(&self, inputs: &UniformInputs<'_>) -> Vec<f32> {
        let mut block = vec![0.0; self.size];
        block[self.light..self.light + 3].copy_from_slice(&inputs.light.to_array());
        block[self.opacity] = inputs.opacity;
        self.base.write(&mut block, &inputs.weights.values);
        if let (Some(arrays), Some(weights)) = (&self.calibration, inputs.calibration) {
            for (array, w) in arrays.iter().zip(weights) {
                array.write(&mut block, &w.values);
            }
        }
        self.scale.write(&mut block, inputs.scale);
        self.bias.write(&mut block, inputs.bias);
        block
    }
}
