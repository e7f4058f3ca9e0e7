//! Immutable basis model built from `info.json` and the basis tensor.

use glam::Vec3;

use crate::error::BasisError;
use crate::info::{BasisKind, Colorspace, RtiInfo, jpeg_count};
use crate::weights;

/// Lights used to reconstruct the three normal components in preview mode.
pub const NORMAL_CALIBRATION_LIGHTS: [[f32; 3]; 3] = [
    [0.612, 0.354, 0.707],
    [-0.612, 0.354, 0.707],
    [0.0, -0.707, 0.707],
];

/// Shape of a weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightLayout {
    /// One weight per plane.
    Scalar,
    /// One RGB triple per `(material, plane)`, material-major.
    Vec3,
}

/// Weights for one light direction, ready to be packed into uniforms.
#[derive(Debug, Clone, PartialEq)]
pub struct LightWeights {
    /// Flat values.
    pub values: Vec<f32>,
    /// How `values` is organized.
    pub layout: WeightLayout,
}

impl LightWeights {
    /// Weights of a basis with no light dependency.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            values: Vec::new(),
            layout: WeightLayout::Scalar,
        }
    }
}

/// Decoded description of a relightable dataset.
#[derive(Debug, Clone)]
pub struct BasisModel {
    kind: BasisKind,
    colorspace: Colorspace,
    width: u32,
    height: u32,
    nplanes: usize,
    njpegs: usize,
    yccplanes: [usize; 3],
    materials: usize,
    /// Quantization range per material and plane, for basis decoding.
    ranges: Vec<Vec<f32>>,
    /// `scale` uniform per material, `nplanes + 1` long, slot 0 unused.
    scale: Vec<f32>,
    /// `bias` uniform per material, `nplanes + 1` long, slot 0 unused.
    bias: Vec<f32>,
    lights: Vec<Vec3>,
    sigma: f32,
    resolution: usize,
    dimensions: usize,
    basis: Option<Vec<f32>>,
}

impl BasisModel {
    /// Validate an `info.json` and build the model.
    ///
    /// An inline basis is decoded immediately; otherwise
    /// [`needs_basis_blob`](Self::needs_basis_blob) tells whether
    /// `materials.bin` must be fetched.
    pub fn from_info(info: &RtiInfo) -> Result<Self, BasisError> {
        let colorspace = info.resolved_colorspace()?;
        let nplanes = info.plane_count()?;
        let yccplanes = if colorspace == Colorspace::Mycc {
            info.yccplanes.ok_or(BasisError::MissingField("yccplanes"))?
        } else {
            [0, 0, 0]
        };

        let mut model = Self {
            kind: info.kind,
            colorspace,
            width: info.width,
            height: info.height,
            nplanes,
            njpegs: jpeg_count(nplanes),
            yccplanes,
            materials: 0,
            ranges: Vec::new(),
            scale: Vec::new(),
            bias: Vec::new(),
            lights: Vec::new(),
            sigma: 0.0,
            resolution: 0,
            dimensions: 0,
            basis: None,
        };
        if !info.kind.is_relightable() {
            return Ok(model);
        }

        if nplanes == 0 {
            return Err(BasisError::InvalidField {
                field: "nplanes",
                reason: "relightable datasets need at least one plane".to_string(),
            });
        }
        if info.materials.is_empty() {
            return Err(BasisError::MissingField("materials"));
        }
        model.materials = info.materials.len();
        let stride = nplanes + 1;
        model.scale = vec![0.0; stride * model.materials];
        model.bias = vec![0.0; stride * model.materials];
        for (m, material) in info.materials.iter().enumerate() {
            if material.scale.len() < nplanes || material.bias.len() < nplanes {
                return Err(BasisError::InvalidField {
                    field: "materials",
                    reason: format!(
                        "material {m} has {} scales and {} biases for {nplanes} planes",
                        material.scale.len(),
                        material.bias.len()
                    ),
                });
            }
            for p in 1..=nplanes {
                model.scale[m * stride + p] = material.scale[p - 1];
                model.bias[m * stride + p] = material.bias[p - 1];
            }
            model.ranges.push(material.range.clone());
        }

        if info.lights.len() % 3 != 0 {
            return Err(BasisError::InvalidField {
                field: "lights",
                reason: format!("{} values is not a list of xyz triples", info.lights.len()),
            });
        }
        model.lights = info
            .lights
            .chunks_exact(3)
            .map(|c| Vec3::new(c[0], c[1], c[2]))
            .collect();

        match info.kind {
            BasisKind::Rbf => {
                model.sigma = info.sigma.ok_or(BasisError::MissingField("sigma"))?;
                if model.lights.is_empty() {
                    return Err(BasisError::MissingField("lights"));
                }
                model.dimensions = model.lights.len();
            }
            BasisKind::Bilinear => {
                let res = info.resolution.ok_or(BasisError::MissingField("resolution"))?;
                if res < 2 {
                    return Err(BasisError::InvalidField {
                        field: "resolution",
                        reason: format!("grid side {res} is smaller than 2"),
                    });
                }
                model.resolution = res;
                model.dimensions = res * res;
            }
            _ => {}
        }

        if colorspace.has_vector_basis()
            && let Some(inline) = &info.basis
        {
            model.load_basis(inline)?;
        }
        Ok(model)
    }

    /// Basis type.
    #[must_use]
    pub fn kind(&self) -> BasisKind {
        self.kind
    }

    /// Component packing.
    #[must_use]
    pub fn colorspace(&self) -> Colorspace {
        self.colorspace
    }

    /// Image width declared by the metadata (0 if unknown).
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height declared by the metadata (0 if unknown).
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Coefficient plane count.
    #[must_use]
    pub fn nplanes(&self) -> usize {
        self.nplanes
    }

    /// Component images per tile.
    #[must_use]
    pub fn njpegs(&self) -> usize {
        self.njpegs
    }

    /// Planes per YCbCr channel (zeros unless mycc).
    #[must_use]
    pub fn yccplanes(&self) -> [usize; 3] {
        self.yccplanes
    }

    /// Number of materials.
    #[must_use]
    pub fn materials(&self) -> usize {
        self.materials
    }

    /// `scale` uniform of one material (`nplanes + 1` entries).
    #[must_use]
    pub fn scale(&self, material: usize) -> &[f32] {
        self.material_slice(&self.scale, material)
    }

    /// `bias` uniform of one material (`nplanes + 1` entries).
    #[must_use]
    pub fn bias(&self, material: usize) -> &[f32] {
        self.material_slice(&self.bias, material)
    }

    fn material_slice<'a>(&self, values: &'a [f32], material: usize) -> &'a [f32] {
        let stride = self.nplanes + 1;
        values
            .get(material * stride..(material + 1) * stride)
            .unwrap_or(&[])
    }

    /// Whether `materials.bin` has to be fetched before weights can be computed.
    #[must_use]
    pub fn needs_basis_blob(&self) -> bool {
        self.colorspace.has_vector_basis() && self.basis.is_none()
    }

    /// Whether light weights depend on a basis tensor.
    fn uses_tensor(&self) -> bool {
        matches!(self.kind, BasisKind::Rbf | BasisKind::Bilinear)
    }

    /// Decode the `[material][plane 0..=nplanes][dim][rgb]` byte tensor.
    ///
    /// Plane 0 maps bytes to `[0, 1]`; the other planes are centered on 127
    /// and divided by the material's quantization range.
    pub fn load_basis(&mut self, bytes: &[u8]) -> Result<(), BasisError> {
        let stride = self.nplanes + 1;
        let expected = self.materials * stride * self.dimensions * 3;
        if bytes.len() != expected {
            return Err(BasisError::BlobSize {
                expected,
                actual: bytes.len(),
            });
        }
        for (m, range) in self.ranges.iter().enumerate() {
            if range.len() < self.nplanes || range.iter().any(|r| *r == 0.0) {
                return Err(BasisError::InvalidField {
                    field: "range",
                    reason: format!("material {m} needs {} non-zero ranges", self.nplanes),
                });
            }
        }

        let block = self.dimensions * 3;
        let mut basis = vec![0.0; bytes.len()];
        for m in 0..self.materials {
            for p in 0..stride {
                let start = (m * stride + p) * block;
                for o in start..start + block {
                    let raw = f32::from(bytes[o]);
                    basis[o] = if p == 0 {
                        raw / 255.0
                    } else {
                        (raw - 127.0) / self.ranges[m][p - 1]
                    };
                }
            }
        }
        log::debug!(
            "Decoded basis tensor: {} materials, {} planes, {} dimensions",
            self.materials,
            self.nplanes,
            self.dimensions
        );
        self.basis = Some(basis);
        Ok(())
    }

    /// Offset of `(material, plane, dimension, channel)` in the tensor.
    fn offset(&self, m: usize, p: usize, l: usize, k: usize) -> usize {
        ((m * (self.nplanes + 1) + p) * self.dimensions + l) * 3 + k
    }

    /// Weights for an image-space light direction.
    pub fn weights(&self, light: Vec3) -> Result<LightWeights, BasisError> {
        if self.uses_tensor() && self.basis.is_none() {
            return Err(BasisError::BasisNotLoaded);
        }
        let weights = match self.kind {
            BasisKind::Image | BasisKind::Dem => LightWeights::empty(),
            BasisKind::Ptm => LightWeights {
                values: weights::ptm(light, self.nplanes),
                layout: WeightLayout::Scalar,
            },
            BasisKind::Hsh => LightWeights {
                values: weights::hsh(light).to_vec(),
                layout: WeightLayout::Scalar,
            },
            BasisKind::Rbf => {
                let kernel = weights::rbf_kernel(&self.lights, self.sigma, light);
                self.blend(kernel.into_iter())
            }
            BasisKind::Bilinear => {
                let s = weights::octa_sample(light, self.resolution);
                let res = self.resolution;
                let cells = [
                    (s.x, s.y, s.weights[0]),
                    (s.x + 1, s.y, s.weights[1]),
                    (s.x, s.y + 1, s.weights[2]),
                    (s.x + 1, s.y + 1, s.weights[3]),
                ];
                self.blend(cells.into_iter().map(|(x, y, w)| (x + y * res, w)))
            }
        };
        Ok(weights)
    }

    /// Weighted sum of tensor slices, `(dimension, weight)` pairs.
    fn blend(&self, samples: impl Iterator<Item = (usize, f32)> + Clone) -> LightWeights {
        let np1 = self.nplanes + 1;
        let mut values = vec![0.0; self.materials * np1 * 3];
        let Some(basis) = &self.basis else {
            return LightWeights {
                values,
                layout: WeightLayout::Vec3,
            };
        };
        for m in 0..self.materials {
            for p in 0..np1 {
                for k in 0..3 {
                    values[3 * (m * np1 + p) + k] = samples
                        .clone()
                        .map(|(l, w)| w * basis[self.offset(m, p, l, k)])
                        .sum();
                }
            }
        }
        LightWeights {
            values,
            layout: WeightLayout::Vec3,
        }
    }

    /// Weights of the three normal calibration lights.
    pub fn calibration_weights(&self) -> Result<[LightWeights; 3], BasisError> {
        let [a, b, c] = NORMAL_CALIBRATION_LIGHTS.map(Vec3::from_array);
        Ok([self.weights(a)?, self.weights(b)?, self.weights(c)?])
    }
}
