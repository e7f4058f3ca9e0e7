//! The `info.json` dataset description.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::error::BasisError;

/// Reconstruction basis declared by a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BasisKind {
    /// Polynomial texture map, 6 quadratic terms.
    Ptm,
    /// Hemispherical harmonics up to band 2, 9 terms.
    Hsh,
    /// Radial basis interpolation of calibration lights.
    Rbf,
    /// Bilinear interpolation over an octahedral light grid.
    Bilinear,
    /// Plain color image, no relighting.
    #[serde(rename = "img")]
    Image,
    /// Elevation map shown as an image.
    Dem,
}

impl BasisKind {
    /// Whether the dataset carries a light-dependent basis at all.
    #[must_use]
    pub fn is_relightable(self) -> bool {
        !matches!(self, Self::Image | Self::Dem)
    }
}

impl fmt::Display for BasisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ptm => "ptm",
            Self::Hsh => "hsh",
            Self::Rbf => "rbf",
            Self::Bilinear => "bilinear",
            Self::Image => "img",
            Self::Dem => "dem",
        })
    }
}

/// How coefficient planes are packed into the component images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colorspace {
    /// One coefficient per jpeg, applied to all three channels.
    Rgb,
    /// Luma coefficients per jpeg, chroma taken from the first jpeg.
    Ycc,
    /// Per-material RGB basis vectors.
    Mrgb,
    /// Per-material YCbCr basis vectors with luma-only tail planes.
    Mycc,
    /// RGB albedo modulated by a luminance polynomial.
    Lrgb,
    /// Plain texture lookup.
    Img,
    /// Elevation map, rendered like a plain image.
    Dem,
}

impl Colorspace {
    /// Whether basis entries are RGB triples rather than scalars.
    #[must_use]
    pub fn has_vector_basis(self) -> bool {
        matches!(self, Self::Mrgb | Self::Mycc)
    }
}

impl fmt::Display for Colorspace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rgb => "rgb",
            Self::Ycc => "ycc",
            Self::Mrgb => "mrgb",
            Self::Mycc => "mycc",
            Self::Lrgb => "lrgb",
            Self::Img => "img",
            Self::Dem => "dem",
        })
    }
}

impl FromStr for Colorspace {
    type Err = BasisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rgb" => Ok(Self::Rgb),
            "ycc" => Ok(Self::Ycc),
            "mrgb" => Ok(Self::Mrgb),
            "mycc" => Ok(Self::Mycc),
            "lrgb" => Ok(Self::Lrgb),
            "img" => Ok(Self::Img),
            "dem" => Ok(Self::Dem),
            other => Err(BasisError::InvalidField {
                field: "colorspace",
                reason: format!("unknown colorspace `{other}`"),
            }),
        }
    }
}

/// Per-material dequantization parameters.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MaterialInfo {
    /// Scale per coefficient plane.
    #[serde(default)]
    pub scale: Vec<f32>,
    /// Bias per coefficient plane.
    #[serde(default)]
    pub bias: Vec<f32>,
    /// Quantization range of the basis tensor per plane (mrgb/mycc only).
    #[serde(default)]
    pub range: Vec<f32>,
}

/// Parsed `info.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RtiInfo {
    /// Basis type.
    #[serde(rename = "type")]
    pub kind: BasisKind,
    /// Packing of the component images. Absent for plain images.
    #[serde(default)]
    pub colorspace: Option<Colorspace>,
    /// Full-resolution width; `0` means "take it from the first tile".
    #[serde(default, deserialize_with = "lenient_dimension")]
    pub width: u32,
    /// Full-resolution height.
    #[serde(default, deserialize_with = "lenient_dimension")]
    pub height: u32,
    /// Number of coefficient planes (ignored for mycc).
    #[serde(default)]
    pub nplanes: usize,
    /// Planes per YCbCr channel (mycc only).
    #[serde(default)]
    pub yccplanes: Option<[usize; 3]>,
    /// Dequantization parameters per material.
    #[serde(default)]
    pub materials: Vec<MaterialInfo>,
    /// Calibration light directions, flattened xyz.
    #[serde(default)]
    pub lights: Vec<f32>,
    /// RBF kernel width.
    #[serde(default)]
    pub sigma: Option<f32>,
    /// Side of the octahedral light grid (bilinear only).
    #[serde(default)]
    pub resolution: Option<usize>,
    /// Inline basis tensor; otherwise fetched from `materials.bin`.
    #[serde(default)]
    pub basis: Option<Vec<u8>>,
}

impl RtiInfo {
    /// Parse an `info.json` document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, BasisError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Description used when a plain image or elevation map is shown.
    ///
    /// The size is unknown until the image itself has been decoded.
    #[must_use]
    pub fn plain(kind: BasisKind) -> Self {
        Self {
            kind,
            colorspace: None,
            width: 0,
            height: 0,
            nplanes: 3,
            yccplanes: None,
            materials: Vec::new(),
            lights: Vec::new(),
            sigma: None,
            resolution: None,
            basis: None,
        }
    }

    /// Effective colorspace, derived from the basis kind for plain images.
    pub fn resolved_colorspace(&self) -> Result<Colorspace, BasisError> {
        match self.kind {
            BasisKind::Image => Ok(Colorspace::Img),
            BasisKind::Dem => Ok(Colorspace::Dem),
            _ => self.colorspace.ok_or(BasisError::MissingField("colorspace")),
        }
    }

    /// Coefficient plane count. For mycc it is the sum of `yccplanes`.
    pub fn plane_count(&self) -> Result<usize, BasisError> {
        if self.colorspace == Some(Colorspace::Mycc) {
            let ycc = self.yccplanes.ok_or(BasisError::MissingField("yccplanes"))?;
            return Ok(ycc.iter().sum());
        }
        Ok(self.nplanes)
    }
}

/// Number of 3-channel images needed to hold `nplanes` planes.
#[must_use]
pub fn jpeg_count(nplanes: usize) -> usize {
    nplanes.div_ceil(3)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Dimension {
    Integer(u64),
    Float(f64),
    Text(String),
}

/// Accepts `1024`, `1024.0` or `"1024"` like the reference viewer does.
fn lenient_dimension<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Dimension::deserialize(deserializer)? {
        Dimension::Integer(v) => u32::try_from(v).map_err(D::Error::custom),
        Dimension::Float(v) if v >= 0.0 && v <= f64::from(u32::MAX) => Ok(v.trunc() as u32),
        Dimension::Float(v) => Err(D::Error::custom(format!("dimension {v} out of range"))),
        Dimension::Text(s) => {
            let digits: String = s.trim().chars().take_while(char::is_ascii_digit).collect();
            digits
                .parse()
                .map_err(|_| D::Error::custom(format!("dimension `{s}` is not a number")))
        }
    }
}
