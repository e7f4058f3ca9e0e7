//! Program description, generation and validation.

use log::debug;
use relight_basis::{BasisModel, Colorspace};

use crate::error::ShaderError;
use crate::layout::UniformLayout;
use crate::normals::NormalsMode;
use crate::wgsl;

/// Everything that shapes a fragment program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSpec {
    /// Plane packing.
    pub colorspace: Colorspace,
    /// Component images per tile.
    pub njpegs: usize,
    /// Coefficient planes.
    pub nplanes: usize,
    /// Normal preview mode.
    pub normals: NormalsMode,
    /// Planes per YCbCr channel (`mycc` only).
    pub yccplanes: [usize; 3],
}

impl ProgramSpec {
    /// Spec for a loaded basis.
    #[must_use]
    pub fn from_model(model: &BasisModel, normals: NormalsMode) -> Self {
        Self {
            colorspace: model.colorspace(),
            njpegs: model.njpegs(),
            nplanes: model.nplanes(),
            normals,
            yccplanes: model.yccplanes(),
        }
    }

    /// Whether the colorspace reconstructs from coefficient planes.
    #[must_use]
    pub fn is_relightable(&self) -> bool {
        !matches!(self.colorspace, Colorspace::Img | Colorspace::Dem)
    }

    /// Normals mode actually compiled in; plain images ignore it.
    #[must_use]
    pub fn effective_normals(&self) -> NormalsMode {
        if self.is_relightable() {
            self.normals
        } else {
            NormalsMode::Off
        }
    }

    /// Number of texture bindings.
    #[must_use]
    pub fn texture_count(&self) -> usize {
        if self.is_relightable() {
            self.njpegs.max(1)
        } else {
            1
        }
    }

    /// Short name used as the pipeline label.
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "relight-{}-{}j-{}",
            self.colorspace,
            self.njpegs,
            self.effective_normals()
        )
    }

    fn check(&self) -> Result<(), ShaderError> {
        let invalid = |reason: String| ShaderError::InvalidSpec {
            label: self.label(),
            reason,
        };
        if !self.is_relightable() {
            return Ok(());
        }
        if self.njpegs == 0 {
            return Err(invalid("no component images".into()));
        }
        if self.njpegs * 3 < self.nplanes {
            return Err(invalid(format!(
                "{} images cannot hold {} planes",
                self.njpegs, self.nplanes
            )));
        }
        if self.colorspace == Colorspace::Lrgb && self.njpegs < 2 {
            return Err(invalid("lrgb needs an albedo and a luminance image".into()));
        }
        Ok(())
    }
}

/// A generated and validated program.
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    /// What the program was built for.
    pub spec: ProgramSpec,
    /// WGSL source with `vs_main` and `fs_main`.
    pub source: String,
    /// Uniform block layout of the fragment stage.
    pub layout: UniformLayout,
}

impl ShaderProgram {
    /// Number of texture bindings in group 1.
    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.spec.texture_count()
    }

    /// Pipeline label.
    #[must_use]
    pub fn label(&self) -> String {
        self.spec.label()
    }
}

/// Generate the program for `spec` and validate it.
pub fn build_program(spec: &ProgramSpec) -> Result<ShaderProgram, ShaderError> {
    spec.check()?;
    // Coefficient arrays hold nplanes + 1 entries even when weights are
    // indexed per image, as rgb and ycc do.
    let planes = spec.nplanes.max(spec.njpegs * 3);
    let layout = UniformLayout::new(
        planes,
        spec.colorspace.has_vector_basis(),
        spec.effective_normals().is_enabled(),
    );
    let source = wgsl::generate(spec, &layout);
    let label = spec.label();
    validate_wgsl(&label, &source)?;
    debug!("Generated shader '{}' ({} bytes)", label, source.len());
    Ok(ShaderProgram {
        spec: spec.clone(),
        source,
        layout,
    })
}

/// Parse and validate WGSL with naga.
pub fn validate_wgsl(label: &str, source: &str) -> Result<(), ShaderError> {
    let compile_error = |diagnostic: String| ShaderError::Compile {
        label: label.to_string(),
        wgsl: source.to_string(),
        diagnostic,
    };
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| compile_error(e.emit_to_string(source)))?;
    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| compile_error(e.emit_to_string(source)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLORSPACES: [Colorspace; 7] = [
        Colorspace::Rgb,
        Colorspace::Ycc,
        Colorspace::Mrgb,
        Colorspace::Mycc,
        Colorspace::Lrgb,
        Colorspace::Img,
        Colorspace::Dem,
    ];

    fn spec(colorspace: Colorspace, normals: NormalsMode) -> ProgramSpec {
        let (nplanes, yccplanes): (usize, [usize; 3]) = match colorspace {
            Colorspace::Mycc => (12, [6, 3, 3]),
            Colorspace::Lrgb => (12, [0; 3]),
            Colorspace::Img | Colorspace::Dem => (3, [0; 3]),
            _ => (18, [0; 3]),
        };
        ProgramSpec {
            colorspace,
            njpegs: nplanes.div_ceil(3),
            nplanes,
            normals,
            yccplanes,
        }
    }

    /// Every colorspace in every normals mode must produce a module naga
    /// accepts.
    #[test]
    fn test_every_program_validates() {
        for colorspace in COLORSPACES {
            for normals in NormalsMode::ALL {
                let spec = spec(colorspace, normals);
                if let Err(e) = build_program(&spec) {
                    match e {
                        ShaderError::Compile {
                            wgsl, diagnostic, ..
                        } => panic!("{}:\n{diagnostic}\n{wgsl}", spec.label()),
                        other => panic!("{}: {other}", spec.label()),
                    }
                }
            }
        }
    }

    #[test]
    fn test_single_image_programs_validate() {
        for colorspace in [Colorspace::Rgb, Colorspace::Ycc, Colorspace::Mrgb] {
            let mut spec = spec(colorspace, NormalsMode::Lit);
            spec.njpegs = 1;
            spec.nplanes = 3;
            build_program(&spec).unwrap();
        }
    }

    #[test]
    fn test_texture_bindings_match_images() {
        let program = build_program(&spec(Colorspace::Rgb, NormalsMode::Off)).unwrap();
        assert_eq!(program.texture_count(), 6);
        assert!(program.source.contains("@group(1) @binding(5) var plane_5"));
        assert!(!program.source.contains("plane_6"));
    }

    #[test]
    fn test_images_ignore_normals() {
        let program = build_program(&spec(Colorspace::Img, NormalsMode::Lit)).unwrap();
        assert_eq!(program.spec.effective_normals(), NormalsMode::Off);
        assert!(program.layout.calibration.is_none());
        assert!(!program.source.contains("normalize"));
    }

    #[test]
    fn test_normals_add_calibration_arrays() {
        let program = build_program(&spec(Colorspace::Mrgb, NormalsMode::Tangent)).unwrap();
        assert!(program.layout.calibration.is_some());
        assert!(program.source.contains("base2: array<vec4<f32>, 19>"));
    }

    #[test]
    fn test_broken_source_reports_diagnostic() {
        let err = validate_wgsl("broken", "fn main( {").unwrap_err();
        match err {
            ShaderError::Compile {
                label,
                wgsl,
                diagnostic,
            } => {
                assert_eq!(label, "broken");
                assert_eq!(wgsl, "fn main( {");
                assert!(!diagnostic.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_lrgb_needs_two_images() {
        let mut spec = spec(Colorspace::Lrgb, NormalsMode::Off);
        spec.njpegs = 1;
        spec.nplanes = 3;
        assert!(matches!(
            build_program(&spec),
            Err(ShaderError::InvalidSpec { .. })
        ));
    }
}
