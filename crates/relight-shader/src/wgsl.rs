//! WGSL text generation.

use std::fmt::Write as _;

use relight_basis::Colorspace;

use crate::layout::{ArrayLayout, UniformLayout};
use crate::normals::NormalsMode;
use crate::program::ProgramSpec;

const VERTEX_STAGE: &str = r"struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) texcoord: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(v: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip = vec4<f32>(v.position, 1.0);
    out.uv = v.texcoord;
    return out;
}
";

/// Dequantization of one component image into three coefficients.
const DECODE: &str = r"fn scale_at(i: u32) -> f32 {
    return u.scale[i / 4u][i % 4u];
}

fn bias_at(i: u32) -> f32 {
    return u.bias[i / 4u][i % 4u];
}

fn decode(c: vec4<f32>, j: u32) -> vec3<f32> {
    let k = j * 3u + 1u;
    let bias = vec3<f32>(bias_at(k), bias_at(k + 1u), bias_at(k + 2u));
    let scale = vec3<f32>(scale_at(k), scale_at(k + 1u), scale_at(k + 2u));
    return (c.xyz - bias) * scale;
}
";

const YCC_TO_RGB: &str = r"fn ycc_to_rgb(ycc: vec3<f32>) -> vec3<f32> {
    let cb = ycc.y - 0.5;
    let cr = ycc.z - 0.5;
    return vec3<f32>(
        ycc.x + 1.402 * cr,
        ycc.x - 0.344136 * cb - 0.714136 * cr,
        ycc.x + 1.772 * cb,
    );
}
";

const MYCC_TO_RGB: &str = r"fn mycc_to_rgb(ycc: vec3<f32>) -> vec3<f32> {
    let tmp = ycc.x - ycc.z / 2.0;
    let g = ycc.z + tmp;
    let b = tmp - ycc.y / 2.0;
    return vec3<f32>(b + ycc.y, g, b);
}
";

/// Transposed three-light normal reconstruction matrix.
const NORMAL_MATRIX: &str = "mat3x3<f32>(\
8.1650e-01, 4.7140e-01, 4.7140e-01, \
-8.1650e-01, 4.7140e-01, 4.7140e-01, \
-1.6222e-08, -9.4281e-01, 4.7140e-01)";

const CALIBRATION: [&str; 3] = ["base0", "base1", "base2"];

/// Full module source for `spec`.
pub(crate) fn generate(spec: &ProgramSpec, layout: &UniformLayout) -> String {
    let mut src = String::with_capacity(4096);
    src.push_str(VERTEX_STAGE);
    src.push('\n');
    uniforms(&mut src, layout);
    bindings(&mut src, spec.texture_count());

    if spec.is_relightable() {
        src.push_str(DECODE);
        src.push('\n');
        accessor(&mut src, "base", &layout.base);
        if let Some(arrays) = &layout.calibration {
            for (name, array) in CALIBRATION.iter().zip(arrays) {
                accessor(&mut src, name, array);
            }
        }
    }
    match spec.colorspace {
        Colorspace::Ycc => {
            src.push_str(YCC_TO_RGB);
            src.push('\n');
        }
        Colorspace::Mycc => {
            src.push_str(MYCC_TO_RGB);
            src.push('\n');
        }
        _ => {}
    }

    src.push_str("@fragment\nfn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {\n");
    samples(&mut src, spec);
    body(&mut src, spec);
    tail(&mut src, spec.effective_normals());
    src.push_str("    return vec4<f32>(color, u.light.w);\n}\n");
    src
}

fn uniforms(src: &mut String, layout: &UniformLayout) {
    src.push_str("struct Uniforms {\n    light: vec4<f32>,\n");
    let _ = writeln!(src, "    base: array<vec4<f32>, {}>,", layout.base.slots());
    if let Some(arrays) = &layout.calibration {
        for (name, array) in CALIBRATION.iter().zip(arrays) {
            let _ = writeln!(src, "    {name}: array<vec4<f32>, {}>,", array.slots());
        }
    }
    let _ = writeln!(src, "    scale: array<vec4<f32>, {}>,", layout.scale.slots());
    let _ = writeln!(src, "    bias: array<vec4<f32>, {}>,", layout.bias.slots());
    src.push_str("};\n\n@group(0) @binding(0) var<uniform> u: Uniforms;\n");
    src.push_str("@group(0) @binding(1) var plane_sampler: sampler;\n");
}

fn bindings(src: &mut String, textures: usize) {
    for j in 0..textures {
        let _ = writeln!(src, "@group(1) @binding({j}) var plane_{j}: texture_2d<f32>;");
    }
    src.push('\n');
}

fn accessor(src: &mut String, name: &str, array: &ArrayLayout) {
    if array.vector {
        let _ = writeln!(
            src,
            "fn {name}_at(i: u32) -> vec3<f32> {{\n    return u.{name}[i].xyz;\n}}\n"
        );
    } else {
        let _ = writeln!(
            src,
            "fn {name}_at(i: u32) -> f32 {{\n    return u.{name}[i / 4u][i % 4u];\n}}\n"
        );
    }
}

/// Sample every component image up front, outside any branch.
fn samples(src: &mut String, spec: &ProgramSpec) {
    for j in 0..spec.texture_count() {
        let _ = writeln!(
            src,
            "    let c{j} = textureSample(plane_{j}, plane_sampler, input.uv);"
        );
    }
    if spec.is_relightable() {
        let first = usize::from(spec.colorspace == Colorspace::Lrgb);
        for j in first..spec.njpegs {
            let _ = writeln!(src, "    let r{j} = decode(c{j}, {j}u);");
        }
    }
}

fn body(src: &mut String, spec: &ProgramSpec) {
    let nj = spec.njpegs;
    let normals = spec.effective_normals().is_enabled();
    match (spec.colorspace, normals) {
        (Colorspace::Img | Colorspace::Dem, _) => {
            src.push_str("    let color = c0.xyz;\n");
        }
        (Colorspace::Rgb, false) => {
            src.push_str("    var color = vec3<f32>(0.0);\n");
            for j in 0..nj {
                let _ = writeln!(src, "    color += base_at({j}u) * r{j};");
            }
        }
        (Colorspace::Rgb, true) => {
            src.push_str("    var color = vec3<f32>(0.0);\n");
            for j in 0..nj {
                let _ = writeln!(
                    src,
                    "    color += {} * (r{j}.x + r{j}.y + r{j}.z);",
                    calibration_triple(j)
                );
            }
        }
        (Colorspace::Ycc, false) => {
            src.push_str("    var ycc = vec3<f32>(0.0, r0.y, r0.z);\n");
            for j in 0..nj {
                let _ = writeln!(src, "    ycc.x += base_at({j}u) * r{j}.x;");
            }
            src.push_str("    var color = ycc_to_rgb(ycc);\n");
        }
        (Colorspace::Ycc, true) => {
            src.push_str("    var color = vec3<f32>(0.0);\n");
            for j in 0..nj {
                let _ = writeln!(src, "    color += {} * r{j}.x;", calibration_triple(j));
            }
        }
        (Colorspace::Mrgb, false) => {
            src.push_str("    var color = base_at(0u);\n");
            for j in 0..nj {
                let k = 3 * j;
                let _ = writeln!(
                    src,
                    "    color += base_at({}u) * r{j}.x + base_at({}u) * r{j}.y + base_at({}u) * r{j}.z;",
                    k + 1,
                    k + 2,
                    k + 3
                );
            }
        }
        (Colorspace::Mrgb, true) => {
            src.push_str("    let one = vec3<f32>(1.0);\n");
            src.push_str(
                "    var color = vec3<f32>(dot(base0_at(0u), one), dot(base1_at(0u), one), dot(base2_at(0u), one));\n",
            );
            for j in 0..nj {
                let k = 3 * j;
                for (n, name) in CALIBRATION.iter().enumerate() {
                    let _ = writeln!(
                        src,
                        "    let b{n}_{j} = vec3<f32>(dot({name}_at({}u), one), dot({name}_at({}u), one), dot({name}_at({}u), one));",
                        k + 1,
                        k + 2,
                        k + 3
                    );
                }
                let _ = writeln!(
                    src,
                    "    color += vec3<f32>(dot(b0_{j}, r{j}), dot(b1_{j}, r{j}), dot(b2_{j}, r{j}));"
                );
            }
        }
        (Colorspace::Mycc, false) => {
            src.push_str("    var ycc = base_at(0u);\n");
            for j in 0..nj {
                let k = 3 * j;
                if j < spec.yccplanes[1] {
                    let _ = writeln!(src, "    ycc.x += base_at({}u).x * r{j}.x;", k + 1);
                    let _ = writeln!(src, "    ycc.y += base_at({}u).y * r{j}.y;", k + 2);
                    let _ = writeln!(src, "    ycc.z += base_at({}u).z * r{j}.z;", k + 3);
                } else {
                    let _ = writeln!(
                        src,
                        "    ycc.x += base_at({}u).x * r{j}.x + base_at({}u).x * r{j}.y + base_at({}u).x * r{j}.z;",
                        k + 1,
                        k + 2,
                        k + 3
                    );
                }
            }
            src.push_str("    var color = mycc_to_rgb(ycc);\n");
        }
        (Colorspace::Mycc, true) => {
            src.push_str(
                "    var color = vec3<f32>(base0_at(0u).x, base1_at(0u).x, base2_at(0u).x);\n",
            );
            for j in 0..nj {
                let k = 3 * j;
                for (axis, name) in ["x", "y", "z"].iter().zip(CALIBRATION) {
                    if j < spec.yccplanes[1] {
                        let _ = writeln!(
                            src,
                            "    color.{axis} += {name}_at({}u).x * r{j}.x;",
                            k + 1
                        );
                    } else {
                        let _ = writeln!(
                            src,
                            "    color.{axis} += {name}_at({}u).x * r{j}.x + {name}_at({}u).x * r{j}.y + {name}_at({}u).x * r{j}.z;",
                            k + 1,
                            k + 2,
                            k + 3
                        );
                    }
                }
            }
        }
        (Colorspace::Lrgb, false) => {
            src.push_str("    var l = 0.0;\n");
            for j in 1..nj {
                let k = 3 * j;
                let _ = writeln!(
                    src,
                    "    l += base_at({}u) * r{j}.x + base_at({}u) * r{j}.y + base_at({}u) * r{j}.z;",
                    k - 3,
                    k - 2,
                    k - 1
                );
            }
            src.push_str("    var color = c0.xyz * l;\n");
        }
        (Colorspace::Lrgb, true) => {
            src.push_str("    var color = vec3<f32>(0.0);\n");
            for j in 1..nj {
                let k = 3 * j;
                for (axis, name) in ["x", "y", "z"].iter().zip(CALIBRATION) {
                    let _ = writeln!(
                        src,
                        "    color.{axis} += {name}_at({}u) * r{j}.x + {name}_at({}u) * r{j}.y + {name}_at({}u) * r{j}.z;",
                        k - 3,
                        k - 2,
                        k - 1
                    );
                }
            }
        }
    }
}

/// `vec3(base0[j], base1[j], base2[j])` for scalar calibration bases.
fn calibration_triple(j: usize) -> String {
    format!("vec3<f32>(base0_at({j}u), base1_at({j}u), base2_at({j}u))")
}

fn tail(src: &mut String, normals: NormalsMode) {
    match normals {
        NormalsMode::Off => {}
        NormalsMode::Tangent => {
            let _ = writeln!(src, "    let t = {NORMAL_MATRIX};");
            src.push_str("    color = (normalize(t * color) + vec3<f32>(1.0)) * 0.5;\n");
        }
        NormalsMode::Lit => {
            let _ = writeln!(src, "    let t = {NORMAL_MATRIX};");
            src.push_str("    let grey = dot(u.light.xyz, normalize(t * color));\n");
            src.push_str("    color = vec3<f32>(grey);\n");
        }
    }
}
