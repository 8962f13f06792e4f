//! Binary PLY loading and saving for Gaussian splat scenes.
//!
//! Two vertex layouts are recognized, both little-endian `float` only:
//!
//! - [`PlyLayout::Inria`]: the 62-property layout written by the reference
//!   trainer (`x y z nx ny nz f_dc_* f_rest_* opacity scale_* rot_*`).
//! - [`PlyLayout::Compact`]: 59 properties without normals
//!   (`x y z scale_* opacity rot_* f_dc_* f_rest_*`).
//!
//! `f_rest_*` is stored channel-major (15 coefficients of R, then G, then
//! B); it is re-laid-out to `sh[coeff][channel]` on load.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use nalgebra::Vector3;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::{math::inverse_sigmoid, Gaussian, PrimitiveStore};

/// Errors that can occur when loading a scene.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not find end of header")]
    MissingHeaderEnd,

    #[error("Invalid PLY header: {0}")]
    InvalidHeader(String),

    #[error("Unsupported PLY format: {0}")]
    UnsupportedFormat(String),

    #[error("Unknown vertex layout with {0} properties")]
    UnknownLayout(usize),

    #[error("Truncated vertex data: expected {expected} vertices, read {read}")]
    Truncated { expected: usize, read: usize },
}

const REST_COEFFS: usize = 15;

/// Upper bound on the records reserved up front from the header count.
const MAX_PREALLOCATED_VERTICES: usize = 1 << 20;

/// Vertex property layout of a splat PLY file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlyLayout {
    Inria,
    Compact,
}

impl PlyLayout {
    /// Property names in file order.
    pub fn property_names(self) -> Vec<String> {
        let xyz = ["x", "y", "z"].map(String::from);
        let normals = ["nx", "ny", "nz"].map(String::from);
        let dc = (0..3).map(|i| format!("f_dc_{i}"));
        let rest = (0..3 * REST_COEFFS).map(|i| format!("f_rest_{i}"));
        let scale = (0..3).map(|i| format!("scale_{i}"));
        let rot = (0..4).map(|i| format!("rot_{i}"));
        let opacity = std::iter::once("opacity".to_string());

        match self {
            PlyLayout::Inria => xyz
                .into_iter()
                .chain(normals)
                .chain(dc)
                .chain(rest)
                .chain(opacity)
                .chain(scale)
                .chain(rot)
                .collect(),
            PlyLayout::Compact => xyz
                .into_iter()
                .chain(scale)
                .chain(opacity)
                .chain(rot)
                .chain(dc)
                .chain(rest)
                .collect(),
        }
    }

    /// Match a property sequence exactly against the known layouts.
    pub fn detect(names: &[String]) -> Result<Self, LoadError> {
        [PlyLayout::Inria, PlyLayout::Compact]
            .into_iter()
            .find(|layout| layout.property_names() == names)
            .ok_or(LoadError::UnknownLayout(names.len()))
    }

    pub fn floats_per_vertex(self) -> usize {
        match self {
            PlyLayout::Inria => 62,
            PlyLayout::Compact => 59,
        }
    }

    /// Offsets of each field within one record.
    fn offsets(self) -> RecordOffsets {
        match self {
            PlyLayout::Inria => RecordOffsets {
                position: 0,
                sh: 6,
                opacity: 54,
                scale: 55,
                rotation: 58,
            },
            PlyLayout::Compact => RecordOffsets {
                position: 0,
                scale: 3,
                opacity: 6,
                rotation: 7,
                sh: 11,
            },
        }
    }
}

struct RecordOffsets {
    position: usize,
    scale: usize,
    opacity: usize,
    rotation: usize,
    /// f_dc followed by f_rest.
    sh: usize,
}

/// Parsed header.
#[derive(Clone, Debug)]
pub struct PlyHeader {
    pub vertex_count: usize,
    pub layout: PlyLayout,
}

/// Read the ASCII header, leaving the reader at the first body byte.
pub fn read_header<R: BufRead>(reader: &mut R) -> Result<PlyHeader, LoadError> {
    let mut line = Vec::new();
    let mut first = true;
    let mut vertex_count: Option<usize> = None;
    let mut in_vertex = false;
    let mut names = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Err(LoadError::MissingHeaderEnd);
        }
        let text = String::from_utf8_lossy(&line);
        let mut tokens = text.split_whitespace();
        let Some(keyword) = tokens.next() else {
            continue;
        };

        if first {
            if keyword != "ply" {
                return Err(LoadError::InvalidHeader("missing 'ply' magic".into()));
            }
            first = false;
            continue;
        }

        match keyword {
            "format" => {
                let format = tokens.next().unwrap_or_default();
                if format != "binary_little_endian" {
                    return Err(LoadError::UnsupportedFormat(format.to_string()));
                }
            }
            "element" => {
                let name = tokens.next().unwrap_or_default();
                in_vertex = name == "vertex";
                if in_vertex {
                    let count = tokens
                        .next()
                        .and_then(|c| c.parse().ok())
                        .ok_or_else(|| {
                            LoadError::InvalidHeader(format!("bad vertex count: {}", text.trim()))
                        })?;
                    vertex_count = Some(count);
                }
            }
            "property" if in_vertex => {
                let ty = tokens.next().unwrap_or_default();
                let name = tokens.next().unwrap_or_default();
                if ty != "float" && ty != "float32" {
                    return Err(LoadError::UnsupportedFormat(format!(
                        "vertex property '{name}' has type '{ty}'"
                    )));
                }
                names.push(name.to_string());
            }
            "end_header" => break,
            // comment, obj_info, properties of other elements
            _ => {}
        }
    }

    let vertex_count =
        vertex_count.ok_or_else(|| LoadError::InvalidHeader("no vertex element".into()))?;
    let layout = PlyLayout::detect(&names)?;
    debug!(vertex_count, ?layout, "parsed PLY header");

    Ok(PlyHeader {
        vertex_count,
        layout,
    })
}

fn decode_record(layout: PlyLayout, r: &[f32]) -> Gaussian {
    let o = layout.offsets();
    let position = Vector3::new(r[o.position], r[o.position + 1], r[o.position + 2]);
    let log_scale = Vector3::new(r[o.scale], r[o.scale + 1], r[o.scale + 2]);
    let rot = [r[o.rotation], r[o.rotation + 1], r[o.rotation + 2], r[o.rotation + 3]];

    let mut sh = [[0.0f32; 3]; 16];
    sh[0] = [r[o.sh], r[o.sh + 1], r[o.sh + 2]];
    let rest = &r[o.sh + 3..o.sh + 3 + 3 * REST_COEFFS];
    for j in 1..16 {
        for c in 0..3 {
            sh[j][c] = rest[c * REST_COEFFS + (j - 1)];
        }
    }

    Gaussian::from_raw(position, log_scale, rot, r[o.opacity], sh)
}

/// Load a scene from any buffered reader.
pub fn load_ply_from_reader<R: BufRead>(reader: R) -> Result<PrimitiveStore, LoadError> {
    load_ply_from_reader_limited(reader, usize::MAX)
}

/// Load at most `max_vertices` records from a reader.
pub fn load_ply_from_reader_limited<R: BufRead>(
    mut reader: R,
    max_vertices: usize,
) -> Result<PrimitiveStore, LoadError> {
    let header = read_header(&mut reader)?;
    let count = header.vertex_count.min(max_vertices);
    let mut record = vec![0.0f32; header.layout.floats_per_vertex()];
    // The header count is untrusted; grow past this as records arrive.
    let mut gaussians = Vec::with_capacity(count.min(MAX_PREALLOCATED_VERTICES));

    for read in 0..count {
        match reader.read_f32_into::<LittleEndian>(&mut record) {
            Ok(()) => gaussians.push(decode_record(header.layout, &record)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(LoadError::Truncated {
                    expected: header.vertex_count,
                    read,
                });
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(PrimitiveStore::from_gaussians(gaussians))
}

/// Load a Gaussian splat scene from a binary PLY file.
pub fn load_ply(path: &Path) -> Result<PrimitiveStore, LoadError> {
    load_ply_limited(path, usize::MAX)
}

/// Load only the first `max_vertices` splats of a file. Handy for
/// debugging a scene one splat at a time.
pub fn load_ply_limited(path: &Path, max_vertices: usize) -> Result<PrimitiveStore, LoadError> {
    let file = File::open(path)?;
    let store = load_ply_from_reader_limited(BufReader::new(file), max_vertices)?;
    info!(path = %path.display(), splats = store.len(), "loaded scene");
    Ok(store)
}

/// Write a scene in the [`PlyLayout::Inria`] layout.
///
/// Parameters are written back in raw form (log scale, logit opacity).
pub fn write_ply<W: Write>(store: &PrimitiveStore, mut writer: W) -> Result<(), LoadError> {
    writeln!(writer, "ply")?;
    writeln!(writer, "format binary_little_endian 1.0")?;
    writeln!(writer, "element vertex {}", store.len())?;
    for name in PlyLayout::Inria.property_names() {
        writeln!(writer, "property float {name}")?;
    }
    writeln!(writer, "end_header")?;

    for g in store.as_slice() {
        let mut record = Vec::with_capacity(PlyLayout::Inria.floats_per_vertex());
        record.extend_from_slice(g.position.as_slice());
        record.extend_from_slice(&[0.0; 3]);
        record.extend_from_slice(&g.sh_coeffs[0]);
        for c in 0..3 {
            record.extend((1..16).map(|j| g.sh_coeffs[j][c]));
        }
        record.push(inverse_sigmoid(g.opacity));
        record.extend(g.scale.iter().map(|s| s.ln()));
        let q = g.rotation.quaternion();
        record.extend_from_slice(&[q.w, q.i, q.j, q.k]);

        for v in record {
            writer.write_f32::<LittleEndian>(v)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Save a scene to a binary PLY file.
pub fn save_ply(store: &PrimitiveStore, path: &Path) -> Result<(), LoadError> {
    let file = File::create(path)?;
    write_ply(store, BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_sizes_match_names() {
        assert_eq!(PlyLayout::Inria.property_names().len(), 62);
        assert_eq!(PlyLayout::Compact.property_names().len(), 59);
    }

    #[test]
    fn test_offsets_point_at_named_properties() {
        for layout in [PlyLayout::Inria, PlyLayout::Compact] {
            let names = layout.property_names();
            let o = layout.offsets();
            assert_eq!(names[o.position], "x");
            assert_eq!(names[o.scale], "scale_0");
            assert_eq!(names[o.opacity], "opacity");
            assert_eq!(names[o.rotation], "rot_0");
            assert_eq!(names[o.sh], "f_dc_0");
            assert_eq!(names[o.sh + 3], "f_rest_0");
        }
    }

    #[test]
    fn test_detect_rejects_unknown() {
        let names: Vec<String> = ["x", "y", "z"].iter().map(|s| s.to_string()).collect();
        assert!(matches!(
            PlyLayout::detect(&names),
            Err(LoadError::UnknownLayout(3))
        ));
    }
}
