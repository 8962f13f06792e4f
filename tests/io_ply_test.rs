//! PLY I/O tests
//!
//! Scenes are written with `write_ply` (or assembled by hand for the compact
//! layout) into memory and read back through the public loaders.

use approx::assert_relative_eq;
use byteorder::{LittleEndian, WriteBytesExt};
use nalgebra::{UnitQuaternion, Vector3};
use splat_rs::core::{Gaussian, PrimitiveStore};
use splat_rs::io::{
    load_ply, load_ply_from_reader, load_ply_from_reader_limited, read_header, save_ply,
    write_ply, LoadError, PlyLayout,
};
use std::io::Cursor;

fn sample_store() -> PrimitiveStore {
    let mut sh = [[0.0f32; 3]; 16];
    sh[0] = [0.5, -0.25, 1.0];
    sh[3] = [0.1, 0.2, 0.3];
    sh[15] = [-0.4, 0.0, 0.7];

    let a = Gaussian::new(
        Vector3::new(1.0, 2.0, 3.0),
        Vector3::new(0.5, 0.25, 2.0),
        UnitQuaternion::from_euler_angles(0.3, -0.2, 0.9),
        0.75,
        sh,
    );
    let b = Gaussian::new(
        Vector3::new(-1.0, 0.0, 4.5),
        Vector3::new(0.1, 0.1, 0.1),
        UnitQuaternion::identity(),
        0.2,
        [[0.0; 3]; 16],
    );
    PrimitiveStore::from_gaussians(vec![a, b])
}

fn encode(store: &PrimitiveStore) -> Vec<u8> {
    let mut bytes = Vec::new();
    write_ply(store, &mut bytes).expect("write_ply failed");
    bytes
}

fn assert_same_gaussian(a: &Gaussian, b: &Gaussian) {
    for i in 0..3 {
        assert_relative_eq!(a.position[i], b.position[i], epsilon = 1e-6);
        assert_relative_eq!(a.scale[i], b.scale[i], epsilon = 1e-5);
    }
    assert_relative_eq!(a.opacity, b.opacity, epsilon = 1e-5);
    assert!(a.rotation.angle_to(&b.rotation) < 1e-3);
    for j in 0..16 {
        for c in 0..3 {
            assert_relative_eq!(a.sh_coeffs[j][c], b.sh_coeffs[j][c], epsilon = 1e-6);
        }
    }
    for (x, y) in a.covariance().iter().zip(b.covariance()) {
        assert_relative_eq!(*x, *y, epsilon = 1e-4);
    }
}

/// Header for the 59-property compact layout.
fn compact_header(count: usize) -> Vec<u8> {
    let mut header = format!("ply\nformat binary_little_endian 1.0\nelement vertex {count}\n");
    for name in PlyLayout::Compact.property_names() {
        header.push_str(&format!("property float {name}\n"));
    }
    header.push_str("end_header\n");
    header.into_bytes()
}

#[test]
fn test_write_then_load_preserves_splats() {
    let store = sample_store();
    let loaded = load_ply_from_reader(Cursor::new(encode(&store))).expect("load failed");

    assert_eq!(loaded.len(), store.len());
    for (a, b) in store.as_slice().iter().zip(loaded.as_slice()) {
        assert_same_gaussian(a, b);
    }
}

#[test]
fn test_save_and_load_file() {
    let path = std::env::temp_dir().join(format!("splat_rs_io_test_{}.ply", std::process::id()));
    let store = sample_store();
    save_ply(&store, &path).expect("save failed");

    let loaded = load_ply(&path).expect("load failed");
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.len(), 2);
    assert_same_gaussian(&store.as_slice()[0], &loaded.as_slice()[0]);
}

#[test]
fn test_written_header_uses_inria_layout() {
    let bytes = encode(&sample_store());
    let header = read_header(&mut Cursor::new(bytes)).expect("header");
    assert_eq!(header.vertex_count, 2);
    assert_eq!(header.layout, PlyLayout::Inria);
}

#[test]
fn test_limited_load_reads_prefix() {
    let bytes = encode(&sample_store());
    let loaded = load_ply_from_reader_limited(Cursor::new(bytes), 1).expect("load failed");
    assert_eq!(loaded.len(), 1);
    assert_relative_eq!(loaded.as_slice()[0].position.x, 1.0);
}

#[test]
fn test_empty_scene_loads() {
    let bytes = encode(&PrimitiveStore::new());
    let loaded = load_ply_from_reader(Cursor::new(bytes)).expect("load failed");
    assert!(loaded.is_empty());
}

#[test]
fn test_compact_layout_is_activated_and_reordered() {
    let mut bytes = compact_header(1);
    let mut record = Vec::new();
    record.extend_from_slice(&[1.0, -2.0, 3.0]); // x y z
    record.extend_from_slice(&[0.0, 0.0, -1.0]); // scale_*, log space
    record.push(0.0); // opacity logit
    record.extend_from_slice(&[2.0, 0.0, 0.0, 0.0]); // rot, unnormalized
    record.extend_from_slice(&[0.1, 0.2, 0.3]); // f_dc
    // f_rest: channel-major, value encodes (channel, coeff)
    for c in 0..3 {
        for k in 0..15 {
            record.push(c as f32 * 100.0 + k as f32);
        }
    }
    assert_eq!(record.len(), PlyLayout::Compact.floats_per_vertex());
    for v in record {
        bytes.write_f32::<LittleEndian>(v).unwrap();
    }

    let store = load_ply_from_reader(Cursor::new(bytes)).expect("load failed");
    let g = &store.as_slice()[0];

    assert_relative_eq!(g.position.y, -2.0);
    assert_relative_eq!(g.scale.x, 1.0, epsilon = 1e-6);
    assert_relative_eq!(g.scale.z, (-1.0f32).exp(), epsilon = 1e-6);
    assert_relative_eq!(g.opacity, 0.5, epsilon = 1e-6);
    assert_relative_eq!(g.rotation.quaternion().w, 1.0, epsilon = 1e-6);
    assert_eq!(g.sh_coeffs[0], [0.1, 0.2, 0.3]);
    // sh[1 + k][c] = rest[c * 15 + k]
    assert_eq!(g.sh_coeffs[1], [0.0, 100.0, 200.0]);
    assert_eq!(g.sh_coeffs[15], [14.0, 114.0, 214.0]);
}

#[test]
fn test_truncated_body() {
    let mut bytes = encode(&sample_store());
    // Drop half of the last record.
    bytes.truncate(bytes.len() - 4 * 31);

    match load_ply_from_reader(Cursor::new(bytes)) {
        Err(LoadError::Truncated { expected, read }) => {
            assert_eq!(expected, 2);
            assert_eq!(read, 1);
        }
        other => panic!("expected Truncated, got {other:?}"),
    }
}

#[test]
fn test_huge_vertex_count_without_body_is_truncated() {
    // A forged count must fail on the missing data, not on allocation.
    let bytes = compact_header(usize::MAX >> 2);
    match load_ply_from_reader(Cursor::new(bytes)) {
        Err(LoadError::Truncated { expected, read }) => {
            assert_eq!(expected, usize::MAX >> 2);
            assert_eq!(read, 0);
        }
        other => panic!("expected Truncated, got {other:?}"),
    }
}

#[test]
fn test_missing_end_header() {
    let bytes = b"ply\nformat binary_little_endian 1.0\nelement vertex 0\n".to_vec();
    assert!(matches!(
        load_ply_from_reader(Cursor::new(bytes)),
        Err(LoadError::MissingHeaderEnd)
    ));
}

#[test]
fn test_ascii_format_rejected() {
    let bytes = b"ply\nformat ascii 1.0\nelement vertex 0\nend_header\n".to_vec();
    match load_ply_from_reader(Cursor::new(bytes)) {
        Err(LoadError::UnsupportedFormat(format)) => assert_eq!(format, "ascii"),
        other => panic!("expected UnsupportedFormat, got {other:?}"),
    }
}

#[test]
fn test_non_float_property_rejected() {
    let bytes = b"ply\nformat binary_little_endian 1.0\nelement vertex 1\n\
                  property double x\nend_header\n"
        .to_vec();
    assert!(matches!(
        load_ply_from_reader(Cursor::new(bytes)),
        Err(LoadError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_unknown_layout_rejected() {
    let bytes = b"ply\nformat binary_little_endian 1.0\nelement vertex 1\n\
                  property float x\nproperty float y\nproperty float z\n\
                  property uchar red\nend_header\n"
        .to_vec();
    // uchar fails the float check before layout detection.
    assert!(load_ply_from_reader(Cursor::new(bytes)).is_err());

    let bytes = b"ply\nformat binary_little_endian 1.0\nelement vertex 1\n\
                  property float x\nproperty float y\nproperty float z\nend_header\n"
        .to_vec();
    assert!(matches!(
        load_ply_from_reader(Cursor::new(bytes)),
        Err(LoadError::UnknownLayout(3))
    ));
}

#[test]
fn test_missing_magic_rejected() {
    let bytes = b"obj\nend_header\n".to_vec();
    assert!(matches!(
        load_ply_from_reader(Cursor::new(bytes)),
        Err(LoadError::InvalidHeader(_))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let path = std::env::temp_dir().join("splat_rs_definitely_missing.ply");
    assert!(matches!(load_ply(&path), Err(LoadError::Io(_))));
}
