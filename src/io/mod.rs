//! Scene file I/O.
//!
//! Splat scenes are read from binary little-endian PLY files as written by
//! common Gaussian splatting trainers.

mod ply;

pub use ply::{
    load_ply, load_ply_from_reader, load_ply_from_reader_limited, load_ply_limited, read_header,
    save_ply, write_ply, LoadError, PlyHeader, PlyLayout,
};
