//! # splat-align: COLMAP + gaussian-splat ingest and alignment
//!
//! This crate loads the two file formats produced by a typical
//! photogrammetry-to-splatting pipeline and overlays the results:
//!
//! - COLMAP sparse reconstructions (`cameras.bin`, `images.bin`,
//!   `points3D.bin`) with camera intrinsics, posed images and sparse
//!   3D points
//! - Gaussian-splat PLY files with arbitrary per-vertex properties
//!   (spherical-harmonic color, scale, rotation, opacity, ...)
//!
//! Both are converted into the Blender coordinate convention
//! (x right, y forward, z up), and the alignment engine computes the
//! translation + uniform scale that best places the splat cloud over
//! the sparse reconstruction.
//!
//! ## Architecture
//!
//! - `core`: pure data structures and math (intrinsics, quaternions,
//!   coordinate transforms), no I/O
//! - `io`: file format parsing (COLMAP binary, splat PLY) and the
//!   shared error taxonomy
//! - `align`: point-cloud alignment (centroid + bounding-extent fit)
//!
//! Scene-graph construction, rendering and any editor integration are
//! external consumers of the pose/point/intrinsics data produced here.

// Core data structures and math
pub mod core;

// I/O operations (COLMAP, splat PLY)
pub mod io;

// Point-cloud alignment
pub mod align;

// Re-export commonly used types at crate root for convenience
pub use crate::core::{pose_to_placement, CameraIntrinsics, Placement, PoseSort};
pub use align::{align_clouds, AlignConfig, Alignment};
pub use io::{load_reconstruction, load_splat_ply, LoadError, Reconstruction, SplatCloud};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
