//! I/O operations for loading reconstruction and splat data.
//!
//! This module handles all file format parsing:
//! - COLMAP binary format (cameras.bin, images.bin, points3D.bin)
//! - Splat PLY format (self-describing per-vertex properties)

use std::path::PathBuf;
use thiserror::Error;

pub mod colmap;
pub mod ply;

// Re-export public types and functions
pub use colmap::{
    find_model_dir, load_reconstruction, read_cameras_bin, read_images_bin, read_points3d_bin,
    Camera, FileRead, Image, Point3D, ReadStatus, Reconstruction,
};
pub use ply::{load_splat_ply, save_points_ply, ColorStrategy, PlyOptions, SplatCloud};

/// Errors that can occur when loading reconstruction or splat data.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file not found: {0}")]
    NotFound(PathBuf),

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("truncated data in {path}: {context}")]
    Truncated { path: PathBuf, context: String },
}
