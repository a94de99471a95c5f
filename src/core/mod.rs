//! Core data structures and mathematical operations.
//!
//! This module contains the fundamental types used throughout the crate:
//! - `CameraIntrinsics`: pinhole intrinsics derived from a reconstruction
//! - Math utilities: quaternions, activations, median
//! - Coordinate transforms: COLMAP ↔ Blender conventions
//!
//! All types here are "pure data" - no I/O, no rendering logic.

mod camera;
mod math;
mod transform;

// Re-export public types
pub use camera::{CameraIntrinsics, CameraModelKind};
pub use math::{median, quaternion_to_matrix, sigmoid};
pub use transform::{
    colmap_to_blender, pose_to_placement, remap_points, Placement, PoseSort, PosedPlacement,
};
