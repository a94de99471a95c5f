//! Coordinate-convention conversion between COLMAP and Blender.
//!
//! COLMAP stores camera poses as world-to-camera transforms in a
//! x-right / y-down / z-forward frame. Blender expects camera-to-world
//! placements in a x-right / y-forward / z-up frame. Both conversions
//! are pure functions of their inputs.

use crate::core::math::quaternion_to_matrix;
use nalgebra::{Matrix3, Quaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Fixed axis remap from COLMAP to Blender coordinates:
/// (x, y, z) → (x, -z, y).
pub fn colmap_to_blender() -> Matrix3<f32> {
    Matrix3::new(
        1.0, 0.0, 0.0, //
        0.0, 0.0, -1.0, //
        0.0, 1.0, 0.0,
    )
}

/// A camera placement in the Blender convention: camera-to-world
/// rotation plus world-space position. Immutable value type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub rotation: Matrix3<f32>,
    pub translation: Vector3<f32>,
}

/// A named placement, ready for scene construction downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosedPlacement {
    pub name: String,
    pub rotation: Matrix3<f32>,
    pub translation: Vector3<f32>,
}

/// Ordering for pose lists handed to downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PoseSort {
    /// Sort by numeric image id (capture order in most datasets).
    #[default]
    ById,
    /// Sort by image file name.
    ByName,
}

/// Convert a COLMAP camera pose (world-to-camera) to a Blender camera
/// placement (camera-to-world).
///
/// COLMAP stores [R | t] mapping world to camera: x_cam = R x_world + t.
/// The camera-to-world transform is R_c2w = Rᵀ, t_c2w = -Rᵀ t; both are
/// then rotated into the Blender frame by the fixed axis remap.
pub fn pose_to_placement(qvec: &Quaternion<f32>, tvec: &Vector3<f32>) -> Placement {
    let r = quaternion_to_matrix(qvec);

    let r_c2w = r.transpose();
    let t_c2w = -r_c2w * tvec;

    let remap = colmap_to_blender();
    Placement {
        rotation: remap * r_c2w,
        translation: remap * t_c2w,
    }
}

/// Apply the fixed COLMAP→Blender axis remap to every point of a cloud.
pub fn remap_points(points: &[Vector3<f32>]) -> Vec<Vector3<f32>> {
    let remap = colmap_to_blender();
    points.iter().map(|p| remap * p).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_remap_is_rotation() {
        let m = colmap_to_blender();
        assert_relative_eq!(m * m.transpose(), Matrix3::identity(), epsilon = 1e-6);
        assert_relative_eq!(m.determinant(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_remap_swaps_axes() {
        let remapped = remap_points(&[Vector3::new(1.0, 2.0, 3.0)]);
        assert_relative_eq!(remapped[0], Vector3::new(1.0, -3.0, 2.0), epsilon = 1e-6);
    }

    #[test]
    fn test_identity_pose_places_camera_at_origin() {
        let q = Quaternion::new(1.0, 0.0, 0.0, 0.0);
        let t = Vector3::zeros();
        let placement = pose_to_placement(&q, &t);
        assert_relative_eq!(placement.translation, Vector3::zeros(), epsilon = 1e-6);
        assert_relative_eq!(placement.rotation, colmap_to_blender(), epsilon = 1e-6);
    }

    #[test]
    fn test_placement_rotation_is_orthonormal() {
        let q = Quaternion::new(0.7, 0.1, -0.3, 0.5);
        let t = Vector3::new(1.0, -2.0, 0.5);
        let placement = pose_to_placement(&q, &t);
        let r = placement.rotation;
        assert_relative_eq!(r * r.transpose(), Matrix3::identity(), epsilon = 1e-5);
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_placement_inverts_world_to_camera() {
        // A camera looking at the origin from (0, 0, 4) in COLMAP terms:
        // identity rotation, t = (0, 0, -4) puts the world origin 4 units
        // in front of the camera. The camera center must come out at
        // remap * (0, 0, 4).
        let q = Quaternion::new(1.0, 0.0, 0.0, 0.0);
        let t = Vector3::new(0.0, 0.0, -4.0);
        let placement = pose_to_placement(&q, &t);
        let expected = colmap_to_blender() * Vector3::new(0.0, 0.0, 4.0);
        assert_relative_eq!(placement.translation, expected, epsilon = 1e-6);
    }
}
