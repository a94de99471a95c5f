//! Point-cloud alignment: translation + uniform scale fitting.
//!
//! Places a floating cloud (typically the splat positions) over a
//! reference cloud (the sparse reconstruction points) using centroid
//! matching and bounding-extent ratios. Orientation is never estimated;
//! the result carries the fixed COLMAP→Blender axis remap so a consumer
//! can apply rotation, scale and translation in one go. No
//! nearest-neighbor correspondences are ever computed.

use crate::core::{colmap_to_blender, median};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Tuning knobs for [`align_clouds`].
#[derive(Debug, Clone)]
pub struct AlignConfig {
    /// Lower clamp on the estimated scale. Conservative guard against
    /// degenerate extents, not a physical limit.
    pub scale_min: f32,

    /// Upper clamp on the estimated scale.
    pub scale_max: f32,

    /// Iteration cap for the centroid refinement.
    pub max_iterations: usize,

    /// Refinement stops once the translation change magnitude drops
    /// below this.
    pub tolerance: f32,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            scale_min: 0.5,
            scale_max: 2.0,
            max_iterations: 10,
            tolerance: 1e-3,
        }
    }
}

/// A computed placement for the floating cloud. Immutable once computed;
/// reapply it to as many points as needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    /// World-space offset moving the scaled floating centroid onto the
    /// reference centroid
    pub translation: Vector3<f32>,

    /// Uniform scale, clamped to the configured range
    pub scale: f32,

    /// Fixed axis-remap rotation (COLMAP→Blender), never estimated
    pub rotation: Matrix3<f32>,
}

impl Alignment {
    /// Identity placement (still carries the axis-remap rotation).
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            scale: 1.0,
            rotation: colmap_to_blender(),
        }
    }

    /// Apply rotation, scale and translation to a point.
    pub fn apply(&self, point: &Vector3<f32>) -> Vector3<f32> {
        self.rotation * point * self.scale + self.translation
    }
}

/// Compute the translation + uniform scale placing `floating` over
/// `reference`. Both clouds must already be in the same (Blender) axis
/// convention.
///
/// Scale is the median of the per-axis bounding-extent ratios, clamped
/// into the configured range. The translation moves the *scaled*
/// floating centroid onto the reference centroid, so
/// [`Alignment::apply`] (scale first, then translate) lands the
/// floating cloud on the reference. Degenerate inputs (either cloud
/// empty) yield the identity placement rather than an error.
///
/// If either cloud was subsampled, the result depends on the subsample
/// seed; fix the seed for reproducible alignments.
pub fn align_clouds(
    reference: &[Vector3<f32>],
    floating: &[Vector3<f32>],
    config: &AlignConfig,
) -> Alignment {
    if reference.is_empty() || floating.is_empty() {
        return Alignment::identity();
    }

    let reference_extent = extents(reference);
    let floating_extent = extents(floating);

    let ratios: Vec<f32> = (0..3)
        .filter(|&axis| floating_extent[axis] > 0.0)
        .map(|axis| reference_extent[axis] / floating_extent[axis])
        .collect();

    let scale = match median(&ratios) {
        Some(s) => {
            let clamped = s.clamp(config.scale_min, config.scale_max);
            if clamped != s {
                log::debug!("clamped scale {:.3} into [{}, {}]", s, config.scale_min, config.scale_max);
            }
            clamped
        }
        None => 1.0,
    };

    // The floating centroid moves when the cloud is scaled; anchor the
    // translation to its scaled position, not the raw one.
    let reference_centroid = centroid(reference);
    let floating_centroid = centroid(floating);
    let translation = reference_centroid - floating_centroid * scale;

    log::debug!(
        "alignment: translation ({:.2}, {:.2}, {:.2}), scale {:.3}",
        translation.x,
        translation.y,
        translation.z,
        scale
    );

    Alignment {
        translation,
        scale,
        rotation: colmap_to_blender(),
    }
}

/// Iterative centroid-matching refinement of a translation.
///
/// Repeatedly shifts the floating cloud's centroid onto the reference
/// centroid, stopping early once the translation stops changing by more
/// than `tolerance`. This is a coarse step, not ICP: no point
/// correspondences are computed, so for rigid clouds it converges in one
/// iteration and the loop exists to absorb callers that mutate the
/// floating cloud between rounds.
pub fn refine_translation(
    reference: &[Vector3<f32>],
    floating: &[Vector3<f32>],
    config: &AlignConfig,
) -> Vector3<f32> {
    if reference.is_empty() || floating.is_empty() {
        return Vector3::zeros();
    }

    let reference_centroid = centroid(reference);
    let mut translation = Vector3::zeros();

    for iteration in 0..config.max_iterations {
        let shifted_centroid = centroid(floating) + translation;
        let updated = translation + (reference_centroid - shifted_centroid);

        let change = (updated - translation).norm();
        translation = updated;
        if change < config.tolerance {
            log::debug!("refinement converged after {} iterations", iteration + 1);
            break;
        }
    }

    translation
}

fn centroid(points: &[Vector3<f32>]) -> Vector3<f32> {
    let sum: Vector3<f32> = points.iter().sum();
    sum / points.len() as f32
}

/// Per-axis bounding extents (max - min).
fn extents(points: &[Vector3<f32>]) -> [f32; 3] {
    let mut min = points[0];
    let mut max = points[0];
    for p in points {
        min = min.inf(p);
        max = max.sup(p);
    }
    [max.x - min.x, max.y - min.y, max.z - min.z]
}
