//! Mathematical utilities (quaternions, activation functions, etc.).

use nalgebra::{Matrix3, Quaternion};

/// Convert a (not necessarily normalized) quaternion to a 3×3 rotation matrix.
///
/// The quaternion is normalized first; COLMAP image records do not guarantee
/// unit length in storage.
///
/// Formula (from quaternion q = w + xi + yj + zk):
/// R = | 1-2(y²+z²)   2(xy-wz)    2(xz+wy)  |
///     | 2(xy+wz)     1-2(x²+z²)  2(yz-wx)  |
///     | 2(xz-wy)     2(yz+wx)    1-2(x²+y²)|
pub fn quaternion_to_matrix(q: &Quaternion<f32>) -> Matrix3<f32> {
    let n = q.norm();
    let (w, x, y, z) = if n > 0.0 {
        (q.w / n, q.i / n, q.j / n, q.k / n)
    } else {
        // Degenerate zero quaternion: fall back to identity orientation.
        (1.0, 0.0, 0.0, 0.0)
    };

    Matrix3::new(
        1.0 - 2.0 * (y * y + z * z),
        2.0 * (x * y - w * z),
        2.0 * (x * z + w * y),
        2.0 * (x * y + w * z),
        1.0 - 2.0 * (x * x + z * z),
        2.0 * (y * z - w * x),
        2.0 * (x * z - w * y),
        2.0 * (y * z + w * x),
        1.0 - 2.0 * (x * x + y * y),
    )
}

/// Sigmoid activation function: σ(x) = 1 / (1 + e^(-x))
///
/// Maps R → (0, 1). Used to turn zeroth-order SH coefficients into
/// displayable colors.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Median of a slice of values. Returns `None` for an empty slice.
///
/// For an even count this returns the mean of the two middle values,
/// matching `numpy.median`.
pub fn median(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}
