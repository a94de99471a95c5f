//! Camera model kinds and pinhole intrinsics.
//!
//! The model-kind table mirrors COLMAP's fixed camera model registry;
//! intrinsics are the distilled per-camera record that scene consumers
//! (camera setup, frustum sizing) need.

use serde::{Deserialize, Serialize};

/// COLMAP camera model kinds, by binary model-id code.
///
/// Unknown codes decode to `Unknown` with zero parameters instead of
/// failing the whole camera read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraModelKind {
    SimplePinhole,
    Pinhole,
    SimpleRadial,
    Radial,
    OpenCv,
    OpenCvFisheye,
    FullOpenCv,
    Fov,
    SimpleRadialFisheye,
    RadialFisheye,
    ThinPrismFisheye,
    Unknown,
}

impl CameraModelKind {
    /// Decode a binary model-id code.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::SimplePinhole,
            1 => Self::Pinhole,
            2 => Self::SimpleRadial,
            3 => Self::Radial,
            4 => Self::OpenCv,
            5 => Self::OpenCvFisheye,
            6 => Self::FullOpenCv,
            7 => Self::Fov,
            8 => Self::SimpleRadialFisheye,
            9 => Self::RadialFisheye,
            10 => Self::ThinPrismFisheye,
            _ => Self::Unknown,
        }
    }

    /// Number of f64 parameters stored for this model in cameras.bin.
    pub fn param_count(self) -> usize {
        match self {
            Self::SimplePinhole => 3,
            Self::Pinhole => 4,
            Self::SimpleRadial => 4,
            Self::Radial => 5,
            Self::OpenCv => 8,
            Self::OpenCvFisheye => 8,
            Self::FullOpenCv => 12,
            Self::Fov => 5,
            Self::SimpleRadialFisheye => 4,
            Self::RadialFisheye => 5,
            Self::ThinPrismFisheye => 12,
            Self::Unknown => 0,
        }
    }

    /// COLMAP's canonical model name.
    pub fn name(self) -> &'static str {
        match self {
            Self::SimplePinhole => "SIMPLE_PINHOLE",
            Self::Pinhole => "PINHOLE",
            Self::SimpleRadial => "SIMPLE_RADIAL",
            Self::Radial => "RADIAL",
            Self::OpenCv => "OPENCV",
            Self::OpenCvFisheye => "OPENCV_FISHEYE",
            Self::FullOpenCv => "FULL_OPENCV",
            Self::Fov => "FOV",
            Self::SimpleRadialFisheye => "SIMPLE_RADIAL_FISHEYE",
            Self::RadialFisheye => "RADIAL_FISHEYE",
            Self::ThinPrismFisheye => "THIN_PRISM_FISHEYE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Pinhole intrinsics derived from a COLMAP camera record.
///
/// Focal lengths are always populated when any parameter exists; the
/// principal point is only known for the model families that store it
/// in a fixed slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Image width (pixels)
    pub width: u64,

    /// Image height (pixels)
    pub height: u64,

    /// Focal length in X (pixels)
    pub fx: f32,

    /// Focal length in Y (pixels)
    pub fy: f32,

    /// Principal point X (pixels), if the model stores one
    pub cx: Option<f32>,

    /// Principal point Y (pixels), if the model stores one
    pub cy: Option<f32>,

    /// Model family the parameters came from
    pub model: CameraModelKind,
}

impl CameraIntrinsics {
    /// Derive intrinsics from a model kind and its raw parameter vector.
    ///
    /// Returns `None` when no focal length can be read (empty parameter
    /// vector, e.g. an unknown model kind).
    pub fn from_params(
        model: CameraModelKind,
        width: u64,
        height: u64,
        params: &[f64],
    ) -> Option<Self> {
        use CameraModelKind::*;
        let (fx, fy, cx, cy) = match model {
            SimplePinhole if params.len() >= 3 => {
                (params[0], params[0], Some(params[1]), Some(params[2]))
            }
            Pinhole | OpenCv | OpenCvFisheye | FullOpenCv if params.len() >= 4 => {
                (params[0], params[1], Some(params[2]), Some(params[3]))
            }
            // Other families lead with a single focal term; the principal
            // point position varies, so it is left unset.
            _ => {
                let f = *params.first()?;
                (f, f, None, None)
            }
        };

        Some(Self {
            width,
            height,
            fx: fx as f32,
            fy: fy as f32,
            cx: cx.map(|v| v as f32),
            cy: cy.map(|v| v as f32),
            model,
        })
    }
}
