//! COLMAP binary format parser.
//!
//! COLMAP stores sparse reconstruction in binary files:
//! - cameras.bin: Camera intrinsics
//! - images.bin: Camera poses (extrinsics) + 2D keypoints
//! - points3D.bin: 3D points from structure-from-motion
//!
//! Format spec: https://colmap.github.io/format.html
//!
//! Reads are deliberately forgiving: a missing file yields an empty map,
//! and a truncated file yields every record parsed before the cut plus
//! the classified error. Callers see both through [`FileRead`] and must
//! decide whether partial data is usable.

use crate::core::{
    pose_to_placement, remap_points, CameraIntrinsics, CameraModelKind, PoseSort, PosedPlacement,
};
use crate::io::LoadError;
use byteorder::{LittleEndian, ReadBytesExt};
use nalgebra::{Quaternion, Vector3};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

/// The three files that make up a COLMAP sparse model.
const MODEL_FILES: [&str; 3] = ["cameras.bin", "images.bin", "points3D.bin"];

/// A camera record from cameras.bin.
///
/// Parameters are kept verbatim, including distortion terms; their count
/// and meaning depend on the model kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// Camera ID
    pub id: u32,

    /// Camera model family (UNKNOWN for unrecognized codes)
    pub model: CameraModelKind,

    /// Image width (pixels)
    pub width: u64,

    /// Image height (pixels)
    pub height: u64,

    /// Raw model parameters, model-kind dependent length
    pub params: Vec<f64>,
}

impl Camera {
    /// Derive pinhole intrinsics from this camera's parameters, if possible.
    pub fn intrinsics(&self) -> Option<CameraIntrinsics> {
        CameraIntrinsics::from_params(self.model, self.width, self.height, &self.params)
    }
}

/// A posed image record from images.bin.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    /// Image ID
    pub id: u32,

    /// World-to-camera rotation (w, x, y, z), as stored - not necessarily
    /// unit length
    pub qvec: Quaternion<f32>,

    /// World-to-camera translation
    pub tvec: Vector3<f32>,

    /// Referenced camera ID. May dangle; no referential check at load time.
    pub camera_id: u32,

    /// Image file name
    pub name: String,

    /// 3D point id of each 2D observation (-1 where untriangulated)
    pub point3d_ids: Vec<i64>,
}

/// A sparse 3D point record from points3D.bin.
#[derive(Debug, Clone, PartialEq)]
pub struct Point3D {
    /// Point ID
    pub id: u64,

    /// 3D position (COLMAP frame)
    pub position: Vector3<f32>,

    /// RGB color (0-255)
    pub color: [u8; 3],

    /// Reprojection error
    pub error: f32,

    /// Observations as (image id, 2D feature index) pairs
    pub track: Vec<(u32, u32)>,
}

/// Result of reading one binary file: whatever records parsed, plus the
/// error that stopped the read, if any.
///
/// This replaces silent partial success: a truncated file still hands
/// back its leading records, but the caller can see the cut happened.
#[derive(Debug)]
pub struct FileRead<T> {
    pub records: T,
    pub error: Option<LoadError>,
}

impl<T> FileRead<T> {
    /// True when the whole file was consumed without error.
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// True when the file did not exist (records are empty in that case).
    pub fn is_not_found(&self) -> bool {
        matches!(self.error, Some(LoadError::NotFound(_)))
    }

    pub fn status(&self) -> ReadStatus {
        match &self.error {
            None => ReadStatus::Complete,
            Some(LoadError::NotFound(_)) => ReadStatus::NotFound,
            Some(_) => ReadStatus::Partial,
        }
    }
}

/// Read status summary for logs and callers that do not need the error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    Complete,
    NotFound,
    Partial,
}

/// A complete COLMAP reconstruction: cameras, posed images and sparse
/// points, each with its own read outcome.
#[derive(Debug)]
pub struct Reconstruction {
    pub cameras: FileRead<BTreeMap<u32, Camera>>,
    pub images: FileRead<BTreeMap<u32, Image>>,
    pub points: FileRead<BTreeMap<u64, Point3D>>,
}

impl Reconstruction {
    fn empty_with(error_for: impl Fn() -> Option<LoadError>) -> Self {
        Self {
            cameras: FileRead {
                records: BTreeMap::new(),
                error: error_for(),
            },
            images: FileRead {
                records: BTreeMap::new(),
                error: error_for(),
            },
            points: FileRead {
                records: BTreeMap::new(),
                error: error_for(),
            },
        }
    }

    /// Camera placements converted to the Blender convention, in the
    /// requested order.
    pub fn pose_placements(&self, sort: PoseSort) -> Vec<PosedPlacement> {
        let mut images: Vec<&Image> = self.images.records.values().collect();
        match sort {
            PoseSort::ById => images.sort_by_key(|im| im.id),
            PoseSort::ByName => images.sort_by(|a, b| a.name.cmp(&b.name)),
        }

        images
            .into_iter()
            .map(|im| {
                let placement = pose_to_placement(&im.qvec, &im.tvec);
                PosedPlacement {
                    name: im.name.clone(),
                    rotation: placement.rotation,
                    translation: placement.translation,
                }
            })
            .collect()
    }

    /// Sparse point cloud in Blender coordinates with 0-1 colors.
    pub fn point_cloud(&self) -> (Vec<Vector3<f32>>, Vec<Vector3<f32>>) {
        let positions: Vec<Vector3<f32>> = self
            .points
            .records
            .values()
            .map(|p| p.position)
            .collect();
        let colors = self
            .points
            .records
            .values()
            .map(|p| {
                Vector3::new(
                    p.color[0] as f32 / 255.0,
                    p.color[1] as f32 / 255.0,
                    p.color[2] as f32 / 255.0,
                )
            })
            .collect();
        (remap_points(&positions), colors)
    }

    /// Intrinsics of the first camera (lowest id), the record scene
    /// consumers use to configure their render camera.
    pub fn primary_intrinsics(&self) -> Option<CameraIntrinsics> {
        self.cameras
            .records
            .values()
            .next()
            .and_then(|cam| cam.intrinsics())
    }
}

/// Find the model directory under `root` holding all three binary files.
///
/// Candidates are tried in order: `root/sparse/0`, `root/sparse`, `root`
/// itself. Returns the first directory where cameras.bin, images.bin and
/// points3D.bin all exist.
pub fn find_model_dir(root: &Path) -> Option<PathBuf> {
    let candidates = [root.join("sparse").join("0"), root.join("sparse"), root.to_path_buf()];

    candidates
        .into_iter()
        .find(|dir| MODEL_FILES.iter().all(|f| dir.join(f).exists()))
}

/// Load a COLMAP reconstruction from `root`, discovering the model
/// directory with [`find_model_dir`].
///
/// Never fails outright: a missing model directory produces an empty
/// reconstruction whose per-file errors all say NotFound, and each of
/// the three files degrades independently.
pub fn load_reconstruction(root: &Path) -> Reconstruction {
    let Some(dir) = find_model_dir(root) else {
        log::warn!(
            "no complete COLMAP model (cameras.bin, images.bin, points3D.bin) under {}",
            root.display()
        );
        return Reconstruction::empty_with(|| Some(LoadError::NotFound(root.to_path_buf())));
    };
    log::debug!("found COLMAP model in {}", dir.display());

    let cameras = read_cameras_bin(&dir.join("cameras.bin"));
    let images = read_images_bin(&dir.join("images.bin"));
    let points = read_points3d_bin(&dir.join("points3D.bin"));

    for (what, error) in [
        ("cameras", &cameras.error),
        ("images", &images.error),
        ("points3D", &points.error),
    ] {
        if let Some(e) = error {
            log::warn!("incomplete {} read: {}", what, e);
        }
    }
    log::info!(
        "loaded {} cameras, {} images, {} 3D points",
        cameras.records.len(),
        images.records.len(),
        points.records.len()
    );

    if images.records.is_empty() {
        // Pose conversion and splat alignment both need at least one image.
        log::warn!("reconstruction contains no posed images");
    }

    Reconstruction {
        cameras,
        images,
        points,
    }
}

/// Read cameras.bin.
///
/// Binary format (little-endian):
/// - num_cameras: u64
/// - For each camera:
///   - camera_id: u32
///   - model_id: i32 (0=SIMPLE_PINHOLE, 1=PINHOLE, 2=SIMPLE_RADIAL, ...)
///   - width: u64
///   - height: u64
///   - params: [f64; N] (N fixed per model, e.g. 4 for PINHOLE)
///
/// Unrecognized model codes decode as UNKNOWN with zero parameters and
/// the read continues.
pub fn read_cameras_bin(path: &Path) -> FileRead<BTreeMap<u32, Camera>> {
    let mut cameras = BTreeMap::new();
    let result = parse_cameras(path, &mut cameras);
    finish(cameras, path, "camera record", result)
}

fn parse_cameras(path: &Path, out: &mut BTreeMap<u32, Camera>) -> Result<(), LoadError> {
    let mut reader = BufReader::new(File::open(path)?);

    let num_cameras = reader.read_u64::<LittleEndian>()?;
    for _ in 0..num_cameras {
        let camera_id = reader.read_u32::<LittleEndian>()?;
        let model_id = reader.read_i32::<LittleEndian>()?;
        let width = reader.read_u64::<LittleEndian>()?;
        let height = reader.read_u64::<LittleEndian>()?;

        let model = CameraModelKind::from_code(model_id);
        if model == CameraModelKind::Unknown {
            log::warn!(
                "camera {}: unknown model code {}, keeping zero-parameter model",
                camera_id,
                model_id
            );
        }

        let mut params = Vec::with_capacity(model.param_count());
        for _ in 0..model.param_count() {
            params.push(reader.read_f64::<LittleEndian>()?);
        }

        out.insert(
            camera_id,
            Camera {
                id: camera_id,
                model,
                width,
                height,
                params,
            },
        );
    }

    Ok(())
}

/// Read images.bin.
///
/// Binary format (little-endian):
/// - num_images: u64
/// - For each image:
///   - image_id: u32
///   - qw, qx, qy, qz: f64 (world-to-camera rotation)
///   - tx, ty, tz: f64 (world-to-camera translation)
///   - camera_id: u32
///   - name: NUL-terminated string
///   - num_points2d: u64, then num_points2d × (x: f64, y: f64, id: i64);
///     only the 3D point ids are retained
pub fn read_images_bin(path: &Path) -> FileRead<BTreeMap<u32, Image>> {
    let mut images = BTreeMap::new();
    let result = parse_images(path, &mut images);
    finish(images, path, "image record", result)
}

fn parse_images(path: &Path, out: &mut BTreeMap<u32, Image>) -> Result<(), LoadError> {
    let mut reader = BufReader::new(File::open(path)?);

    let num_images = reader.read_u64::<LittleEndian>()?;
    for _ in 0..num_images {
        let image_id = reader.read_u32::<LittleEndian>()?;

        let qw = reader.read_f64::<LittleEndian>()? as f32;
        let qx = reader.read_f64::<LittleEndian>()? as f32;
        let qy = reader.read_f64::<LittleEndian>()? as f32;
        let qz = reader.read_f64::<LittleEndian>()? as f32;

        let tx = reader.read_f64::<LittleEndian>()? as f32;
        let ty = reader.read_f64::<LittleEndian>()? as f32;
        let tz = reader.read_f64::<LittleEndian>()? as f32;

        let camera_id = reader.read_u32::<LittleEndian>()?;
        let name = read_nul_terminated(&mut reader)?;

        let num_points2d = reader.read_u64::<LittleEndian>()?;
        let mut point3d_ids = Vec::with_capacity(num_points2d as usize);
        for _ in 0..num_points2d {
            reader.read_f64::<LittleEndian>()?; // x
            reader.read_f64::<LittleEndian>()?; // y
            point3d_ids.push(reader.read_i64::<LittleEndian>()?);
        }

        out.insert(
            image_id,
            Image {
                id: image_id,
                qvec: Quaternion::new(qw, qx, qy, qz),
                tvec: Vector3::new(tx, ty, tz),
                camera_id,
                name,
                point3d_ids,
            },
        );
    }

    Ok(())
}

/// Read points3D.bin.
///
/// Binary format (little-endian):
/// - num_points: u64
/// - For each point:
///   - point_id: u64
///   - x, y, z: f64 (position)
///   - r, g, b: u8 (color)
///   - error: f64 (reprojection error)
///   - track_length: u64, then track_length × (image_id: u32, point2d_idx: u32)
pub fn read_points3d_bin(path: &Path) -> FileRead<BTreeMap<u64, Point3D>> {
    let mut points = BTreeMap::new();
    let result = parse_points3d(path, &mut points);
    finish(points, path, "point record", result)
}

fn parse_points3d(path: &Path, out: &mut BTreeMap<u64, Point3D>) -> Result<(), LoadError> {
    let mut reader = BufReader::new(File::open(path)?);

    let num_points = reader.read_u64::<LittleEndian>()?;
    for _ in 0..num_points {
        let point_id = reader.read_u64::<LittleEndian>()?;

        let x = reader.read_f64::<LittleEndian>()? as f32;
        let y = reader.read_f64::<LittleEndian>()? as f32;
        let z = reader.read_f64::<LittleEndian>()? as f32;

        let r = reader.read_u8()?;
        let g = reader.read_u8()?;
        let b = reader.read_u8()?;

        let error = reader.read_f64::<LittleEndian>()? as f32;

        let track_length = reader.read_u64::<LittleEndian>()?;
        let mut track = Vec::with_capacity(track_length as usize);
        for _ in 0..track_length {
            let image_id = reader.read_u32::<LittleEndian>()?;
            let point2d_idx = reader.read_u32::<LittleEndian>()?;
            track.push((image_id, point2d_idx));
        }

        out.insert(
            point_id,
            Point3D {
                id: point_id,
                position: Vector3::new(x, y, z),
                color: [r, g, b],
                error,
                track,
            },
        );
    }

    Ok(())
}

fn read_nul_terminated<R: Read>(reader: &mut R) -> Result<String, LoadError> {
    let mut bytes = Vec::new();
    loop {
        let byte = reader.read_u8()?;
        if byte == 0 {
            break;
        }
        bytes.push(byte);
    }
    // Names in the wild are ASCII file paths; be lenient on stray bytes.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Classify the outcome of a file parse into the partial-result shape.
fn finish<T>(
    records: T,
    path: &Path,
    context: &'static str,
    result: Result<(), LoadError>,
) -> FileRead<T> {
    let error = match result {
        Ok(()) => None,
        Err(LoadError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            Some(LoadError::NotFound(path.to_path_buf()))
        }
        Err(LoadError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => {
            Some(LoadError::Truncated {
                path: path.to_path_buf(),
                context: context.to_string(),
            })
        }
        Err(e) => Some(e),
    };
    FileRead { records, error }
}
