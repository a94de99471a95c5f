//! COLMAP binary reader tests.
//!
//! Fixtures are written byte-for-byte with byteorder so the reader is
//! exercised against the exact on-disk layout: 8-byte record counts,
//! fixed camera/image/point blocks, NUL-terminated names, observation
//! and track tails.

use byteorder::{LittleEndian, WriteBytesExt};
use splat_align::core::PoseSort;
use splat_align::io::{
    find_model_dir, load_reconstruction, read_cameras_bin, read_images_bin, read_points3d_bin,
    LoadError,
};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fixture_dir(name: &str) -> PathBuf {
    init_logs();
    let dir = std::env::temp_dir().join(format!(
        "splat_align_colmap_{}_{}",
        name,
        std::process::id()
    ));
    if dir.exists() {
        std::fs::remove_dir_all(&dir).unwrap();
    }
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

struct CameraFixture {
    id: u32,
    model_id: i32,
    width: u64,
    height: u64,
    params: Vec<f64>,
}

fn write_cameras(path: &Path, cameras: &[CameraFixture]) {
    let mut f = File::create(path).unwrap();
    f.write_u64::<LittleEndian>(cameras.len() as u64).unwrap();
    for cam in cameras {
        f.write_u32::<LittleEndian>(cam.id).unwrap();
        f.write_i32::<LittleEndian>(cam.model_id).unwrap();
        f.write_u64::<LittleEndian>(cam.width).unwrap();
        f.write_u64::<LittleEndian>(cam.height).unwrap();
        for p in &cam.params {
            f.write_f64::<LittleEndian>(*p).unwrap();
        }
    }
}

struct ImageFixture {
    id: u32,
    qvec: [f64; 4],
    tvec: [f64; 3],
    camera_id: u32,
    name: &'static str,
    observations: Vec<(f64, f64, i64)>,
}

fn write_images(path: &Path, images: &[ImageFixture]) {
    let mut f = File::create(path).unwrap();
    f.write_u64::<LittleEndian>(images.len() as u64).unwrap();
    for im in images {
        f.write_u32::<LittleEndian>(im.id).unwrap();
        for q in im.qvec {
            f.write_f64::<LittleEndian>(q).unwrap();
        }
        for t in im.tvec {
            f.write_f64::<LittleEndian>(t).unwrap();
        }
        f.write_u32::<LittleEndian>(im.camera_id).unwrap();
        f.write_all(im.name.as_bytes()).unwrap();
        f.write_u8(0).unwrap();
        f.write_u64::<LittleEndian>(im.observations.len() as u64)
            .unwrap();
        for (x, y, id) in &im.observations {
            f.write_f64::<LittleEndian>(*x).unwrap();
            f.write_f64::<LittleEndian>(*y).unwrap();
            f.write_i64::<LittleEndian>(*id).unwrap();
        }
    }
}

struct PointFixture {
    id: u64,
    xyz: [f64; 3],
    rgb: [u8; 3],
    error: f64,
    track: Vec<(u32, u32)>,
}

fn write_points(path: &Path, points: &[PointFixture]) {
    let mut f = File::create(path).unwrap();
    f.write_u64::<LittleEndian>(points.len() as u64).unwrap();
    for p in points {
        f.write_u64::<LittleEndian>(p.id).unwrap();
        for v in p.xyz {
            f.write_f64::<LittleEndian>(v).unwrap();
        }
        f.write_all(&p.rgb).unwrap();
        f.write_f64::<LittleEndian>(p.error).unwrap();
        f.write_u64::<LittleEndian>(p.track.len() as u64).unwrap();
        for (image_id, idx) in &p.track {
            f.write_u32::<LittleEndian>(*image_id).unwrap();
            f.write_u32::<LittleEndian>(*idx).unwrap();
        }
    }
}

#[test]
fn pinhole_camera_roundtrips() {
    let dir = fixture_dir("pinhole");
    let path = dir.join("cameras.bin");
    write_cameras(
        &path,
        &[CameraFixture {
            id: 1,
            model_id: 1, // PINHOLE
            width: 1920,
            height: 1080,
            params: vec![1200.0, 1210.0, 960.0, 540.0],
        }],
    );

    let read = read_cameras_bin(&path);
    assert!(read.is_complete());
    assert_eq!(read.records.len(), 1);

    let cam = &read.records[&1];
    assert_eq!(cam.model.name(), "PINHOLE");
    assert_eq!(cam.width, 1920);
    assert_eq!(cam.height, 1080);
    assert_eq!(cam.params, vec![1200.0, 1210.0, 960.0, 540.0]);

    let intr = cam.intrinsics().expect("pinhole has intrinsics");
    assert_eq!(intr.fx, 1200.0);
    assert_eq!(intr.fy, 1210.0);
    assert_eq!(intr.cx, Some(960.0));
    assert_eq!(intr.cy, Some(540.0));
}

#[test]
fn unknown_camera_model_degrades_and_read_continues() {
    let dir = fixture_dir("unknown_model");
    let path = dir.join("cameras.bin");
    write_cameras(
        &path,
        &[
            CameraFixture {
                id: 7,
                model_id: 77, // not in the model table: zero parameters follow
                width: 100,
                height: 100,
                params: vec![],
            },
            CameraFixture {
                id: 8,
                model_id: 0, // SIMPLE_PINHOLE
                width: 640,
                height: 480,
                params: vec![500.0, 320.0, 240.0],
            },
        ],
    );

    let read = read_cameras_bin(&path);
    assert!(read.is_complete(), "unknown model must not abort the read");
    assert_eq!(read.records.len(), 2);
    assert_eq!(read.records[&7].model.name(), "UNKNOWN");
    assert!(read.records[&7].params.is_empty());
    assert!(read.records[&7].intrinsics().is_none());
    assert_eq!(read.records[&8].model.name(), "SIMPLE_PINHOLE");
}

#[test]
fn image_record_keeps_pose_name_and_point_ids() {
    let dir = fixture_dir("images");
    let path = dir.join("images.bin");
    write_images(
        &path,
        &[ImageFixture {
            id: 3,
            qvec: [0.9, 0.1, -0.2, 0.3],
            tvec: [1.5, -2.0, 0.25],
            camera_id: 42, // dangling on purpose: no check at load time
            name: "frame_0003.jpg",
            observations: vec![(10.0, 20.0, 101), (30.0, 40.0, -1), (50.0, 60.0, 205)],
        }],
    );

    let read = read_images_bin(&path);
    assert!(read.is_complete());
    let image = &read.records[&3];
    assert_eq!(image.name, "frame_0003.jpg");
    assert_eq!(image.camera_id, 42);
    assert_eq!(image.qvec.w, 0.9);
    assert_eq!(image.qvec.i, 0.1);
    assert_eq!(image.tvec.x, 1.5);
    assert_eq!(image.point3d_ids, vec![101, -1, 205]);
}

#[test]
fn point_record_keeps_color_error_and_track() {
    let dir = fixture_dir("points");
    let path = dir.join("points3D.bin");
    write_points(
        &path,
        &[PointFixture {
            id: 9000,
            xyz: [1.0, 2.0, 3.0],
            rgb: [255, 128, 0],
            error: 0.75,
            track: vec![(1, 4), (2, 9)],
        }],
    );

    let read = read_points3d_bin(&path);
    assert!(read.is_complete());
    let point = &read.records[&9000];
    assert_eq!(point.position.x, 1.0);
    assert_eq!(point.color, [255, 128, 0]);
    assert_eq!(point.error, 0.75);
    assert_eq!(point.track, vec![(1, 4), (2, 9)]);
}

#[test]
fn truncated_file_returns_partial_records_plus_error() {
    let dir = fixture_dir("truncated");
    let path = dir.join("points3D.bin");
    write_points(
        &path,
        &[
            PointFixture {
                id: 1,
                xyz: [0.0, 0.0, 0.0],
                rgb: [10, 10, 10],
                error: 0.1,
                track: vec![],
            },
            PointFixture {
                id: 2,
                xyz: [1.0, 1.0, 1.0],
                rgb: [20, 20, 20],
                error: 0.2,
                track: vec![],
            },
        ],
    );

    // Cut the file mid-way through the second record.
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 17]).unwrap();

    let read = read_points3d_bin(&path);
    assert!(!read.is_complete());
    assert!(matches!(read.error, Some(LoadError::Truncated { .. })));
    // The first record parsed before the cut is retained.
    assert_eq!(read.records.len(), 1);
    assert!(read.records.contains_key(&1));
}

#[test]
fn missing_file_is_empty_not_found() {
    let dir = fixture_dir("missing");
    let read = read_images_bin(&dir.join("images.bin"));
    assert!(read.records.is_empty());
    assert!(read.is_not_found());
}

fn write_minimal_model(dir: &Path) {
    write_cameras(
        &dir.join("cameras.bin"),
        &[CameraFixture {
            id: 1,
            model_id: 1,
            width: 1920,
            height: 1080,
            params: vec![1000.0, 1000.0, 960.0, 540.0],
        }],
    );
    write_images(
        &dir.join("images.bin"),
        &[
            ImageFixture {
                id: 2,
                qvec: [1.0, 0.0, 0.0, 0.0],
                tvec: [0.0, 0.0, -4.0],
                camera_id: 1,
                name: "b_frame.jpg",
                observations: vec![],
            },
            ImageFixture {
                id: 1,
                qvec: [1.0, 0.0, 0.0, 0.0],
                tvec: [0.0, 0.0, -2.0],
                camera_id: 1,
                name: "a_frame.jpg",
                observations: vec![],
            },
        ],
    );
    write_points(
        &dir.join("points3D.bin"),
        &[PointFixture {
            id: 1,
            xyz: [1.0, 2.0, 3.0],
            rgb: [255, 0, 0],
            error: 0.5,
            track: vec![(1, 0)],
        }],
    );
}

#[test]
fn discovery_prefers_sparse_zero_then_falls_back() {
    let root = fixture_dir("discovery");
    let sparse0 = root.join("sparse").join("0");
    std::fs::create_dir_all(&sparse0).unwrap();
    write_minimal_model(&sparse0);
    assert_eq!(find_model_dir(&root), Some(sparse0.clone()));

    // Root-level files are found when no sparse/ subdirectory qualifies.
    let flat_root = fixture_dir("discovery_flat");
    write_minimal_model(&flat_root);
    assert_eq!(find_model_dir(&flat_root), Some(flat_root.clone()));

    // An incomplete directory never qualifies.
    let partial_root = fixture_dir("discovery_partial");
    write_minimal_model(&partial_root);
    std::fs::remove_file(partial_root.join("points3D.bin")).unwrap();
    assert_eq!(find_model_dir(&partial_root), None);
}

#[test]
fn load_reconstruction_without_model_is_empty_with_not_found() {
    let root = fixture_dir("no_model");
    let recon = load_reconstruction(&root);
    assert!(recon.cameras.records.is_empty());
    assert!(recon.images.records.is_empty());
    assert!(recon.points.records.is_empty());
    assert!(recon.cameras.is_not_found());
    assert!(recon.images.is_not_found());
    assert!(recon.points.is_not_found());
}

#[test]
fn loaded_reconstruction_exposes_poses_points_and_intrinsics() {
    let root = fixture_dir("full_load");
    let sparse0 = root.join("sparse").join("0");
    std::fs::create_dir_all(&sparse0).unwrap();
    write_minimal_model(&sparse0);

    let recon = load_reconstruction(&root);
    assert!(recon.cameras.is_complete());
    assert!(recon.images.is_complete());
    assert!(recon.points.is_complete());

    let by_id = recon.pose_placements(PoseSort::ById);
    assert_eq!(by_id.len(), 2);
    assert_eq!(by_id[0].name, "a_frame.jpg"); // id 1 first
    assert_eq!(by_id[1].name, "b_frame.jpg");

    let by_name = recon.pose_placements(PoseSort::ByName);
    assert_eq!(by_name[0].name, "a_frame.jpg");

    // Identity rotation, t = (0,0,-2): camera center is remap * (0,0,2).
    let t = by_id[0].translation;
    assert!((t.x - 0.0).abs() < 1e-5);
    assert!((t.y - -2.0).abs() < 1e-5);
    assert!((t.z - 0.0).abs() < 1e-5);

    let (positions, colors) = recon.point_cloud();
    assert_eq!(positions.len(), 1);
    assert_eq!(colors.len(), 1);
    // (1,2,3) remapped to (1,-3,2); pure red scaled to 0-1.
    assert!((positions[0].x - 1.0).abs() < 1e-6);
    assert!((positions[0].y - -3.0).abs() < 1e-6);
    assert!((positions[0].z - 2.0).abs() < 1e-6);
    assert!((colors[0].x - 1.0).abs() < 1e-6);
    assert!((colors[0].y - 0.0).abs() < 1e-6);

    let intr = recon.primary_intrinsics().expect("first camera intrinsics");
    assert_eq!(intr.width, 1920);
    assert_eq!(intr.fx, 1000.0);
    assert_eq!(intr.cx, Some(960.0));
}
