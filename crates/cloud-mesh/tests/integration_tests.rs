//! End-to-end integration tests for cloud-mesh.
//!
//! These tests exercise the full path from a point cloud file on disk to a
//! PLY mesh next to it, through the batch entry points.

use std::fs;
use std::path::{Path, PathBuf};

use cloud_mesh::batch::{
    fast_triangulation, gaussian_process_completion, partial_completion, qhull_completion,
};
use cloud_mesh::{
    BatchConfig, CloudError, CompletionMethod, CompletionParams, ErrorCategory, Mesh, PlyEncoding,
    load_ply_mesh, run_batch,
};
use tempfile::TempDir;

/// Write an ASCII PCD holding a filled cube of side `2 * half` centered at `center`.
fn write_cube_pcd(dir: &Path, name: &str, center: [f64; 3], half: f64, steps: usize) -> PathBuf {
    let step = 2.0 * half / steps as f64;
    let mut rows = Vec::new();
    for i in 0..=steps {
        for j in 0..=steps {
            for k in 0..=steps {
                rows.push(format!(
                    "{} {} {}",
                    center[0] - half + i as f64 * step,
                    center[1] - half + j as f64 * step,
                    center[2] - half + k as f64 * step
                ));
            }
        }
    }

    let mut text = String::new();
    text.push_str("# .PCD v0.7 - Point Cloud Data file format\n");
    text.push_str("VERSION 0.7\nFIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nCOUNT 1 1 1\n");
    text.push_str(&format!("WIDTH {}\nHEIGHT 1\n", rows.len()));
    text.push_str("VIEWPOINT 0 0 0 1 0 0 0\n");
    text.push_str(&format!("POINTS {}\nDATA ascii\n", rows.len()));
    for row in rows {
        text.push_str(&row);
        text.push('\n');
    }

    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

/// Write an XYZ height field z = 0.1 * (x + y) over an n x n grid.
fn write_height_field(dir: &Path, name: &str, n: usize) -> PathBuf {
    let mut text = String::from("# height field\n");
    for i in 0..n {
        for j in 0..n {
            let (x, y) = (i as f64, j as f64);
            text.push_str(&format!("{} {} {}\n", x, y, 0.1 * (x + y)));
        }
    }
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_partial_completion_end_to_end() {
    let dir = TempDir::new().unwrap();
    let input = write_cube_pcd(dir.path(), "cube.pcd", [10.0, -3.0, 2.5], 5.0, 20);

    let params = CompletionParams::default().with_patch_size(20);
    let report = partial_completion(&[&input], &params, "_partial");
    assert!(report.all_succeeded(), "{:?}", report.outcomes[0].error());

    let outcome = &report.outcomes[0];
    assert_eq!(outcome.output, dir.path().join("cube_partial.ply"));

    let stats = outcome.stats().unwrap();
    assert_eq!(stats.method, CompletionMethod::Partial);
    assert_eq!(stats.input_points, 21 * 21 * 21);
    assert!((stats.resolution.unwrap() - 0.625).abs() < 1e-9);
    assert_eq!(stats.discarded_points(), 0);

    let mesh = load_ply_mesh(&outcome.output).unwrap();
    assert_eq!(mesh.vertex_count(), stats.output_vertices);
    assert_eq!(mesh.face_count(), stats.output_faces);
    assert!(mesh.edge_report().is_watertight());
    assert!(mesh.signed_volume() > 0.0);

    // Output lives in the input's frame, within one voxel of the cloud
    let (min, max) = mesh.bounds().unwrap();
    let center = [10.0, -3.0, 2.5];
    for axis in 0..3 {
        assert!((min[axis] - (center[axis] - 5.0)).abs() <= 0.625 + 1e-4);
        assert!((max[axis] - (center[axis] + 5.0)).abs() <= 0.625 + 1e-4);
    }
}

#[test]
fn test_binary_output_matches_ascii() {
    let dir = TempDir::new().unwrap();
    let input = write_cube_pcd(dir.path(), "cube.pcd", [0.0, 0.0, 0.0], 1.0, 8);
    let params = CompletionParams::preview();

    let ascii = run_batch(
        &[&input],
        &BatchConfig::new(CompletionMethod::Partial)
            .with_params(params.clone())
            .with_suffix("_ascii"),
    );
    let binary = run_batch(
        &[&input],
        &BatchConfig::new(CompletionMethod::Partial)
            .with_params(params)
            .with_suffix("_binary")
            .with_encoding(PlyEncoding::BinaryLittleEndian),
    );
    assert!(ascii.all_succeeded() && binary.all_succeeded());

    let a = Mesh::load(&ascii.outcomes[0].output).unwrap();
    let b = Mesh::load(&binary.outcomes[0].output).unwrap();
    assert_eq!(a.faces, b.faces);
    assert_eq!(a.vertex_count(), b.vertex_count());
    for (va, vb) in a.vertices.iter().zip(&b.vertices) {
        assert!((va.position - vb.position).norm() < 1e-5);
    }
}

#[test]
fn test_fast_triangulation_end_to_end() {
    let dir = TempDir::new().unwrap();
    let input = write_height_field(dir.path(), "terrain.xyz", 6);

    let report = fast_triangulation(&[&input], "_triangulation");
    assert!(report.all_succeeded());

    let mesh = load_ply_mesh(dir.path().join("terrain_triangulation.ply")).unwrap();
    assert_eq!(mesh.vertex_count(), 36);
    assert_eq!(mesh.face_count(), 2 * 5 * 5);

    // z values survive the trip through f32 PLY output
    for v in &mesh.vertices {
        let expected = 0.1 * (v.position.x + v.position.y);
        assert!((v.position.z - expected).abs() < 1e-5);
    }
}

#[test]
fn test_qhull_completion_end_to_end() {
    let dir = TempDir::new().unwrap();
    let input = write_cube_pcd(dir.path(), "box.pcd", [1.0, 2.0, 3.0], 0.5, 1);

    let report = qhull_completion(&[&input], "_qhull");
    assert!(report.all_succeeded());

    let mesh = load_ply_mesh(dir.path().join("box_qhull.ply")).unwrap();
    assert_eq!(mesh.face_count(), 12);
    assert!(mesh.edge_report().is_watertight());
    assert!((mesh.signed_volume() - 1.0).abs() < 1e-3);
}

#[test]
fn test_batch_reports_each_failure() {
    let dir = TempDir::new().unwrap();
    let good = write_cube_pcd(dir.path(), "good.pcd", [0.0, 0.0, 0.0], 1.0, 6);

    let missing = dir.path().join("missing.pcd");
    let unsupported = dir.path().join("cloud.obj");
    fs::write(&unsupported, "v 0 0 0\n").unwrap();
    let short_row = dir.path().join("short.xyz");
    fs::write(&short_row, "0 0 0\n1 1\n").unwrap();
    let empty = dir.path().join("empty.pcd");
    fs::write(&empty, "FIELDS x y z\nWIDTH 0\nHEIGHT 1\nPOINTS 0\nDATA ascii\n").unwrap();
    let flat = dir.path().join("flat.xyz");
    fs::write(&flat, "1 1 1\n1 1 1\n1 1 1\n").unwrap();

    let paths = [&missing, &unsupported, &good, &short_row, &empty, &flat];
    let params = CompletionParams::preview();
    let report = partial_completion(&paths, &params, "_partial");

    assert_eq!(report.outcomes.len(), paths.len());
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 5);
    assert!(report.outcomes[2].is_success());

    let errors: Vec<&CloudError> = report.failures().filter_map(|o| o.error()).collect();
    assert!(matches!(errors[0], CloudError::IoRead { .. }));
    assert!(matches!(errors[1], CloudError::UnsupportedFormat { .. }));
    assert!(matches!(errors[2], CloudError::InvalidDimensionality { row: 2, .. }));
    assert!(matches!(errors[3], CloudError::EmptyCloud { .. }));
    assert!(matches!(errors[4], CloudError::DegenerateCloud { .. }));

    assert_eq!(errors[0].category(), ErrorCategory::Load);
    assert_eq!(errors[4].category(), ErrorCategory::InvalidInput);

    // Failed files leave no output behind
    for outcome in report.failures() {
        assert!(!outcome.output.exists(), "{:?}", outcome.output);
    }
}

#[test]
fn test_empty_result_still_writes_mesh() {
    let dir = TempDir::new().unwrap();
    let input = write_cube_pcd(dir.path(), "cube.pcd", [0.0, 0.0, 0.0], 1.0, 4);

    // Placing the center past the grid edge pushes every point out
    let params = CompletionParams::default()
        .with_patch_size(16)
        .with_placement(0.5, 1.5, 0.5);
    let report = partial_completion(&[&input], &params, "_partial");
    assert!(report.all_succeeded());

    let stats = report.outcomes[0].stats().unwrap();
    assert!(stats.is_empty_result());
    assert_eq!(stats.discarded_points(), 125);

    let mesh = load_ply_mesh(&report.outcomes[0].output).unwrap();
    assert!(mesh.is_empty());
}

#[test]
fn test_gaussian_process_is_isolated_per_file() {
    let dir = TempDir::new().unwrap();
    let a = write_cube_pcd(dir.path(), "a.pcd", [0.0, 0.0, 0.0], 1.0, 3);
    let b = write_cube_pcd(dir.path(), "b.pcd", [0.0, 0.0, 0.0], 1.0, 3);

    let report = gaussian_process_completion(&[&a, &b], "_gp");
    assert_eq!(report.method, CompletionMethod::GaussianProcess);
    assert_eq!(report.failed(), 2);
    for outcome in &report.outcomes {
        let err = outcome.error().unwrap();
        assert!(matches!(err, CloudError::NotImplemented { .. }));
        assert_eq!(err.category(), ErrorCategory::Processing);
    }
}

#[test]
fn test_invalid_params_fail_every_file() {
    let dir = TempDir::new().unwrap();
    let input = write_cube_pcd(dir.path(), "cube.pcd", [0.0, 0.0, 0.0], 1.0, 3);

    let params = CompletionParams::default().with_patch_size(0);
    let report = partial_completion(&[&input, &input], &params, "_partial");
    assert_eq!(report.failed(), 2);
    for outcome in &report.outcomes {
        assert_eq!(
            outcome.error().unwrap().category(),
            ErrorCategory::Configuration
        );
    }
}
