//! Property-based tests for the completion stages.
//!
//! Run with: cargo test -p cloud-mesh -- proptest

use cloud_mesh::voxel::CellLookup;
use cloud_mesh::{
    BowyerWatson, CompletionParams, GridPlacement, PointCloud, Triangulator2d,
    build_occupancy_grid, voxel_resolution,
};
use nalgebra::{Point3, Vector3};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn arb_point() -> impl Strategy<Value = Point3<f64>> {
    prop::array::uniform3(-1000.0..1000.0f64).prop_map(|[x, y, z]| Point3::new(x, y, z))
}

/// Clouds with at least two distinct points.
fn arb_cloud(max_points: usize) -> impl Strategy<Value = Vec<Point3<f64>>> {
    (arb_point(), arb_point(), prop::collection::vec(arb_point(), 0..max_points)).prop_filter_map(
        "needs nonzero extent",
        |(a, b, rest)| {
            if (a - b).abs().max() < 1e-6 {
                return None;
            }
            let mut points = vec![a, b];
            points.extend(rest);
            Some(points)
        },
    )
}

fn arb_params() -> impl Strategy<Value = CompletionParams> {
    (
        4usize..64,
        prop::array::uniform3(0.1..0.9f64),
        0.2..1.2f64,
    )
        .prop_map(|(patch_size, [px, py, pz], pps)| {
            CompletionParams::default()
                .with_patch_size(patch_size)
                .with_placement(px, py, pz)
                .with_percent_patch_size(pps)
        })
}

// =============================================================================
// Geometry and voxelization
// =============================================================================

proptest! {
    #[test]
    fn proptest_resolution_is_positive(points in arb_cloud(50), params in arb_params()) {
        let res = voxel_resolution(&points, params.patch_size, params.percent_patch_size).unwrap();
        prop_assert!(res > 0.0 && res.is_finite());

        // The largest axis spans percent_patch_size of the grid
        let cloud = PointCloud::from_positions(&points);
        let extent = cloud.bounds().unwrap().max_extent();
        let span = extent / res;
        let expected = params.percent_patch_size * params.patch_size as f64;
        prop_assert!((span - expected).abs() <= 1e-9 * expected);
    }

    #[test]
    fn proptest_grid_round_trip(points in arb_cloud(30), params in arb_params()) {
        let cloud = PointCloud::from_positions(&points);
        let placement = GridPlacement::from_params(&cloud, &params).unwrap();

        for p in &points {
            let g = Point3::from(placement.to_grid(p));
            let back = placement.to_world(&g);
            prop_assert!((back - p).norm() <= 1e-9 * (1.0 + p.coords.norm()));
        }
    }

    #[test]
    fn proptest_boundary_policy(points in arb_cloud(80), params in arb_params()) {
        let cloud = PointCloud::from_positions(&points);
        let placement = GridPlacement::from_params(&cloud, &params).unwrap();
        let dim = params.patch_size;

        for p in &points {
            if let CellLookup::Inside(cell) = placement.cell_of(p) {
                for &i in &cell {
                    prop_assert!(i >= 1 && i < dim);
                }
            }
        }

        let (grid, stats) = build_occupancy_grid(&points, &placement);
        prop_assert_eq!(stats.total_points, points.len());
        prop_assert_eq!(stats.kept_points + stats.discarded(), points.len());
        prop_assert!(stats.occupied_voxels <= stats.kept_points);
        prop_assert_eq!(grid.occupied_count(), stats.occupied_voxels);

        // The border layer at index 0 is never occupied
        for [x, y, z] in grid.occupied_cells() {
            prop_assert!(x > 0 && y > 0 && z > 0);
        }
    }

    #[test]
    fn proptest_centered_cloud_is_fully_kept(points in arb_cloud(60), patch_size in 12usize..48) {
        // With the default 0.8 span and a centered placement the cloud stays
        // at least 0.1 * patch_size away from both ends of every axis.
        let cloud = PointCloud::from_positions(&points);
        let params = CompletionParams::centered().with_patch_size(patch_size);
        let placement = GridPlacement::from_params(&cloud, &params).unwrap();

        let (_, stats) = build_occupancy_grid(&points, &placement);
        prop_assert_eq!(stats.discarded(), 0);
    }
}

// =============================================================================
// Delaunay triangulation
// =============================================================================

/// Distinct integer points, exact in every predicate below.
fn arb_lattice_points() -> impl Strategy<Value = Vec<[f64; 2]>> {
    prop::collection::hash_set((-60i32..60, -60i32..60), 3..40)
        .prop_map(|set| set.into_iter().map(|(x, y)| [x as f64, y as f64]).collect())
}

fn orient_exact(a: [i64; 2], b: [i64; 2], c: [i64; 2]) -> i64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

fn incircle_exact(a: [i64; 2], b: [i64; 2], c: [i64; 2], d: [i64; 2]) -> i64 {
    let row = |p: [i64; 2]| {
        let (x, y) = (p[0] - d[0], p[1] - d[1]);
        [x, y, x * x + y * y]
    };
    let (a, b, c) = (row(a), row(b), row(c));
    a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
        + a[2] * (b[0] * c[1] - b[1] * c[0])
}

/// Twice the convex hull area, exact.
fn hull_area2_exact(points: &[[i64; 2]]) -> i64 {
    let mut sorted = points.to_vec();
    sorted.sort();
    sorted.dedup();

    fn half(pts: impl Iterator<Item = [i64; 2]>) -> Vec<[i64; 2]> {
        let mut chain: Vec<[i64; 2]> = Vec::new();
        for p in pts {
            while let [.., a, b] = chain[..] {
                if orient_exact(a, b, p) > 0 {
                    break;
                }
                chain.pop();
            }
            chain.push(p);
        }
        chain.pop();
        chain
    }
    let mut hull = half(sorted.iter().copied());
    hull.extend(half(sorted.iter().rev().copied()));

    (0..hull.len())
        .map(|i| {
            let (a, b) = (hull[i], hull[(i + 1) % hull.len()]);
            a[0] * b[1] - b[0] * a[1]
        })
        .sum()
}

proptest! {
    #[test]
    fn proptest_delaunay_faces_ccw_and_empty(points in arb_lattice_points()) {
        let Ok(faces) = BowyerWatson.triangulate(&points) else {
            // Only collinear input may fail
            let ints: Vec<[i64; 2]> = points.iter().map(|p| [p[0] as i64, p[1] as i64]).collect();
            let collinear = ints.iter().all(|&c| orient_exact(ints[0], ints[1], c) == 0);
            prop_assert!(collinear);
            return Ok(());
        };
        prop_assert!(!faces.is_empty());

        let ints: Vec<[i64; 2]> = points.iter().map(|p| [p[0] as i64, p[1] as i64]).collect();
        for f in &faces {
            let [a, b, c] = f.map(|i| ints[i as usize]);
            prop_assert!(orient_exact(a, b, c) > 0, "face {:?} not ccw", f);

            for (i, &d) in ints.iter().enumerate() {
                if f.contains(&(i as u32)) {
                    continue;
                }
                prop_assert!(incircle_exact(a, b, c, d) <= 0, "point {} inside circumcircle of {:?}", i, f);
            }
        }

        // Faces tile the convex hull exactly
        let area2: i64 = faces
            .iter()
            .map(|f| {
                let [a, b, c] = f.map(|i| ints[i as usize]);
                orient_exact(a, b, c)
            })
            .sum();
        prop_assert_eq!(area2, hull_area2_exact(&ints));

        // Every point is used by some face
        let mut used = vec![false; points.len()];
        for f in &faces {
            for &i in f {
                used[i as usize] = true;
            }
        }
        prop_assert!(used.iter().all(|&u| u));
    }
}

#[test]
fn test_placement_offset_scales_with_patch_size() {
    let placement = GridPlacement::new(Point3::origin(), 0.5, 40, Vector3::new(0.5, 0.5, 0.45));
    assert!((placement.offset - Vector3::new(20.0, 20.0, 18.0)).norm() < 1e-12);
}
