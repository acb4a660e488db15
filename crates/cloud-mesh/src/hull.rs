//! Convex hull completion.

use nalgebra::{Point3, Vector3};
use tracing::info;

use crate::error::{CloudError, CloudResult};
use crate::pointcloud::PointCloud;
use crate::tracing_ext::OperationTimer;
use crate::{Mesh, Vertex};

/// Compute the convex hull of `cloud` as a closed mesh with outward normals.
///
/// The output holds only the hull vertices. Hull construction runs in
/// single precision inside `parry3d`, so vertex coordinates carry f32
/// rounding.
///
/// # Errors
///
/// [`CloudError::HullFailed`] when the cloud has fewer than four points or
/// every point lies in one plane.
pub fn convex_hull_mesh(cloud: &PointCloud) -> CloudResult<Mesh> {
    let _timer = OperationTimer::new("convex_hull");
    cloud.validate()?;

    if cloud.len() < 4 {
        return Err(CloudError::hull_failed(format!(
            "need at least 4 points, got {}",
            cloud.len()
        )));
    }
    check_not_flat(&cloud.points)?;

    let points: Vec<parry3d::math::Point<f32>> = cloud
        .points
        .iter()
        .map(|p| parry3d::math::Point::new(p.x as f32, p.y as f32, p.z as f32))
        .collect();

    let (hull_points, hull_faces) = parry3d::transformation::try_convex_hull(&points)
        .map_err(|e| CloudError::hull_failed(format!("{:?}", e)))?;

    let mut mesh = Mesh::with_capacity(hull_points.len(), hull_faces.len());
    for p in &hull_points {
        mesh.vertices
            .push(Vertex::from_coords(p.x as f64, p.y as f64, p.z as f64));
    }
    mesh.faces = hull_faces;

    if mesh.signed_volume() < 0.0 {
        for face in &mut mesh.faces {
            face.swap(1, 2);
        }
    }

    info!(
        points = cloud.len(),
        hull_vertices = mesh.vertex_count(),
        hull_faces = mesh.face_count(),
        "Convex hull complete"
    );
    Ok(mesh)
}

/// Reject point sets with no volume, which the hull builder cannot close.
fn check_not_flat(points: &[Point3<f64>]) -> CloudResult<()> {
    let p0 = points[0];
    let farthest = |from: &dyn Fn(&Point3<f64>) -> f64| {
        points
            .iter()
            .copied()
            .max_by(|a, b| from(a).total_cmp(&from(b)))
            .unwrap_or(p0)
    };

    let p1 = farthest(&|p| (p - p0).norm_squared());
    let axis = p1 - p0;
    let scale = axis.norm();
    if scale == 0.0 {
        return Err(CloudError::hull_failed("all points coincide"));
    }

    let p2 = farthest(&|p| axis.cross(&(p - p0)).norm_squared());
    let normal: Vector3<f64> = axis.cross(&(p2 - p0));
    if normal.norm() <= 1e-12 * scale * scale {
        return Err(CloudError::hull_failed("all points are collinear"));
    }

    let normal = normal.normalize();
    let p3 = farthest(&|p| normal.dot(&(p - p0)).abs());
    if normal.dot(&(p3 - p0)).abs() <= 1e-9 * scale {
        return Err(CloudError::hull_failed("all points are coplanar"));
    }

    Ok(())
}
