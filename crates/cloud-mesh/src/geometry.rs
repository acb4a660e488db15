//! Bounding box, center, and voxel resolution of a raw point set.
//!
//! These are pure O(n) passes over the points. Nothing is cached: every
//! caller recomputes the box it needs.

use nalgebra::{Point3, Vector3};

use crate::error::{CloudError, CloudResult};

/// Axis-aligned bounding box of a point set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Per-axis minimum.
    pub min: Point3<f64>,
    /// Per-axis maximum.
    pub max: Point3<f64>,
}

impl BoundingBox {
    /// Per-axis span (`max - min`).
    #[inline]
    pub fn extent(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Largest of the three axis spans.
    #[inline]
    pub fn max_extent(&self) -> f64 {
        self.extent().max()
    }

    /// Per-axis midpoint, `min + (max - min) / 2`.
    #[inline]
    pub fn center(&self) -> Point3<f64> {
        self.min + self.extent() / 2.0
    }
}

/// Compute the bounding box of `points`.
///
/// Returns [`CloudError::EmptyCloud`] when there are no points.
pub fn bounding_box(points: &[Point3<f64>]) -> CloudResult<BoundingBox> {
    let (first, rest) = points
        .split_first()
        .ok_or_else(|| CloudError::empty_cloud("cannot compute a bounding box of zero points"))?;

    let mut min = *first;
    let mut max = *first;
    for p in rest {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        min.z = min.z.min(p.z);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
        max.z = max.z.max(p.z);
    }

    Ok(BoundingBox { min, max })
}

/// Per-axis midpoint of the bounding box of `points`.
pub fn pointcloud_center(points: &[Point3<f64>]) -> CloudResult<Point3<f64>> {
    Ok(bounding_box(points)?.center())
}

/// World-space edge length of one voxel.
///
/// `max_extent / (percent_patch_size * patch_size)`, so the largest axis of
/// the cloud spans `percent_patch_size` of the grid.
///
/// # Errors
///
/// - [`CloudError::InvalidParameter`] if `patch_size` is zero or
///   `percent_patch_size` is not a positive finite number
/// - [`CloudError::EmptyCloud`] if `points` is empty
/// - [`CloudError::DegenerateCloud`] if every axis has zero span
pub fn voxel_resolution(
    points: &[Point3<f64>],
    patch_size: usize,
    percent_patch_size: f64,
) -> CloudResult<f64> {
    if patch_size == 0 {
        return Err(CloudError::invalid_parameter(
            "patch_size",
            patch_size,
            "must be positive",
        ));
    }
    if !(percent_patch_size.is_finite() && percent_patch_size > 0.0) {
        return Err(CloudError::invalid_parameter(
            "percent_patch_size",
            percent_patch_size,
            "must be a positive finite fraction",
        ));
    }

    let max_extent = bounding_box(points)?.max_extent();
    if !(max_extent.is_finite() && max_extent > 0.0) {
        return Err(CloudError::DegenerateCloud { max_extent });
    }

    Ok(max_extent / (percent_patch_size * patch_size as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_corners(size: f64) -> Vec<Point3<f64>> {
        let mut points = Vec::new();
        for &x in &[0.0, size] {
            for &y in &[0.0, size] {
                for &z in &[0.0, size] {
                    points.push(Point3::new(x, y, z));
                }
            }
        }
        points
    }

    #[test]
    fn test_bounding_box() {
        let points = vec![
            Point3::new(1.0, -2.0, 0.5),
            Point3::new(-1.0, 4.0, 0.0),
            Point3::new(0.0, 0.0, 3.0),
        ];
        let bbox = bounding_box(&points).unwrap();
        assert_eq!(bbox.min, Point3::new(-1.0, -2.0, 0.0));
        assert_eq!(bbox.max, Point3::new(1.0, 4.0, 3.0));
        assert_eq!(bbox.max_extent(), 6.0);
    }

    #[test]
    fn test_center_is_box_midpoint_not_centroid() {
        // Three points clustered at x = 0 and one at x = 10
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 2.0, 4.0),
        ];
        let center = pointcloud_center(&points).unwrap();
        assert_eq!(center, Point3::new(5.0, 1.0, 2.0));
    }

    #[test]
    fn test_resolution_scenario() {
        let points = cube_corners(10.0);
        let res = voxel_resolution(&points, 20, 0.8).unwrap();
        assert!((res - 0.625).abs() < 1e-12, "resolution {}", res);
    }

    #[test]
    fn test_resolution_uses_largest_axis() {
        let points = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 12.0, 3.0)];
        let res = voxel_resolution(&points, 120, 0.8).unwrap();
        assert!((res - 12.0 / 96.0).abs() < 1e-12);
    }

    #[test]
    fn test_resolution_flat_cloud_is_fine() {
        // Zero extent on z only
        let points = vec![Point3::new(0.0, 0.0, 1.0), Point3::new(2.0, 1.0, 1.0)];
        assert!(voxel_resolution(&points, 10, 0.5).unwrap() > 0.0);
    }

    #[test]
    fn test_resolution_errors() {
        let points = cube_corners(1.0);
        assert!(matches!(
            voxel_resolution(&points, 0, 0.8),
            Err(CloudError::InvalidParameter {
                parameter: "patch_size",
                ..
            })
        ));
        assert!(matches!(
            voxel_resolution(&points, 20, 0.0),
            Err(CloudError::InvalidParameter {
                parameter: "percent_patch_size",
                ..
            })
        ));
        assert!(matches!(
            voxel_resolution(&points, 20, f64::NAN),
            Err(CloudError::InvalidParameter { .. })
        ));
        assert!(matches!(
            voxel_resolution(&[], 20, 0.8),
            Err(CloudError::EmptyCloud { .. })
        ));

        let same = vec![Point3::new(1.0, 1.0, 1.0); 4];
        assert!(matches!(
            voxel_resolution(&same, 20, 0.8),
            Err(CloudError::DegenerateCloud { .. })
        ));
    }
}
